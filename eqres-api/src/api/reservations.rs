//! Reservation request, review and withdrawal handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use eqres_common::booking::{ReservationStatus, ReviewAction, TimeSlot};
use eqres_common::db::{load_booking_policy, Reservation};
use eqres_common::events::EqresEvent;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db::reservations::{self as store, NewReservation, ReservationFilter};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, default_page, Page, PAGE_SIZE};
use crate::AppState;

const MAX_PURPOSE_LEN: usize = 500;
const MAX_NOTE_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub equipment_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Mine,
    All,
}

#[derive(Debug, Deserialize)]
pub struct ReservationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub status: Option<ReservationStatus>,
    pub equipment_id: Option<Uuid>,
    #[serde(default)]
    pub scope: Scope,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub note: Option<String>,
}

/// POST /api/reservations
///
/// Stores a pending request. The slot must satisfy the current booking
/// policy and must not overlap a pending or approved reservation.
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    let slot = TimeSlot::new(req.start, req.end)?;

    let purpose = req.purpose.trim().to_string();
    if purpose.chars().count() > MAX_PURPOSE_LEN {
        return Err(ApiError::BadRequest(format!(
            "Purpose cannot exceed {} characters",
            MAX_PURPOSE_LEN
        )));
    }

    let policy = load_booking_policy(&state.db).await?;
    policy.validate(&slot, Utc::now())?;

    let reservation = store::create_reservation(
        &state.db,
        &state.booking_lock,
        NewReservation {
            equipment_id: req.equipment_id,
            user_id: current.user.id,
            slot,
            purpose,
        },
    )
    .await?;

    state.events.emit_lossy(EqresEvent::ReservationCreated {
        reservation_id: reservation.id,
        equipment_id: reservation.equipment_id,
        user_id: reservation.user_id,
        start: reservation.start,
        end: reservation.end,
        timestamp: Utc::now(),
    });
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /api/reservations
///
/// Own reservations; administrators may pass `scope=all`.
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ReservationQuery>,
) -> ApiResult<Json<Page<Reservation>>> {
    let user_id = match query.scope {
        Scope::All if current.is_admin() => None,
        Scope::All => {
            return Err(ApiError::Forbidden(
                "scope=all requires administrator role".to_string(),
            ))
        }
        Scope::Mine => Some(current.user.id),
    };
    let filter = ReservationFilter {
        user_id,
        equipment_id: query.equipment_id,
        status: query.status,
    };

    let total = store::count_reservations(&state.db, &filter).await?;
    let p = calculate_pagination(total, query.page);
    let items = store::list_reservations(&state.db, &filter, PAGE_SIZE, p.offset).await?;
    Ok(Json(Page::new(p, total, items)))
}

/// Load a reservation the caller may see; others' reservations look missing
async fn visible_reservation(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
) -> ApiResult<Reservation> {
    match store::get_reservation(&state.db, id).await? {
        Some(r) if r.user_id == current.user.id || current.is_admin() => Ok(r),
        _ => Err(ApiError::NotFound(format!("Reservation {}", id))),
    }
}

/// GET /api/reservations/:id
pub async fn get_reservation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Reservation>> {
    Ok(Json(visible_reservation(&state, &current, id).await?))
}

/// DELETE /api/reservations/:id
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let reservation = visible_reservation(&state, &current, id).await?;
    store::cancel_reservation(&state.db, &state.booking_lock, &reservation, Utc::now()).await?;

    state.events.emit_lossy(EqresEvent::ReservationCancelled {
        reservation_id: reservation.id,
        equipment_id: reservation.equipment_id,
        timestamp: Utc::now(),
    });
    Ok(StatusCode::NO_CONTENT)
}

/// The review body is optional; an empty one means "no note"
fn parse_review_body(body: &[u8]) -> ApiResult<ReviewRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReviewRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid review body: {}", e)))
}

async fn review(
    state: AppState,
    current: CurrentUser,
    id: Uuid,
    action: ReviewAction,
    req: ReviewRequest,
) -> ApiResult<Json<Reservation>> {
    let note = req
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
        return Err(ApiError::BadRequest(format!(
            "Review note cannot exceed {} characters",
            MAX_NOTE_LEN
        )));
    }

    let reviewed = store::review_reservation(
        &state.db,
        &state.booking_lock,
        id,
        action,
        current.user.id,
        note.as_deref(),
        Utc::now(),
    )
    .await?;

    let reservation = reviewed.reservation;
    state.events.emit_lossy(EqresEvent::ReservationReviewed {
        reservation_id: reservation.id,
        equipment_id: reservation.equipment_id,
        old_status: reviewed.old_status,
        new_status: reservation.status,
        reviewed_by: current.user.id,
        timestamp: Utc::now(),
    });
    Ok(Json(reservation))
}

/// POST /api/admin/reservations/:id/approve
pub async fn approve_reservation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Reservation>> {
    let req = parse_review_body(&body)?;
    review(state, current, id, ReviewAction::Approve, req).await
}

/// POST /api/admin/reservations/:id/reject
pub async fn reject_reservation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Reservation>> {
    let req = parse_review_body(&body)?;
    review(state, current, id, ReviewAction::Reject, req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_review_body() {
        assert_eq!(parse_review_body(b"").unwrap().note, None);
        assert_eq!(parse_review_body(b" \n").unwrap().note, None);
        assert_eq!(
            parse_review_body(br#"{"note": "ok"}"#).unwrap().note.as_deref(),
            Some("ok")
        );
        assert!(parse_review_body(br#"{"note": 5}"#).is_err());
        assert!(parse_review_body(b"{not json").is_err());
    }
}

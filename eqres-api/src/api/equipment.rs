//! Equipment browsing, availability and administration

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use eqres_common::booking::{free_slots, ReservationStatus, TimeSlot};
use eqres_common::db::Equipment;
use eqres_common::events::{EquipmentChange, EqresEvent};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db::equipment::{self as store, CategoryCount, EquipmentFilter, EquipmentInput};
use crate::db::reservations::blocking_in_window;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, default_page, Page, PAGE_SIZE};
use crate::AppState;

/// Longest window an availability query may cover
const MAX_AVAILABILITY_DAYS: i64 = 31;

const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Deserialize)]
pub struct EquipmentQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Drop free gaps shorter than this
    pub min_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BusySlot {
    pub reservation_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ReservationStatus,
}

#[derive(Debug, Serialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub equipment_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub busy: Vec<BusySlot>,
    pub free: Vec<FreeSlot>,
}

#[derive(Debug, Deserialize)]
pub struct EquipmentRequest {
    pub name: String,
    pub category: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl EquipmentRequest {
    fn into_input(self) -> ApiResult<EquipmentInput> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::BadRequest(format!(
                "Equipment name must be 1-{} characters",
                MAX_NAME_LEN
            )));
        }
        let category = self.category.trim().to_string();
        if category.is_empty() {
            return Err(ApiError::BadRequest(
                "Equipment category is required".to_string(),
            ));
        }
        Ok(EquipmentInput {
            name,
            category,
            location: non_empty(self.location),
            description: non_empty(self.description),
            image_url: non_empty(self.image_url),
            active: self.active,
        })
    }
}

/// GET /api/equipment
///
/// Retired equipment is listed only for administrators who ask for it.
pub async fn list_equipment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<EquipmentQuery>,
) -> ApiResult<Json<Page<Equipment>>> {
    let filter = EquipmentFilter {
        category: non_empty(query.category),
        search: non_empty(query.q),
        include_inactive: query.include_inactive && current.is_admin(),
    };

    let total = store::count_equipment(&state.db, &filter).await?;
    let p = calculate_pagination(total, query.page);
    let items = store::list_equipment(&state.db, &filter, PAGE_SIZE, p.offset).await?;
    Ok(Json(Page::new(p, total, items)))
}

/// GET /api/equipment/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CategoryCount>>> {
    Ok(Json(store::list_categories(&state.db).await?))
}

/// Fetch equipment visible to the caller; retired items are admin-only
async fn visible_equipment(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
) -> ApiResult<Equipment> {
    match store::get_equipment(&state.db, id).await? {
        Some(e) if e.active || current.is_admin() => Ok(e),
        _ => Err(ApiError::NotFound(format!("Equipment {}", id))),
    }
}

/// GET /api/equipment/:id
pub async fn get_equipment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Equipment>> {
    Ok(Json(visible_equipment(&state, &current, id).await?))
}

/// GET /api/equipment/:id/availability
pub async fn get_availability(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Json<Availability>> {
    visible_equipment(&state, &current, id).await?;

    let window = TimeSlot::new(query.from, query.to)?;
    if window.duration() > Duration::days(MAX_AVAILABILITY_DAYS) {
        return Err(ApiError::BadRequest(format!(
            "Availability window cannot exceed {} days",
            MAX_AVAILABILITY_DAYS
        )));
    }
    let min_minutes = query.min_minutes.unwrap_or(0);
    if !(0..=MAX_AVAILABILITY_DAYS * 24 * 60).contains(&min_minutes) {
        return Err(ApiError::BadRequest(format!(
            "min_minutes must be between 0 and {}",
            MAX_AVAILABILITY_DAYS * 24 * 60
        )));
    }
    let min_len = Duration::try_minutes(min_minutes)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid min_minutes: {}", min_minutes)))?;

    let reservations = blocking_in_window(&state.db, id, &window).await?;
    let busy_slots = reservations
        .iter()
        .map(|r| r.slot())
        .collect::<eqres_common::Result<Vec<_>>>()?;

    let free = free_slots(window, &busy_slots, min_len)
        .into_iter()
        .map(|s| FreeSlot {
            start: s.start(),
            end: s.end(),
        })
        .collect();
    let busy = reservations
        .into_iter()
        .map(|r| BusySlot {
            reservation_id: r.id,
            start: r.start,
            end: r.end,
            status: r.status,
        })
        .collect();

    Ok(Json(Availability {
        equipment_id: id,
        from: window.start(),
        to: window.end(),
        busy,
        free,
    }))
}

/// POST /api/admin/equipment
pub async fn create_equipment(
    State(state): State<AppState>,
    Json(req): Json<EquipmentRequest>,
) -> ApiResult<(StatusCode, Json<Equipment>)> {
    let input = req.into_input()?;
    let equipment = store::create_equipment(&state.db, &input).await?;

    info!("Equipment created: {} ({})", equipment.name, equipment.id);
    state.events.emit_lossy(EqresEvent::EquipmentChanged {
        equipment_id: equipment.id,
        change: EquipmentChange::Created,
        timestamp: Utc::now(),
    });
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// PUT /api/admin/equipment/:id
pub async fn update_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EquipmentRequest>,
) -> ApiResult<Json<Equipment>> {
    let input = req.into_input()?;
    let equipment = store::update_equipment(&state.db, id, &input).await?;

    info!("Equipment updated: {} ({})", equipment.name, equipment.id);
    state.events.emit_lossy(EqresEvent::EquipmentChanged {
        equipment_id: equipment.id,
        change: EquipmentChange::Updated,
        timestamp: Utc::now(),
    });
    Ok(Json(equipment))
}

/// DELETE /api/admin/equipment/:id
pub async fn delete_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    store::delete_equipment(&state.db, &state.booking_lock, id).await?;

    info!("Equipment deleted: {}", id);
    state.events.emit_lossy(EqresEvent::EquipmentChanged {
        equipment_id: id,
        change: EquipmentChange::Deleted,
        timestamp: Utc::now(),
    });
    Ok(StatusCode::NO_CONTENT)
}

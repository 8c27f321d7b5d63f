//! Reservation storage and the booking workflow
//!
//! Writes that depend on the current schedule (create, approve) run as
//! check-then-write inside one transaction while holding the process-wide
//! booking lock, so two requests for the same slot cannot both pass the
//! overlap check.

use chrono::{DateTime, Utc};
use eqres_common::booking::{find_conflict, ReservationStatus, ReviewAction, TimeSlot};
use eqres_common::db::Reservation;
use eqres_common::time::{now_millis, to_millis};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

const RESERVATION_COLUMNS: &str = "guid, equipment_id, user_id, start_ms, end_ms, purpose, status, \
     reviewed_by, review_note, created_at, updated_at";

/// Statuses that occupy a slot
const BLOCKING: &[ReservationStatus] = &[ReservationStatus::Pending, ReservationStatus::Approved];

/// Validated reservation request
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub slot: TimeSlot,
    pub purpose: String,
}

/// List filter
#[derive(Debug, Default, Clone)]
pub struct ReservationFilter {
    /// Restrict to one user's reservations
    pub user_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
}

/// Result of an administrator review
#[derive(Debug)]
pub struct Reviewed {
    pub old_status: ReservationStatus,
    pub reservation: Reservation,
}

/// Reservations of `equipment_id` in one of `statuses` overlapping `slot`
async fn overlapping(
    conn: &mut SqliteConnection,
    equipment_id: Uuid,
    slot: &TimeSlot,
    statuses: &[ReservationStatus],
    exclude: Option<Uuid>,
) -> ApiResult<Vec<(Uuid, TimeSlot)>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM reservations WHERE equipment_id = ",
        RESERVATION_COLUMNS
    ));
    qb.push_bind(equipment_id.to_string());
    qb.push(" AND start_ms < ")
        .push_bind(to_millis(slot.end()))
        .push(" AND end_ms > ")
        .push_bind(to_millis(slot.start()));

    qb.push(" AND status IN (");
    let mut separated = qb.separated(", ");
    for status in statuses {
        separated.push_bind(status.as_str());
    }
    separated.push_unseparated(")");

    if let Some(id) = exclude {
        qb.push(" AND guid != ").push_bind(id.to_string());
    }
    qb.push(" ORDER BY start_ms");

    let rows = qb.build().fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| -> ApiResult<(Uuid, TimeSlot)> {
            let r = Reservation::from_row(row)?;
            Ok((r.id, r.slot()?))
        })
        .collect()
}

async fn fetch_one(conn: &mut SqliteConnection, id: Uuid) -> ApiResult<Option<Reservation>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM reservations WHERE guid = ?",
        RESERVATION_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(Reservation::from_row).transpose()?)
}

/// Create a pending reservation if the slot is free
///
/// The caller has already validated the slot against the booking policy.
pub async fn create_reservation(
    db: &SqlitePool,
    lock: &Mutex<()>,
    new: NewReservation,
) -> ApiResult<Reservation> {
    let _guard = lock.lock().await;
    let mut tx = db.begin().await?;

    let active: Option<i64> = sqlx::query_scalar("SELECT active FROM equipment WHERE guid = ?")
        .bind(new.equipment_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    match active {
        None => return Err(ApiError::NotFound(format!("Equipment {}", new.equipment_id))),
        Some(0) => {
            return Err(ApiError::Conflict(
                "Equipment is retired and cannot be booked".to_string(),
            ))
        }
        Some(_) => {}
    }

    let busy = overlapping(&mut tx, new.equipment_id, &new.slot, BLOCKING, None).await?;
    if let Some(with) = find_conflict(&new.slot, &busy) {
        debug!(
            "Reservation request for {} overlaps {}",
            new.equipment_id, with
        );
        return Err(eqres_common::BookingError::Conflict { with }.into());
    }

    let id = Uuid::new_v4();
    let now = now_millis();
    sqlx::query(
        "INSERT INTO reservations (guid, equipment_id, user_id, start_ms, end_ms, purpose, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(new.equipment_id.to_string())
    .bind(new.user_id.to_string())
    .bind(to_millis(new.slot.start()))
    .bind(to_millis(new.slot.end()))
    .bind(&new.purpose)
    .bind(ReservationStatus::Pending.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let reservation = fetch_one(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::Internal("Reservation vanished after insert".to_string()))?;

    tx.commit().await?;

    info!(
        "Reservation {} created for equipment {} ({} - {})",
        id,
        new.equipment_id,
        new.slot.start(),
        new.slot.end()
    );
    Ok(reservation)
}

/// Approve or reject a reservation
///
/// Approval re-checks the slot against other approved reservations. Ended
/// reservations cannot be approved.
pub async fn review_reservation(
    db: &SqlitePool,
    lock: &Mutex<()>,
    id: Uuid,
    action: ReviewAction,
    reviewer: Uuid,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> ApiResult<Reviewed> {
    let _guard = lock.lock().await;
    let mut tx = db.begin().await?;

    let current = fetch_one(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Reservation {}", id)))?;

    let new_status = current.status.apply(action)?;

    if new_status == ReservationStatus::Approved {
        if current.end <= now {
            return Err(ApiError::Conflict(
                "Reservation has already ended".to_string(),
            ));
        }
        let slot = current.slot()?;
        let approved = overlapping(
            &mut tx,
            current.equipment_id,
            &slot,
            &[ReservationStatus::Approved],
            Some(id),
        )
        .await?;
        if let Some(with) = find_conflict(&slot, &approved) {
            return Err(eqres_common::BookingError::Conflict { with }.into());
        }
    }

    sqlx::query(
        "UPDATE reservations SET status = ?, reviewed_by = ?, review_note = ?, updated_at = ?
         WHERE guid = ?",
    )
    .bind(new_status.as_str())
    .bind(reviewer.to_string())
    .bind(note)
    .bind(to_millis(now))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    let reservation = fetch_one(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Reservation {}", id)))?;

    tx.commit().await?;

    info!(
        "Reservation {} {} -> {} by {}",
        id, current.status, new_status, reviewer
    );
    Ok(Reviewed {
        old_status: current.status,
        reservation,
    })
}

/// Withdraw a reservation that has not started
///
/// Rejected reservations are kept as history and cannot be withdrawn.
pub async fn cancel_reservation(
    db: &SqlitePool,
    lock: &Mutex<()>,
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    if !reservation.status.blocks_slot() {
        return Err(ApiError::Conflict(format!(
            "Reservation is {} and cannot be cancelled",
            reservation.status
        )));
    }
    if reservation.start <= now {
        return Err(ApiError::Conflict(
            "Reservation has already started".to_string(),
        ));
    }

    let _guard = lock.lock().await;
    let result = sqlx::query(
        "DELETE FROM reservations WHERE guid = ? AND status IN ('pending', 'approved')",
    )
    .bind(reservation.id.to_string())
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Reservation {}", reservation.id)));
    }

    info!("Reservation {} cancelled", reservation.id);
    Ok(())
}

pub async fn get_reservation(db: &SqlitePool, id: Uuid) -> ApiResult<Option<Reservation>> {
    let mut conn = db.acquire().await?;
    fetch_one(&mut conn, id).await
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ReservationFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.to_string());
    }
    if let Some(equipment_id) = filter.equipment_id {
        qb.push(" AND equipment_id = ").push_bind(equipment_id.to_string());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

pub async fn count_reservations(db: &SqlitePool, filter: &ReservationFilter) -> ApiResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM reservations");
    push_filter(&mut qb, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(db).await?)
}

/// One page of reservations ordered by start time
pub async fn list_reservations(
    db: &SqlitePool,
    filter: &ReservationFilter,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<Reservation>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM reservations",
        RESERVATION_COLUMNS
    ));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY start_ms, created_at LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build().fetch_all(db).await?;
    Ok(rows
        .iter()
        .map(Reservation::from_row)
        .collect::<eqres_common::Result<Vec<_>>>()?)
}

/// Pending and approved reservations of one equipment overlapping `window`
pub async fn blocking_in_window(
    db: &SqlitePool,
    equipment_id: Uuid,
    window: &TimeSlot,
) -> ApiResult<Vec<Reservation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM reservations
         WHERE equipment_id = ? AND status IN ('pending', 'approved')
           AND start_ms < ? AND end_ms > ?
         ORDER BY start_ms",
        RESERVATION_COLUMNS
    ))
    .bind(equipment_id.to_string())
    .bind(to_millis(window.end()))
    .bind(to_millis(window.start()))
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(Reservation::from_row)
        .collect::<eqres_common::Result<Vec<_>>>()?)
}

//! Admin dashboard aggregates

use chrono::Duration;
use eqres_common::time::{now, to_millis};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize)]
pub struct EquipmentUsage {
    pub equipment_id: String,
    pub name: String,
    pub approved_reservations: i64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub equipment_total: i64,
    pub equipment_active: i64,
    pub users_total: i64,
    pub reservations: StatusCounts,
    /// Approved reservations starting within the next 7 days
    pub upcoming_week: i64,
    pub top_equipment: Vec<EquipmentUsage>,
}

pub async fn dashboard(db: &SqlitePool) -> ApiResult<Dashboard> {
    let (equipment_total, equipment_active): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(active), 0) FROM equipment",
    )
    .fetch_one(db)
    .await?;

    let users_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;

    let by_status: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM reservations GROUP BY status")
            .fetch_all(db)
            .await?;
    let count_of = |s: &str| {
        by_status
            .iter()
            .find(|(status, _)| status == s)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };

    let now = now();
    let upcoming_week: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservations
         WHERE status = 'approved' AND start_ms >= ? AND start_ms < ?",
    )
    .bind(to_millis(now))
    .bind(to_millis(now + Duration::days(7)))
    .fetch_one(db)
    .await?;

    let top: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT e.guid, e.name, COUNT(r.guid) AS n
         FROM equipment e JOIN reservations r ON r.equipment_id = e.guid
         WHERE r.status = 'approved'
         GROUP BY e.guid, e.name
         ORDER BY n DESC, e.name
         LIMIT 5",
    )
    .fetch_all(db)
    .await?;

    Ok(Dashboard {
        equipment_total,
        equipment_active,
        users_total,
        reservations: StatusCounts {
            pending: count_of("pending"),
            approved: count_of("approved"),
            rejected: count_of("rejected"),
        },
        upcoming_week,
        top_equipment: top
            .into_iter()
            .map(|(equipment_id, name, approved_reservations)| EquipmentUsage {
                equipment_id,
                name,
                approved_reservations,
            })
            .collect(),
    })
}

//! Equipment records

use eqres_common::db::Equipment;
use eqres_common::time::now_millis;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::is_unique_violation;
use crate::error::{ApiError, ApiResult};

const EQUIPMENT_COLUMNS: &str =
    "guid, name, category, location, description, image_url, active, created_at, updated_at";

/// Editable equipment fields (create and full update)
#[derive(Debug, Clone)]
pub struct EquipmentInput {
    pub name: String,
    pub category: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
}

/// List filter
#[derive(Debug, Default, Clone)]
pub struct EquipmentFilter {
    pub category: Option<String>,
    /// Substring match on name or description
    pub search: Option<String>,
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &EquipmentFilter) {
    qb.push(" WHERE 1 = 1");
    if !filter.include_inactive {
        qb.push(" AND active = 1");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Escape LIKE wildcards so user text matches literally
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub async fn count_equipment(db: &SqlitePool, filter: &EquipmentFilter) -> ApiResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM equipment");
    push_filter(&mut qb, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(db).await?)
}

pub async fn list_equipment(
    db: &SqlitePool,
    filter: &EquipmentFilter,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<Equipment>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM equipment", EQUIPMENT_COLUMNS));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY category, name COLLATE NOCASE LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = qb.build().fetch_all(db).await?;
    Ok(rows
        .iter()
        .map(Equipment::from_row)
        .collect::<eqres_common::Result<Vec<_>>>()?)
}

/// Distinct categories of active equipment
pub async fn list_categories(db: &SqlitePool) -> ApiResult<Vec<CategoryCount>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) FROM equipment WHERE active = 1 GROUP BY category ORDER BY category",
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect())
}

pub async fn get_equipment(db: &SqlitePool, id: Uuid) -> ApiResult<Option<Equipment>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM equipment WHERE guid = ?",
        EQUIPMENT_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;
    Ok(row.as_ref().map(Equipment::from_row).transpose()?)
}

fn name_conflict(name: &str, e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict(format!("Equipment named '{}' already exists", name))
    } else {
        ApiError::Database(e)
    }
}

pub async fn create_equipment(db: &SqlitePool, input: &EquipmentInput) -> ApiResult<Equipment> {
    let id = Uuid::new_v4();
    let now = now_millis();

    sqlx::query(
        "INSERT INTO equipment (guid, name, category, location, description, image_url, active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&input.name)
    .bind(&input.category)
    .bind(&input.location)
    .bind(&input.description)
    .bind(&input.image_url)
    .bind(input.active as i64)
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .map_err(|e| name_conflict(&input.name, e))?;

    get_equipment(db, id)
        .await?
        .ok_or_else(|| ApiError::Internal("Equipment vanished after insert".to_string()))
}

pub async fn update_equipment(
    db: &SqlitePool,
    id: Uuid,
    input: &EquipmentInput,
) -> ApiResult<Equipment> {
    let result = sqlx::query(
        "UPDATE equipment
         SET name = ?, category = ?, location = ?, description = ?, image_url = ?, active = ?, updated_at = ?
         WHERE guid = ?",
    )
    .bind(&input.name)
    .bind(&input.category)
    .bind(&input.location)
    .bind(&input.description)
    .bind(&input.image_url)
    .bind(input.active as i64)
    .bind(now_millis())
    .bind(id.to_string())
    .execute(db)
    .await
    .map_err(|e| name_conflict(&input.name, e))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Equipment {}", id)));
    }

    get_equipment(db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Equipment {}", id)))
}

/// Delete equipment and its past reservations
///
/// Refused while any pending or approved reservation has not yet ended.
/// Holds the booking lock so no reservation is created between the check
/// and the delete.
pub async fn delete_equipment(db: &SqlitePool, lock: &Mutex<()>, id: Uuid) -> ApiResult<()> {
    let _guard = lock.lock().await;
    let mut tx = db.begin().await?;

    let exists: Option<String> = sqlx::query_scalar("SELECT guid FROM equipment WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ApiError::NotFound(format!("Equipment {}", id)));
    }

    let outstanding: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reservations
         WHERE equipment_id = ? AND status IN ('pending', 'approved') AND end_ms > ?",
    )
    .bind(id.to_string())
    .bind(now_millis())
    .fetch_one(&mut *tx)
    .await?;

    if outstanding > 0 {
        return Err(ApiError::Conflict(format!(
            "Equipment has {} outstanding reservation(s); reject them or retire the equipment instead",
            outstanding
        )));
    }

    sqlx::query("DELETE FROM equipment WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

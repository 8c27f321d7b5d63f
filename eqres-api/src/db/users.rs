//! User accounts

use eqres_common::auth::PasswordHash;
use eqres_common::db::{Role, User};
use eqres_common::time::now_millis;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::is_unique_violation;
use crate::error::{ApiError, ApiResult};

const USER_COLUMNS: &str = "guid, username, display_name, email, role, created_at";

/// Fields for a new account
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub password: PasswordHash,
    pub role: Role,
}

/// Stored credentials for login
#[derive(Debug)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
    pub password_salt: String,
}

/// Insert a user; duplicate usernames (case-insensitive) are a conflict
pub async fn create_user(db: &SqlitePool, new: NewUser<'_>) -> ApiResult<User> {
    let id = Uuid::new_v4();
    let now = now_millis();

    sqlx::query(
        "INSERT INTO users (guid, username, display_name, email, password_hash, password_salt, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(new.username)
    .bind(new.display_name)
    .bind(new.email)
    .bind(&new.password.hash)
    .bind(&new.password.salt)
    .bind(new.role.as_str())
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict(format!("Username '{}' is already taken", new.username))
        } else {
            ApiError::Database(e)
        }
    })?;

    get_user(db, id)
        .await?
        .ok_or_else(|| ApiError::Internal("User vanished after insert".to_string()))
}

pub async fn get_user(db: &SqlitePool, id: Uuid) -> ApiResult<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE guid = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    Ok(row.as_ref().map(User::from_row).transpose()?)
}

/// Look up login credentials by username (case-insensitive)
pub async fn find_credentials(db: &SqlitePool, username: &str) -> ApiResult<Option<Credentials>> {
    let row = sqlx::query(&format!(
        "SELECT {}, password_hash, password_salt FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => Ok(Some(Credentials {
            user: User::from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
        })),
        None => Ok(None),
    }
}

pub async fn count_users(db: &SqlitePool) -> ApiResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?)
}

pub async fn count_admins(db: &SqlitePool) -> ApiResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(db)
        .await?)
}

/// One page of users ordered by username
pub async fn list_users(db: &SqlitePool, limit: i64, offset: i64) -> ApiResult<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY username COLLATE NOCASE LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(User::from_row)
        .collect::<eqres_common::Result<Vec<_>>>()?)
}

/// Profile fields and an optional password change, applied together
#[derive(Debug)]
pub struct AccountUpdate<'a> {
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub password: Option<PasswordHash>,
    /// Session kept when a password change revokes the others
    pub keep_session: &'a str,
}

/// Apply a profile update in one transaction
///
/// A password change revokes every other session of the user. Returns the
/// number of revoked sessions.
pub async fn update_account(db: &SqlitePool, id: Uuid, update: AccountUpdate<'_>) -> ApiResult<u64> {
    let now = now_millis();
    let mut tx = db.begin().await?;

    let result = sqlx::query("UPDATE users SET display_name = ?, email = ?, updated_at = ? WHERE guid = ?")
        .bind(update.display_name)
        .bind(update.email)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("User {}", id)));
    }

    let mut revoked = 0;
    if let Some(password) = &update.password {
        sqlx::query("UPDATE users SET password_hash = ?, password_salt = ? WHERE guid = ?")
            .bind(&password.hash)
            .bind(&password.salt)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        revoked = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND token_hash != ?")
            .bind(id.to_string())
            .bind(update.keep_session)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    tx.commit().await?;
    Ok(revoked)
}

/// Change a user's role, refusing to demote the last administrator
pub async fn set_role(db: &SqlitePool, id: Uuid, role: Role) -> ApiResult<User> {
    let mut tx = db.begin().await?;

    let current: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    let current = current.ok_or_else(|| ApiError::NotFound(format!("User {}", id)))?;

    if current == Role::Admin.as_str() && role != Role::Admin {
        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&mut *tx)
            .await?;
        if admins <= 1 {
            return Err(ApiError::Conflict(
                "Cannot demote the last administrator".to_string(),
            ));
        }
    }

    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE guid = ?")
        .bind(role.as_str())
        .bind(now_millis())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    get_user(db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", id)))
}

/// Delete a user; sessions and reservations go with it (ON DELETE CASCADE)
pub async fn delete_user(db: &SqlitePool, id: Uuid) -> ApiResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("User {}", id)));
    }
    Ok(())
}

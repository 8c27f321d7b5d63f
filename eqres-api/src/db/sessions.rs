//! Login sessions
//!
//! The `sessions` table stores the SHA-256 of each bearer token, never the
//! token itself.

use chrono::{DateTime, Duration, Utc};
use eqres_common::auth::{generate_token, hash_token};
use eqres_common::db::User;
use eqres_common::time::{now, now_millis, to_millis};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Newly issued session
#[derive(Debug)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_session(db: &SqlitePool, user_id: Uuid, ttl: Duration) -> ApiResult<IssuedSession> {
    let token = generate_token();
    let created = now();
    let expires_at = created
        .checked_add_signed(ttl)
        .ok_or_else(|| ApiError::Internal(format!("Session lifetime out of range: {}", ttl)))?;

    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hash_token(&token))
    .bind(user_id.to_string())
    .bind(to_millis(created))
    .bind(to_millis(expires_at))
    .execute(db)
    .await?;

    Ok(IssuedSession { token, expires_at })
}

/// Resolve a live session to its user
pub async fn lookup_session(db: &SqlitePool, token_hash: &str) -> ApiResult<Option<User>> {
    let row = sqlx::query(
        "SELECT u.guid, u.username, u.display_name, u.email, u.role, u.created_at
         FROM sessions s JOIN users u ON u.guid = s.user_id
         WHERE s.token_hash = ? AND s.expires_at > ?",
    )
    .bind(token_hash)
    .bind(now_millis())
    .fetch_optional(db)
    .await?;

    Ok(row.as_ref().map(User::from_row).transpose()?)
}

pub async fn delete_session(db: &SqlitePool, token_hash: &str) -> ApiResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(db)
        .await?;
    Ok(())
}

/// Remove expired sessions, returning how many were deleted
pub async fn purge_expired(db: &SqlitePool) -> ApiResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now_millis())
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

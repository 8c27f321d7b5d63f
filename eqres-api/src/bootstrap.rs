//! Startup tasks: first administrator account and periodic session cleanup

use std::time::Duration;

use eqres_common::auth::{generate_token, hash_password, validate_password, validate_username};
use eqres_common::db::{Role, User};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Environment variable holding the initial administrator password
pub const ADMIN_PASSWORD_ENV: &str = "EQRES_ADMIN_PASSWORD";

/// How often expired sessions are removed
pub const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

const GENERATED_PASSWORD_LEN: usize = 20;

/// Create an administrator account when the database has none
///
/// Returns the created user, or `None` when an administrator already exists.
/// Without `password` a random one is generated and logged once.
pub async fn ensure_admin(
    db: &SqlitePool,
    username: &str,
    password: Option<String>,
) -> ApiResult<Option<User>> {
    if users::count_admins(db).await? > 0 {
        debug!("Administrator account present");
        return Ok(None);
    }

    validate_username(username).map_err(ApiError::BadRequest)?;

    let (password, generated) = match password {
        Some(p) => {
            validate_password(&p).map_err(ApiError::BadRequest)?;
            (p, false)
        }
        None => (generate_token()[..GENERATED_PASSWORD_LEN].to_string(), true),
    };

    let user = users::create_user(
        db,
        users::NewUser {
            username,
            display_name: "Administrator",
            email: None,
            password: hash_password(&password),
            role: Role::Admin,
        },
    )
    .await?;

    if generated {
        warn!(
            "Created administrator '{}' with generated password: {} (change it after first login)",
            username, password
        );
    } else {
        info!("Created administrator '{}'", username);
    }
    Ok(Some(user))
}

/// Spawn the background task that purges expired sessions and prunes idle
/// login rate-limit state
pub fn spawn_session_purge(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match sessions::purge_expired(&state.db).await {
                Ok(0) => {}
                Ok(n) => info!("Purged {} expired session(s)", n),
                Err(e) => error!("Session purge failed: {}", e),
            }
            state.login_limiter.sweep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eqres_common::db::init_database;
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("eqres.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_once() {
        let (_dir, db) = test_db().await;

        let created = ensure_admin(&db, "admin", Some("correct horse".to_string()))
            .await
            .unwrap()
            .expect("admin created");
        assert_eq!(created.role, Role::Admin);

        let again = ensure_admin(&db, "admin", None).await.unwrap();
        assert!(again.is_none());
        assert_eq!(users::count_admins(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_generates_password() {
        let (_dir, db) = test_db().await;

        ensure_admin(&db, "root", None).await.unwrap();
        let creds = users::find_credentials(&db, "root").await.unwrap().unwrap();
        assert_eq!(creds.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_ensure_admin_rejects_short_password() {
        let (_dir, db) = test_db().await;
        assert!(ensure_admin(&db, "admin", Some("short".to_string())).await.is_err());
    }
}

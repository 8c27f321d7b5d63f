//! Registration, login and logout

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Duration, Utc};
use eqres_common::auth::{hash_password, validate_password, validate_username, verify_password};
use eqres_common::db::settings::{
    duration_setting, get_bool_setting, ALLOW_SELF_REGISTRATION, SESSION_TTL_HOURS,
};
use eqres_common::db::{Role, User};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::CurrentUser;
use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Trim an optional e-mail and apply a minimal sanity check
pub(crate) fn normalize_email(email: Option<String>) -> ApiResult<Option<String>> {
    match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(e) if !e.contains('@') || e.len() > 254 => {
            Err(ApiError::BadRequest(format!("Invalid e-mail address: {}", e)))
        }
        other => Ok(other),
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    if !get_bool_setting(&state.db, ALLOW_SELF_REGISTRATION).await? {
        return Err(ApiError::Forbidden(
            "Self-registration is disabled".to_string(),
        ));
    }

    let username = req.username.trim();
    validate_username(username).map_err(ApiError::BadRequest)?;
    validate_password(&req.password).map_err(ApiError::BadRequest)?;

    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(username)
        .to_string();
    let email = normalize_email(req.email)?;

    let user = users::create_user(
        &state.db,
        users::NewUser {
            username,
            display_name: &display_name,
            email: email.as_deref(),
            password: hash_password(&req.password),
            role: Role::User,
        },
    )
    .await?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
///
/// Unknown usernames and wrong passwords get the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let username = req.username.trim();
    state.login_limiter.check(username)?;

    let credentials = users::find_credentials(&state.db, username).await?;
    let user = match credentials {
        Some(c) if verify_password(&req.password, &c.password_hash, &c.password_salt) => c.user,
        _ => {
            warn!("Failed login for '{}'", username);
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }
    };

    let ttl = duration_setting(&state.db, SESSION_TTL_HOURS, Duration::try_hours).await?;
    let session = sessions::create_session(&state.db, user.id, ttl).await?;

    info!("User {} logged in", user.username);
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    sessions::delete_session(&state.db, &current.token_hash).await?;
    info!("User {} logged out", current.user.username);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(None).unwrap(), None);
        assert_eq!(normalize_email(Some("   ".into())).unwrap(), None);
        assert_eq!(
            normalize_email(Some(" a@lab.example ".into())).unwrap().as_deref(),
            Some("a@lab.example")
        );
        assert!(normalize_email(Some("nope".into())).is_err());
    }
}

//! Profile and user management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use eqres_common::auth::{hash_password, validate_password, verify_password};
use eqres_common::db::{Role, User};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use super::sessions::normalize_email;
use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, default_page, Page, PAGE_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

/// GET /api/users/me
pub async fn get_me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

/// PATCH /api/users/me
///
/// Changing the password requires the current one and revokes every other
/// session of the account.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let me = &current.user;

    // Validate everything before writing anything
    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some("") => {
            return Err(ApiError::BadRequest(
                "display_name cannot be empty".to_string(),
            ))
        }
        Some(name) => name.to_string(),
        None => me.display_name.clone(),
    };
    let email = match req.email {
        Some(e) => normalize_email(Some(e))?,
        None => me.email.clone(),
    };

    let password = match &req.new_password {
        Some(new_password) => {
            validate_password(new_password).map_err(ApiError::BadRequest)?;

            let current_password = req.current_password.as_deref().ok_or_else(|| {
                ApiError::BadRequest("current_password is required to change password".to_string())
            })?;
            let credentials = users::find_credentials(&state.db, &me.username)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("User {}", me.id)))?;
            if !verify_password(
                current_password,
                &credentials.password_hash,
                &credentials.password_salt,
            ) {
                return Err(ApiError::Forbidden(
                    "Current password is incorrect".to_string(),
                ));
            }
            Some(hash_password(new_password))
        }
        None => None,
    };
    let changing_password = password.is_some();

    let revoked = users::update_account(
        &state.db,
        me.id,
        users::AccountUpdate {
            display_name: &display_name,
            email: email.as_deref(),
            password,
            keep_session: &current.token_hash,
        },
    )
    .await?;
    if changing_password {
        info!(
            "User {} changed password ({} other session(s) revoked)",
            me.username, revoked
        );
    }

    let updated = users::get_user(&state.db, me.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", me.id)))?;
    Ok(Json(updated))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<User>>> {
    let total = users::count_users(&state.db).await?;
    let p = calculate_pagination(total, query.page);
    let items = users::list_users(&state.db, PAGE_SIZE, p.offset).await?;
    Ok(Json(Page::new(p, total, items)))
}

/// PATCH /api/admin/users/:id
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    let user = users::set_role(&state.db, id, req.role).await?;
    info!(
        "{} set role of {} to {}",
        current.user.username, user.username, user.role
    );
    Ok(Json(user))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if id == current.user.id {
        return Err(ApiError::Conflict(
            "Administrators cannot delete their own account".to_string(),
        ));
    }
    users::delete_user(&state.db, id).await?;
    info!("{} deleted user {}", current.user.username, id);
    Ok(StatusCode::NO_CONTENT)
}

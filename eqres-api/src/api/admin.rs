//! Admin dashboard and runtime settings

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use eqres_common::db::settings::{self, setting_def};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::CurrentUser;
use crate::db::stats::{self, Dashboard};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SettingView {
    pub key: String,
    pub value: String,
    pub default: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
}

/// GET /api/admin/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Json<Dashboard>> {
    Ok(Json(stats::dashboard(&state.db).await?))
}

/// GET /api/admin/settings
pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Json<Vec<SettingView>>> {
    let all = settings::list_settings(&state.db).await?;
    Ok(Json(
        all.into_iter()
            .map(|(def, value)| SettingView {
                key: def.key.to_string(),
                value,
                default: def.default_value.to_string(),
                description: def.description.to_string(),
            })
            .collect(),
    ))
}

/// PUT /api/admin/settings/:key
pub async fn update_setting(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> ApiResult<Json<SettingView>> {
    let def = setting_def(&key).ok_or_else(|| ApiError::NotFound(format!("Setting {}", key)))?;
    let value = req.value.trim();

    settings::set_setting(&state.db, def.key, value).await?;
    info!("{} set {} = {}", current.user.username, def.key, value);

    Ok(Json(SettingView {
        key: def.key.to_string(),
        value: value.to_string(),
        default: def.default_value.to_string(),
        description: def.description.to_string(),
    }))
}

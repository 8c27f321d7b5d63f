//! Authentication middleware
//!
//! Resolves `Authorization: Bearer <token>` to a [`CurrentUser`] stored in
//! request extensions. The `token` query parameter is accepted as a fallback
//! because browsers cannot set headers on an `EventSource`.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use eqres_common::auth::hash_token;
use eqres_common::db::User;
use tracing::debug;

use crate::db::sessions::lookup_session;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller, available to handlers via `Extension<CurrentUser>`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Digest of the bearer token used for this request
    pub token_hash: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Pull the bearer token out of the request
fn extract_token(request: &Request) -> Option<String> {
    if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        let value = value.to_str().ok()?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))?;
        return Some(token.trim().to_string());
    }

    request.uri().query().and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "token")
            .map(|(_, value)| value.to_string())
    })
}

/// Authentication middleware
///
/// Returns 401 when the token is missing, unknown or expired.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&request)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let token_hash = hash_token(&token);
    let user = lookup_session(&state.db, &token_hash)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;

    debug!("Authenticated {} ({})", user.username, user.role);
    request
        .extensions_mut()
        .insert(CurrentUser { user, token_hash });

    Ok(next.run(request).await)
}

/// Reject non-administrators with 403
///
/// Must run inside [`auth_middleware`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    if !current.is_admin() {
        return Err(ApiError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_header() {
        let req = request("/api/equipment", Some("Bearer abc123"));
        assert_eq!(extract_token(&req).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_query_fallback() {
        let req = request("/api/events?x=1&token=def456", None);
        assert_eq!(extract_token(&req).as_deref(), Some("def456"));
    }

    #[test]
    fn test_non_bearer_scheme_ignored() {
        let req = request("/api/equipment", Some("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&req), None);
    }

    #[test]
    fn test_missing_token() {
        let req = request("/api/equipment", None);
        assert_eq!(extract_token(&req), None);
    }
}

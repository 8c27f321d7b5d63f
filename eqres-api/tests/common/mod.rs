//! Shared helpers for eqres-api integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use eqres_api::db::users::{create_user, NewUser};
use eqres_api::{build_router, AppState};
use eqres_common::auth::hash_password;
use eqres_common::db::{init_database, Role};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_PASSWORD: &str = "user-password";

/// Running app backed by a throwaway database
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub db: SqlitePool,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_login_limit(100).await
    }

    pub async fn with_login_limit(per_minute: u32) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let db = init_database(&dir.path().join("eqres.db"))
            .await
            .expect("database init");
        let state = AppState::new(db.clone(), per_minute);
        let app = build_router(state.clone());

        let app = Self {
            app,
            state,
            db,
            _dir: dir,
        };
        app.add_user("admin", ADMIN_PASSWORD, Role::Admin).await;
        app.add_user("alice", USER_PASSWORD, Role::User).await;
        app
    }

    pub async fn add_user(&self, username: &str, password: &str, role: Role) {
        create_user(
            &self.db,
            NewUser {
                username,
                display_name: username,
                email: None,
                password: hash_password(password),
                role,
            },
        )
        .await
        .expect("create user");
    }

    /// Send a request with an optional bearer token and JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": username, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login("admin", ADMIN_PASSWORD).await
    }

    pub async fn user_token(&self) -> String {
        self.login("alice", USER_PASSWORD).await
    }

    /// Create equipment through the admin API and return its id
    pub async fn create_equipment(&self, admin: &str, name: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/admin/equipment",
                Some(admin),
                Some(json!({"name": name, "category": "AV", "location": "Room 1"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create equipment: {}", body);
        body["id"].as_str().expect("id").to_string()
    }

    pub async fn reserve(
        &self,
        token: &str,
        equipment_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/api/reservations",
            Some(token),
            Some(json!({
                "equipment_id": equipment_id,
                "start": start,
                "end": end,
                "purpose": "Team meeting",
            })),
        )
        .await
    }
}

/// Start of the hour `hours` from now, far enough ahead to pass booking checks
pub fn hours_ahead(hours: i64) -> DateTime<Utc> {
    (Utc::now() + Duration::hours(hours))
        .duration_trunc(Duration::hours(1))
        .expect("truncate")
}

//! eqres-api library - Equipment reservation HTTP service
//!
//! Users browse equipment and request time slots; administrators review
//! requests and manage equipment, users and settings.

use std::sync::Arc;

use axum::Router;
use eqres_common::events::EventBus;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod pagination;

use api::rate_limit::LoginLimiter;

/// Events buffered per SSE subscriber before the oldest are dropped
const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Reservation event broadcast
    pub events: Arc<EventBus>,
    /// Serializes schedule-dependent writes (create, approve, cancel)
    pub booking_lock: Arc<Mutex<()>>,
    /// Per-username login throttle
    pub login_limiter: Arc<LoginLimiter>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, login_attempts_per_minute: u32) -> Self {
        Self {
            db,
            events: Arc::new(EventBus::new(EVENT_BUS_CAPACITY)),
            booking_lock: Arc::new(Mutex::new(())),
            login_limiter: Arc::new(LoginLimiter::new(login_attempts_per_minute)),
        }
    }
}

/// Build application router
///
/// Three tiers: public (health, login, registration), authenticated
/// (browsing, own reservations, profile) and admin (review, management).
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    // Authenticated routes
    let protected = Router::new()
        .route("/api/auth/logout", post(api::logout))
        .route("/api/users/me", get(api::get_me).patch(api::update_me))
        .route("/api/equipment", get(api::list_equipment))
        .route("/api/equipment/categories", get(api::list_categories))
        .route("/api/equipment/:id", get(api::get_equipment))
        .route("/api/equipment/:id/availability", get(api::get_availability))
        .route(
            "/api/reservations",
            get(api::list_reservations).post(api::create_reservation),
        )
        .route(
            "/api/reservations/:id",
            get(api::get_reservation).delete(api::cancel_reservation),
        )
        .route("/api/events", get(api::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Administrator routes; auth_middleware is the outer layer so
    // require_admin always sees a CurrentUser
    let admin = Router::new()
        .route("/api/admin/dashboard", get(api::get_dashboard))
        .route("/api/admin/equipment", post(api::create_equipment))
        .route(
            "/api/admin/equipment/:id",
            put(api::update_equipment).delete(api::delete_equipment),
        )
        .route(
            "/api/admin/reservations/:id/approve",
            post(api::approve_reservation),
        )
        .route(
            "/api/admin/reservations/:id/reject",
            post(api::reject_reservation),
        )
        .route("/api/admin/users", get(api::list_users))
        .route(
            "/api/admin/users/:id",
            axum::routing::patch(api::update_user_role).delete(api::delete_user),
        )
        .route("/api/admin/settings", get(api::list_settings))
        .route("/api/admin/settings/:key", put(api::update_setting))
        .layer(middleware::from_fn(api::require_admin))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/register", post(api::register))
        .route("/api/auth/login", post(api::login))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(admin)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! HTTP API handlers

pub mod admin;
pub mod auth;
pub mod buildinfo;
pub mod equipment;
pub mod health;
pub mod rate_limit;
pub mod reservations;
pub mod sessions;
pub mod sse;
pub mod users;

pub use admin::{get_dashboard, list_settings, update_setting};
pub use auth::{auth_middleware, require_admin, CurrentUser};
pub use buildinfo::get_build_info;
pub use equipment::{
    create_equipment, delete_equipment, get_availability, get_equipment, list_categories,
    list_equipment, update_equipment,
};
pub use health::health_routes;
pub use reservations::{
    approve_reservation, cancel_reservation, create_reservation, get_reservation,
    list_reservations, reject_reservation,
};
pub use sessions::{login, logout, register};
pub use sse::event_stream;
pub use users::{delete_user, get_me, list_users, update_me, update_user_role};

//! Database access layer
//!
//! SQL lives here; handlers in `api/` call these functions and never build
//! queries themselves. Booking decisions are delegated to
//! `eqres_common::booking`.

pub mod equipment;
pub mod reservations;
pub mod sessions;
pub mod stats;
pub mod users;

/// True if a sqlx error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

//! # EQRES Common Library
//!
//! Shared code for the equipment reservation service:
//! - Booking rules (time slots, overlap detection, policy, status transitions)
//! - Database initialization, migrations and models
//! - Password hashing and session token helpers
//! - Event types and the EventBus
//! - Configuration loading

pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use booking::{BookingError, BookingPolicy, ReservationStatus, ReviewAction, TimeSlot};
pub use error::{Error, Result};

//! Reservation status and review transitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BookingError;

/// Lifecycle status of a reservation
///
/// Stored in the `reservations.status` column as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Administrator decision on a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 3] = [
        ReservationStatus::Pending,
        ReservationStatus::Approved,
        ReservationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Rejected => "rejected",
        }
    }

    /// Pending and approved reservations both hold their time slot
    pub fn blocks_slot(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Approved)
    }

    /// Apply an administrator decision
    ///
    /// Rejected is terminal. An approved reservation can still be revoked.
    pub fn apply(self, action: ReviewAction) -> Result<ReservationStatus, BookingError> {
        match (self, action) {
            (ReservationStatus::Pending, ReviewAction::Approve) => Ok(ReservationStatus::Approved),
            (ReservationStatus::Pending, ReviewAction::Reject)
            | (ReservationStatus::Approved, ReviewAction::Reject) => Ok(ReservationStatus::Rejected),
            (from, action) => Err(BookingError::InvalidTransition { from, action }),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "approved" => Ok(ReservationStatus::Approved),
            "rejected" => Ok(ReservationStatus::Rejected),
            other => Err(format!("Unknown reservation status: {}", other)),
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => f.write_str("approve"),
            ReviewAction::Reject => f.write_str("reject"),
        }
    }
}

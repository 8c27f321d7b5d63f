//! Event types and EventBus
//!
//! Handlers emit an [`EqresEvent`] after a successful write; the SSE endpoint
//! forwards them to connected clients. Emission is lossy: nobody listening is
//! not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::booking::ReservationStatus;

/// What happened to a piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentChange {
    Created,
    Updated,
    Deleted,
}

/// EQRES event types
///
/// Serialized with a `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EqresEvent {
    /// A new reservation request was submitted
    ReservationCreated {
        reservation_id: Uuid,
        equipment_id: Uuid,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// An administrator approved or rejected a reservation
    ReservationReviewed {
        reservation_id: Uuid,
        equipment_id: Uuid,
        old_status: ReservationStatus,
        new_status: ReservationStatus,
        reviewed_by: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A reservation was withdrawn before it started
    ReservationCancelled {
        reservation_id: Uuid,
        equipment_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Equipment record created, edited or removed
    EquipmentChanged {
        equipment_id: Uuid,
        change: EquipmentChange,
        timestamp: DateTime<Utc>,
    },
}

impl EqresEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            EqresEvent::ReservationCreated { .. } => "ReservationCreated",
            EqresEvent::ReservationReviewed { .. } => "ReservationReviewed",
            EqresEvent::ReservationCancelled { .. } => "ReservationCancelled",
            EqresEvent::EquipmentChanged { .. } => "EquipmentChanged",
        }
    }
}

/// Broadcast channel shared by all handlers
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<EqresEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EqresEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` if no subscribers are listening
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: EqresEvent) -> Result<usize, broadcast::error::SendError<EqresEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EqresEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

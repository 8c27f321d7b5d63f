//! Reservation booking rules
//!
//! Pure functions over time slots. Nothing here touches the database: the
//! store in eqres-api loads the blocking reservations of one piece of
//! equipment and hands them to [`find_conflict`] / [`free_slots`].
//!
//! All slots are half-open intervals `[start, end)`, so a reservation ending
//! at 10:00 and another starting at 10:00 do not collide.

mod policy;
mod status;

pub use policy::BookingPolicy;
pub use status::{ReservationStatus, ReviewAction};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Booking rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// Slot start is not strictly before its end
    #[error("Reservation must end after it starts")]
    InvalidRange,

    /// Slot shorter than the configured minimum
    #[error("Reservation shorter than the minimum of {min_minutes} minutes")]
    TooShort { min_minutes: i64 },

    /// Slot longer than the configured maximum
    #[error("Reservation longer than the maximum of {max_minutes} minutes")]
    TooLong { max_minutes: i64 },

    /// Slot starts in the past
    #[error("Reservation cannot start in the past")]
    InPast,

    /// Slot starts inside the minimum lead time
    #[error("Reservation must be made at least {lead_minutes} minutes in advance")]
    TooSoon { lead_minutes: i64 },

    /// Slot ends beyond the booking horizon
    #[error("Reservation cannot end more than {horizon_days} days ahead")]
    BeyondHorizon { horizon_days: i64 },

    /// Slot overlaps a pending or approved reservation
    #[error("Time slot overlaps reservation {with}")]
    Conflict { with: Uuid },

    /// Status change not allowed from the current status
    #[error("Cannot {action} a reservation that is {from}")]
    InvalidTransition {
        from: ReservationStatus,
        action: ReviewAction,
    },
}

/// Half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeSlot {
    /// Create a slot, rejecting empty or inverted ranges
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BookingError> {
        if start >= end {
            return Err(BookingError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True if `instant` falls inside the slot
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Interval overlap test; touching slots do not overlap
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Intersection with `window`, if any
    fn clip_to(&self, window: &TimeSlot) -> Option<TimeSlot> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start < end).then_some(TimeSlot { start, end })
    }
}

/// Return the id of the first busy slot overlapping `slot`
pub fn find_conflict(slot: &TimeSlot, busy: &[(Uuid, TimeSlot)]) -> Option<Uuid> {
    busy.iter()
        .find(|(_, other)| slot.overlaps(other))
        .map(|(id, _)| *id)
}

/// Compute the free gaps inside `window`
///
/// `busy` may be unsorted and its slots may overlap each other (pending
/// requests can sit next to approved ones). Gaps shorter than `min_len` are
/// dropped.
pub fn free_slots(window: TimeSlot, busy: &[TimeSlot], min_len: Duration) -> Vec<TimeSlot> {
    let mut clipped: Vec<TimeSlot> = busy.iter().filter_map(|b| b.clip_to(&window)).collect();
    clipped.sort_by_key(|s| s.start);

    let mut gaps = Vec::new();
    let mut cursor = window.start;

    for b in &clipped {
        if b.start > cursor {
            gaps.push(TimeSlot {
                start: cursor,
                end: b.start,
            });
        }
        cursor = cursor.max(b.end);
    }

    if cursor < window.end {
        gaps.push(TimeSlot {
            start: cursor,
            end: window.end,
        });
    }

    gaps.retain(|g| g.duration() >= min_len);
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, hour, minute, 0).unwrap()
    }

    fn slot(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeSlot {
        TimeSlot::new(at(h1, m1), at(h2, m2)).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_and_empty_ranges() {
        assert_eq!(TimeSlot::new(at(10, 0), at(9, 0)), Err(BookingError::InvalidRange));
        assert_eq!(TimeSlot::new(at(10, 0), at(10, 0)), Err(BookingError::InvalidRange));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = slot(9, 0, 11, 0);
        let b = slot(10, 0, 12, 0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_touching_slots_do_not_overlap() {
        let a = slot(9, 0, 10, 0);
        let b = slot(10, 0, 11, 0);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_containment_overlaps() {
        let outer = slot(8, 0, 18, 0);
        let inner = slot(12, 0, 12, 30);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_contains_is_half_open() {
        let s = slot(9, 0, 10, 0);
        assert!(s.contains(at(9, 0)));
        assert!(s.contains(at(9, 59)));
        assert!(!s.contains(at(10, 0)));
    }

    #[test]
    fn test_find_conflict_reports_first_overlap() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let busy = vec![
            (Uuid::new_v4(), slot(7, 0, 8, 0)),
            (first, slot(9, 30, 10, 30)),
            (second, slot(10, 0, 11, 0)),
        ];
        assert_eq!(find_conflict(&slot(9, 0, 10, 15), &busy), Some(first));
        assert_eq!(find_conflict(&slot(8, 0, 9, 30), &busy), None);
    }

    #[test]
    fn test_free_slots_empty_schedule_is_whole_window() {
        let window = slot(8, 0, 18, 0);
        assert_eq!(free_slots(window, &[], Duration::minutes(30)), vec![window]);
    }

    #[test]
    fn test_free_slots_merges_overlapping_busy_ranges() {
        let window = slot(8, 0, 18, 0);
        let busy = vec![slot(13, 0, 15, 0), slot(9, 0, 11, 0), slot(10, 0, 12, 0)];
        let free = free_slots(window, &busy, Duration::zero());
        assert_eq!(
            free,
            vec![slot(8, 0, 9, 0), slot(12, 0, 13, 0), slot(15, 0, 18, 0)]
        );
    }

    #[test]
    fn test_free_slots_clips_busy_outside_window() {
        let window = slot(8, 0, 12, 0);
        let busy = vec![slot(6, 0, 9, 0), slot(11, 0, 14, 0)];
        assert_eq!(free_slots(window, &busy, Duration::zero()), vec![slot(9, 0, 11, 0)]);
    }

    #[test]
    fn test_free_slots_drops_short_gaps() {
        let window = slot(8, 0, 12, 0);
        let busy = vec![slot(8, 0, 9, 0), slot(9, 10, 11, 0)];
        let free = free_slots(window, &busy, Duration::minutes(30));
        assert_eq!(free, vec![slot(11, 0, 12, 0)]);
    }

    #[test]
    fn test_free_slots_fully_booked() {
        let window = slot(8, 0, 12, 0);
        let busy = vec![slot(7, 0, 10, 0), slot(10, 0, 13, 0)];
        assert!(free_slots(window, &busy, Duration::zero()).is_empty());
    }
}

//! Booking policy limits

use chrono::{DateTime, Duration, Utc};

use super::{BookingError, TimeSlot};

/// Limits applied to every new reservation request
///
/// Loaded from the `settings` table on each request (see
/// `db::settings::load_booking_policy`), so administrators can tune them
/// without a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// How far ahead a reservation may end
    pub horizon: Duration,
    /// Minimum notice between now and the start of a reservation
    pub min_lead: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_duration: Duration::minutes(15),
            max_duration: Duration::minutes(480),
            horizon: Duration::days(90),
            min_lead: Duration::zero(),
        }
    }
}

impl BookingPolicy {
    /// Check a requested slot against the policy at time `now`
    pub fn validate(&self, slot: &TimeSlot, now: DateTime<Utc>) -> Result<(), BookingError> {
        if slot.start() < now {
            return Err(BookingError::InPast);
        }
        // An unrepresentable earliest start means nothing is late enough
        let earliest = now.checked_add_signed(self.min_lead);
        if earliest.map_or(true, |earliest| slot.start() < earliest) {
            return Err(BookingError::TooSoon {
                lead_minutes: self.min_lead.num_minutes(),
            });
        }
        if slot.duration() < self.min_duration {
            return Err(BookingError::TooShort {
                min_minutes: self.min_duration.num_minutes(),
            });
        }
        if slot.duration() > self.max_duration {
            return Err(BookingError::TooLong {
                max_minutes: self.max_duration.num_minutes(),
            });
        }
        let latest = now.checked_add_signed(self.horizon);
        if latest.is_some_and(|latest| slot.end() > latest) {
            return Err(BookingError::BeyondHorizon {
                horizon_days: self.horizon.num_days(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 10, 12, 0, 0).unwrap()
    }

    fn slot_from_now(offset_min: i64, len_min: i64) -> TimeSlot {
        let start = now() + Duration::minutes(offset_min);
        TimeSlot::new(start, start + Duration::minutes(len_min)).unwrap()
    }

    #[test]
    fn test_default_policy_accepts_ordinary_request() {
        let policy = BookingPolicy::default();
        assert_eq!(policy.validate(&slot_from_now(60, 120), now()), Ok(()));
    }

    #[test]
    fn test_past_start_rejected() {
        let policy = BookingPolicy::default();
        assert_eq!(policy.validate(&slot_from_now(-5, 60), now()), Err(BookingError::InPast));
    }

    #[test]
    fn test_lead_time_enforced() {
        let policy = BookingPolicy {
            min_lead: Duration::minutes(30),
            ..BookingPolicy::default()
        };
        assert_eq!(
            policy.validate(&slot_from_now(10, 60), now()),
            Err(BookingError::TooSoon { lead_minutes: 30 })
        );
        assert_eq!(policy.validate(&slot_from_now(30, 60), now()), Ok(()));
    }

    #[test]
    fn test_duration_bounds_are_inclusive() {
        let policy = BookingPolicy::default();
        assert_eq!(policy.validate(&slot_from_now(60, 15), now()), Ok(()));
        assert_eq!(policy.validate(&slot_from_now(60, 480), now()), Ok(()));
        assert_eq!(
            policy.validate(&slot_from_now(60, 14), now()),
            Err(BookingError::TooShort { min_minutes: 15 })
        );
        assert_eq!(
            policy.validate(&slot_from_now(60, 481), now()),
            Err(BookingError::TooLong { max_minutes: 480 })
        );
    }

    #[test]
    fn test_horizon_applies_to_end_time() {
        let policy = BookingPolicy {
            horizon: Duration::days(1),
            ..BookingPolicy::default()
        };
        let ends_on_horizon = slot_from_now(24 * 60 - 60, 60);
        assert_eq!(policy.validate(&ends_on_horizon, now()), Ok(()));

        let crosses_horizon = slot_from_now(24 * 60 - 30, 60);
        assert_eq!(
            policy.validate(&crosses_horizon, now()),
            Err(BookingError::BeyondHorizon { horizon_days: 1 })
        );
    }

    #[test]
    fn test_extreme_limits_do_not_overflow() {
        let unbounded = BookingPolicy {
            horizon: Duration::MAX,
            ..BookingPolicy::default()
        };
        assert_eq!(unbounded.validate(&slot_from_now(60, 60), now()), Ok(()));

        let unreachable_lead = BookingPolicy {
            min_lead: Duration::MAX,
            ..BookingPolicy::default()
        };
        assert!(matches!(
            unreachable_lead.validate(&slot_from_now(60, 60), now()),
            Err(BookingError::TooSoon { .. })
        ));
    }
}

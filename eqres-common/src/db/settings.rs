//! Settings table access and default values
//!
//! Booking limits and session lifetime are runtime tunables stored as text
//! in `settings`. Unknown keys are rejected on write.

use crate::booking::BookingPolicy;
use crate::{Error, Result};
use chrono::Duration;
use sqlx::SqlitePool;
use tracing::warn;

/// Kind of value a setting holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// Integer within `min..=max`
    Int { min: i64, max: i64 },
    Bool,
}

/// Known setting with its default and description
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub key: &'static str,
    pub default_value: &'static str,
    pub kind: SettingKind,
    pub description: &'static str,
}

pub const BOOKING_MIN_DURATION_MINUTES: &str = "booking_min_duration_minutes";
pub const BOOKING_MAX_DURATION_MINUTES: &str = "booking_max_duration_minutes";
pub const BOOKING_HORIZON_DAYS: &str = "booking_horizon_days";
pub const BOOKING_MIN_LEAD_MINUTES: &str = "booking_min_lead_minutes";
pub const SESSION_TTL_HOURS: &str = "session_ttl_hours";
pub const ALLOW_SELF_REGISTRATION: &str = "allow_self_registration";
pub const LOGIN_ATTEMPTS_PER_MINUTE: &str = "login_attempts_per_minute";

/// Every setting the service understands
pub const SETTING_DEFS: &[SettingDef] = &[
    SettingDef {
        key: BOOKING_MIN_DURATION_MINUTES,
        default_value: "15",
        kind: SettingKind::Int { min: 1, max: 1440 },
        description: "Shortest reservation accepted, in minutes",
    },
    SettingDef {
        key: BOOKING_MAX_DURATION_MINUTES,
        default_value: "480",
        kind: SettingKind::Int { min: 1, max: 10080 },
        description: "Longest reservation accepted, in minutes",
    },
    SettingDef {
        key: BOOKING_HORIZON_DAYS,
        default_value: "90",
        kind: SettingKind::Int { min: 1, max: 3650 },
        description: "How many days ahead a reservation may end",
    },
    SettingDef {
        key: BOOKING_MIN_LEAD_MINUTES,
        default_value: "0",
        kind: SettingKind::Int { min: 0, max: 525600 },
        description: "Minimum notice before a reservation starts, in minutes",
    },
    SettingDef {
        key: SESSION_TTL_HOURS,
        default_value: "24",
        kind: SettingKind::Int { min: 1, max: 8760 },
        description: "Lifetime of a login session, in hours",
    },
    SettingDef {
        key: ALLOW_SELF_REGISTRATION,
        default_value: "true",
        kind: SettingKind::Bool,
        description: "Whether anyone may create an account via /api/auth/register",
    },
    SettingDef {
        key: LOGIN_ATTEMPTS_PER_MINUTE,
        default_value: "10",
        kind: SettingKind::Int { min: 1, max: 10000 },
        description: "Login attempts allowed per username per minute (read at startup)",
    },
];

/// Look up a setting definition
pub fn setting_def(key: &str) -> Option<&'static SettingDef> {
    SETTING_DEFS.iter().find(|d| d.key == key)
}

/// Validate a value for a known key
pub fn validate_setting_value(key: &str, value: &str) -> Result<()> {
    let def = setting_def(key)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown setting: {}", key)))?;

    let ok = match def.kind {
        SettingKind::Int { min, max } => value
            .parse::<i64>()
            .map(|v| (min..=max).contains(&v))
            .unwrap_or(false),
        SettingKind::Bool => matches!(value, "true" | "false"),
    };

    if !ok {
        let expected = match def.kind {
            SettingKind::Int { min, max } => format!("an integer from {} to {}", min, max),
            SettingKind::Bool => "true or false".to_string(),
        };
        return Err(Error::InvalidInput(format!(
            "Setting {} must be {}",
            key, expected
        )));
    }
    Ok(())
}

/// Insert defaults for missing settings and repair NULL values
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for def in SETTING_DEFS {
        ensure_setting(pool, def.key, def.default_value).await?;
    }
    Ok(())
}

/// Ensure a setting exists, resetting NULL to the default
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

/// Read a raw setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Validate and write a setting
///
/// The booking minimum may not exceed the booking maximum.
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    validate_setting_value(key, value)?;

    let duration_bounds = match key {
        BOOKING_MIN_DURATION_MINUTES => Some((
            parse_int(key, value)?,
            get_i64_setting(pool, BOOKING_MAX_DURATION_MINUTES).await?,
        )),
        BOOKING_MAX_DURATION_MINUTES => Some((
            get_i64_setting(pool, BOOKING_MIN_DURATION_MINUTES).await?,
            parse_int(key, value)?,
        )),
        _ => None,
    };
    if let Some((min, max)) = duration_bounds {
        if min > max {
            return Err(Error::InvalidInput(format!(
                "{} ({}) cannot exceed {} ({})",
                BOOKING_MIN_DURATION_MINUTES, min, BOOKING_MAX_DURATION_MINUTES, max
            )));
        }
    }

    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// All known settings with their current values
pub async fn list_settings(pool: &SqlitePool) -> Result<Vec<(&'static SettingDef, String)>> {
    let mut out = Vec::with_capacity(SETTING_DEFS.len());
    for def in SETTING_DEFS {
        let value = get_setting(pool, def.key)
            .await?
            .unwrap_or_else(|| def.default_value.to_string());
        out.push((def, value));
    }
    Ok(out)
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Setting {} must be an integer", key)))
}

/// Read an integer setting, falling back to its default on bad or
/// out-of-range data
pub async fn get_i64_setting(pool: &SqlitePool, key: &str) -> Result<i64> {
    let def = setting_def(key)
        .ok_or_else(|| Error::Internal(format!("Unknown setting: {}", key)))?;
    let default: i64 = def
        .default_value
        .parse()
        .map_err(|_| Error::Internal(format!("Bad default for {}", key)))?;

    match get_setting(pool, key).await? {
        Some(raw) if validate_setting_value(key, &raw).is_ok() => parse_int(key, &raw),
        Some(raw) => {
            warn!("Setting {} has invalid value '{}', using {}", key, raw, default);
            Ok(default)
        }
        None => Ok(default),
    }
}

/// Read a boolean setting, falling back to its default on bad data
pub async fn get_bool_setting(pool: &SqlitePool, key: &str) -> Result<bool> {
    let def = setting_def(key)
        .ok_or_else(|| Error::Internal(format!("Unknown setting: {}", key)))?;
    let raw = get_setting(pool, key)
        .await?
        .unwrap_or_else(|| def.default_value.to_string());
    match raw.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => {
            warn!("Setting {} has non-boolean value '{}'", key, other);
            Ok(def.default_value == "true")
        }
    }
}

/// Build the booking policy from current settings
pub async fn load_booking_policy(pool: &SqlitePool) -> Result<BookingPolicy> {
    Ok(BookingPolicy {
        min_duration: minutes_setting(pool, BOOKING_MIN_DURATION_MINUTES).await?,
        max_duration: minutes_setting(pool, BOOKING_MAX_DURATION_MINUTES).await?,
        horizon: duration_setting(pool, BOOKING_HORIZON_DAYS, Duration::try_days).await?,
        min_lead: minutes_setting(pool, BOOKING_MIN_LEAD_MINUTES).await?,
    })
}

/// Read an integer setting as a duration of the given unit
pub async fn duration_setting(
    pool: &SqlitePool,
    key: &str,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration> {
    let value = get_i64_setting(pool, key).await?;
    unit(value).ok_or_else(|| Error::Internal(format!("Setting {} out of range: {}", key, value)))
}

async fn minutes_setting(pool: &SqlitePool, key: &str) -> Result<Duration> {
    duration_setting(pool, key, Duration::try_minutes).await
}

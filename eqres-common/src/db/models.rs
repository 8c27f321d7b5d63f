//! Database models
//!
//! Each model maps one row of its table. Times come back from SQLite as
//! epoch milliseconds and are converted to `DateTime<Utc>` here, so nothing
//! above the store layer sees raw integers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::booking::{ReservationStatus, TimeSlot};
use crate::time::from_millis;
use crate::uuid_utils::parse_column;
use crate::{Error, Result};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Registered account (password columns omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Columns expected: guid, username, display_name, email, role, created_at
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_column(&row.try_get::<String, _>("guid")?)?,
            username: row.try_get("username")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            role: row
                .try_get::<String, _>("role")?
                .parse()
                .map_err(Error::Internal)?,
            created_at: from_millis(row.try_get("created_at")?),
        })
    }
}

/// Bookable item (room, projector, lab instrument, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Retired equipment stays listed for history but cannot be booked
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: parse_column(&row.try_get::<String, _>("guid")?)?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            location: row.try_get("location")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            active: row.try_get::<i64, _>("active")? != 0,
            created_at: from_millis(row.try_get("created_at")?),
            updated_at: from_millis(row.try_get("updated_at")?),
        })
    }
}

/// Reservation of one piece of equipment for one time slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub purpose: String,
    pub status: ReservationStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let reviewed_by: Option<String> = row.try_get("reviewed_by")?;
        Ok(Self {
            id: parse_column(&row.try_get::<String, _>("guid")?)?,
            equipment_id: parse_column(&row.try_get::<String, _>("equipment_id")?)?,
            user_id: parse_column(&row.try_get::<String, _>("user_id")?)?,
            start: from_millis(row.try_get("start_ms")?),
            end: from_millis(row.try_get("end_ms")?),
            purpose: row.try_get("purpose")?,
            status: row
                .try_get::<String, _>("status")?
                .parse()
                .map_err(Error::Internal)?,
            reviewed_by: reviewed_by.as_deref().map(parse_column).transpose()?,
            review_note: row.try_get("review_note")?,
            created_at: from_millis(row.try_get("created_at")?),
            updated_at: from_millis(row.try_get("updated_at")?),
        })
    }

    /// The reserved interval
    pub fn slot(&self) -> Result<TimeSlot> {
        Ok(TimeSlot::new(self.start, self.end)?)
    }
}

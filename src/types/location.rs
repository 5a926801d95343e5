//! Service location types: locations, weekly opening hours, date exceptions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Service location status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "location_status", rename_all = "snake_case")]
pub enum LocationStatus {
    Open,
    Planned,
    Done,
    Cancelled,
    NotVisited,
}

impl LocationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            LocationStatus::Open => "open",
            LocationStatus::Planned => "planned",
            LocationStatus::Done => "done",
            LocationStatus::Cancelled => "cancelled",
            LocationStatus::NotVisited => "not_visited",
        }
    }
}

/// A service location to be visited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLocation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Latest acceptable service date
    pub due_date: NaiveDate,
    /// Optional earliest/ordering date
    pub priority_date: Option<NaiveDate>,
    pub service_minutes: i32,
    /// Required driver capability; `None` = any driver
    pub service_type_id: Option<Uuid>,
    pub status: LocationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceLocation {
    pub fn point(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// Weekly opening hours: one row per (location, day-of-week 0–6, Sunday = 0),
/// with up to two open/close ranges to support a lunch-break gap. No rows at
/// all for a location means "always open".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLocationHours {
    pub id: Uuid,
    pub location_id: Uuid,
    /// 0–6, Sunday-first
    pub day_of_week: i16,
    pub is_closed: bool,
    /// Minutes-of-day; both set for an open range
    pub open_minute: Option<i32>,
    pub close_minute: Option<i32>,
    /// Second range (after the lunch break), if any
    pub open_minute_2: Option<i32>,
    pub close_minute_2: Option<i32>,
}

/// Date-specific override: fully closed, or a single open/close range that
/// replaces the weekly determination for that date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLocationException {
    pub id: Uuid,
    pub location_id: Uuid,
    pub date: NaiveDate,
    pub is_closed: bool,
    pub open_minute: Option<i32>,
    pub close_minute: Option<i32>,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(LocationStatus::Open.as_str(), "open");
        assert_eq!(LocationStatus::NotVisited.as_str(), "not_visited");
    }

    #[test]
    fn test_location_serializes_camel_case() {
        let loc = ServiceLocation {
            id: Uuid::nil(),
            owner_id: Uuid::nil(),
            name: "Pump station".to_string(),
            lat: 50.1,
            lng: 14.4,
            due_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            priority_date: None,
            service_minutes: 45,
            service_type_id: None,
            status: LocationStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&loc).unwrap();
        assert!(json.contains("\"dueDate\""));
        assert!(json.contains("\"serviceMinutes\":45"));
        assert!(json.contains("\"status\":\"open\""));
    }
}

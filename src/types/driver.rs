//! Driver types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Driver entity. Referenced (never mutated) during planning.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// Start location of the daily route (home/depot)
    pub start_lat: f64,
    pub start_lng: f64,
    /// Default service duration for stops without an explicit value
    pub default_service_minutes: i32,
    /// Hard cap on planned work per day (travel + wait + service)
    pub max_work_minutes_per_day: i32,
    pub is_active: bool,
    /// Service types this driver can handle; an empty set only matches
    /// stops with no required type (see `can_service`)
    pub service_type_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn start_point(&self) -> Coordinates {
        Coordinates::new(self.start_lat, self.start_lng)
    }

    /// Whether the driver can service the given required type.
    /// `None` (no requirement) matches anyone; an empty capability set only
    /// matches unrestricted stops.
    pub fn can_service(&self, required: Option<Uuid>) -> bool {
        match required {
            None => true,
            Some(t) => self.service_type_ids.contains(&t),
        }
    }
}

/// One availability row per (driver, calendar date). Minutes-of-day with
/// `end_minute > start_minute`; this is the outer feasibility window for the
/// driver on that date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DriverAvailability {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub date: NaiveDate,
    /// 0–1439
    pub start_minute: i32,
    /// 1–1440
    pub end_minute: i32,
}

impl DriverAvailability {
    pub fn is_valid(&self) -> bool {
        self.start_minute >= 0 && self.end_minute <= 1440 && self.end_minute > self.start_minute
    }

    pub fn work_minutes(&self) -> i32 {
        self.end_minute - self.start_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(types: Vec<Uuid>) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Test Driver".to_string(),
            start_lat: 50.0,
            start_lng: 14.0,
            default_service_minutes: 30,
            max_work_minutes_per_day: 480,
            is_active: true,
            service_type_ids: types,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_service_unrestricted_stop() {
        let d = driver(vec![]);
        assert!(d.can_service(None));
    }

    #[test]
    fn test_can_service_requires_capability() {
        let t = Uuid::new_v4();
        let d = driver(vec![t]);
        assert!(d.can_service(Some(t)));
        assert!(!d.can_service(Some(Uuid::new_v4())));
        assert!(!driver(vec![]).can_service(Some(t)));
    }

    #[test]
    fn test_availability_validity() {
        let a = DriverAvailability {
            id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_minute: 480,
            end_minute: 1020,
        };
        assert!(a.is_valid());
        assert_eq!(a.work_minutes(), 540);

        let inverted = DriverAvailability { start_minute: 1020, end_minute: 480, ..a.clone() };
        assert!(!inverted.is_valid());

        let overflow = DriverAvailability { start_minute: 0, end_minute: 1441, ..a };
        assert!(!overflow.is_valid());
    }
}

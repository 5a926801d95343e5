//! Travel-time regions, speed profiles, and learned statistics

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Named bounding box with a priority. Overlapping regions are disambiguated
/// by the highest priority; a catch-all global region (priority 0) backs
/// everything else.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TravelTimeRegion {
    pub id: Uuid,
    pub name: String,
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
    pub priority: i32,
    /// The catch-all fallback region; exactly one is expected
    pub is_global: bool,
}

impl TravelTimeRegion {
    pub fn contains(&self, point: &Coordinates) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

/// Weekday/Weekend classification used to select speed profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "day_type", rename_all = "snake_case")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }
}

/// Static default minutes-per-km per (region, day-type, hour bucket) — the
/// fallback when no learned data exists.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegionSpeedProfile {
    pub id: Uuid,
    pub region_id: Uuid,
    pub day_type: DayType,
    /// 0–23
    pub hour_bucket: i16,
    pub minutes_per_km: f64,
}

/// Lifecycle of a learned statistic. `Draft` stats accumulate silently;
/// only `Approved` stats feed estimation. Quality gating may move a stat to
/// `Quarantined`; `Rejected` is a terminal administrator decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "stat_status", rename_all = "snake_case")]
pub enum StatStatus {
    Draft,
    Approved,
    Quarantined,
    Rejected,
}

impl StatStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatStatus::Draft => "draft",
            StatStatus::Approved => "approved",
            StatStatus::Quarantined => "quarantined",
            StatStatus::Rejected => "rejected",
        }
    }
}

/// Natural composite key of a learned statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatKey {
    pub region_id: Uuid,
    pub day_type: DayType,
    /// 0–23
    pub hour_bucket: u8,
    /// Index into the configured distance bands
    pub distance_band: u8,
}

/// Accumulated minutes-per-km statistic per (region, day-type, hour bucket,
/// distance band). Mutated incrementally as drivers complete stops; never
/// deleted, only reset or re-statused by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedTravelStats {
    pub key: StatKey,
    pub sample_count: i64,
    pub avg_minutes_per_km: f64,
    pub min_minutes_per_km: f64,
    pub max_minutes_per_km: f64,
    /// Samples that fell outside the configured expected range
    pub suspicious_count: i64,
    pub last_sample_at: DateTime<Utc>,
    pub status: StatStatus,
    /// Per-driver sample counts
    pub contributors: HashMap<Uuid, i64>,
}

impl LearnedTravelStats {
    /// Fresh draft stat seeded from the first sample.
    pub fn first_sample(key: StatKey, minutes_per_km: f64, at: DateTime<Utc>) -> Self {
        Self {
            key,
            sample_count: 1,
            avg_minutes_per_km: minutes_per_km,
            min_minutes_per_km: minutes_per_km,
            max_minutes_per_km: minutes_per_km,
            suspicious_count: 0,
            last_sample_at: at,
            status: StatStatus::Draft,
            contributors: HashMap::new(),
        }
    }

    /// Fraction of samples outside the expected minutes-per-km range.
    pub fn suspicious_ratio(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.suspicious_count as f64 / self.sample_count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_type_from_date() {
        // 2026-03-02 is a Monday, 2026-03-07 a Saturday
        assert_eq!(DayType::from_date(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()), DayType::Weekday);
        assert_eq!(DayType::from_date(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()), DayType::Weekend);
        assert_eq!(DayType::from_date(NaiveDate::from_ymd_opt(2026, 3, 8).unwrap()), DayType::Weekend);
    }

    #[test]
    fn test_region_contains() {
        let region = TravelTimeRegion {
            id: Uuid::new_v4(),
            name: "Prague".to_string(),
            min_lat: 49.9,
            min_lng: 14.2,
            max_lat: 50.2,
            max_lng: 14.7,
            priority: 10,
            is_global: false,
        };
        assert!(region.contains(&Coordinates::new(50.05, 14.45)));
        assert!(!region.contains(&Coordinates::new(49.2, 16.6)));
        // boundary is inclusive
        assert!(region.contains(&Coordinates::new(49.9, 14.2)));
    }

    #[test]
    fn test_suspicious_ratio() {
        let mut stats = LearnedTravelStats::first_sample(
            StatKey {
                region_id: Uuid::nil(),
                day_type: DayType::Weekday,
                hour_bucket: 8,
                distance_band: 0,
            },
            1.4,
            Utc::now(),
        );
        assert_eq!(stats.suspicious_ratio(), 0.0);
        stats.sample_count = 10;
        stats.suspicious_count = 3;
        assert!((stats.suspicious_ratio() - 0.3).abs() < 1e-9);
    }
}

//! Travel Time Model
//!
//! Estimates minutes-per-km for a leg from its governing region, day type,
//! hour bucket, and distance band. The fallback chain is explicit:
//! approved learned statistics → regional speed profile → global profile →
//! configured default. Each stage is independently testable.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::services::learned_stats::{evaluate_quality, LearnedStatsStore, StatQuality};
use crate::types::{
    Coordinates, DayType, LearnedTravelStats, RegionSpeedProfile, StatKey, TravelTimeRegion,
};

/// Hour bucket (0–23) containing a minute-of-day.
pub fn hour_bucket(minute_of_day: i32) -> u8 {
    (minute_of_day.clamp(0, 1439) / 60) as u8
}

/// Admin-facing review entry for one learned stat.
#[derive(Debug, Clone)]
pub struct StatReview {
    pub stats: LearnedTravelStats,
    pub quality: StatQuality,
    /// Baseline the deviation was measured against, when available
    pub baseline_minutes_per_km: Option<f64>,
}

/// Region-aware travel-time estimator.
pub struct TravelTimeModel {
    regions: Vec<TravelTimeRegion>,
    /// (region, day type, hour bucket) → minutes-per-km
    profiles: HashMap<(Uuid, DayType, u8), f64>,
    stats: Arc<LearnedStatsStore>,
    config: PlannerConfig,
}

impl TravelTimeModel {
    pub fn new(
        regions: Vec<TravelTimeRegion>,
        profiles: Vec<RegionSpeedProfile>,
        stats: Arc<LearnedStatsStore>,
        config: PlannerConfig,
    ) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|p| ((p.region_id, p.day_type, p.hour_bucket.clamp(0, 23) as u8), p.minutes_per_km))
            .collect();
        Self { regions, profiles, stats, config }
    }

    pub fn stats(&self) -> &Arc<LearnedStatsStore> {
        &self.stats
    }

    /// Resolve the governing region for a point: highest priority whose
    /// bounding box contains the point, ties broken by lowest id, falling
    /// back to the global catch-all region.
    pub fn resolve_region(&self, point: &Coordinates) -> Option<&TravelTimeRegion> {
        self.regions
            .iter()
            .filter(|r| !r.is_global && r.contains(point))
            .min_by_key(|r| (std::cmp::Reverse(r.priority), r.id))
            .or_else(|| self.regions.iter().find(|r| r.is_global))
    }

    /// The stat key governing a leg departing at `departure_minute` on `date`.
    pub fn stat_key(
        &self,
        date: NaiveDate,
        departure_minute: i32,
        distance_km: f64,
        from: &Coordinates,
        to: &Coordinates,
    ) -> Option<StatKey> {
        let midpoint = from.midpoint(to);
        let region = self.resolve_region(&midpoint)?;
        Some(StatKey {
            region_id: region.id,
            day_type: DayType::from_date(date),
            hour_bucket: hour_bucket(departure_minute),
            distance_band: self.config.distance_band(distance_km),
        })
    }

    /// Minutes-per-km for a stat key, walking the fallback chain.
    pub fn minutes_per_km(&self, key: &StatKey) -> f64 {
        if let Some(avg) = self.stats.approved_average(key) {
            return avg;
        }
        if let Some(mpk) = self.profiles.get(&(key.region_id, key.day_type, key.hour_bucket)) {
            return *mpk;
        }
        if let Some(global) = self.regions.iter().find(|r| r.is_global) {
            if let Some(mpk) = self.profiles.get(&(global.id, key.day_type, key.hour_bucket)) {
                return *mpk;
            }
        }
        self.config.default_minutes_per_km
    }

    /// Estimate travel minutes for a leg.
    ///
    /// Rounding is half-away-from-zero, floored at 0; the estimate is
    /// monotonically non-decreasing in `distance_km` for a fixed context.
    pub fn estimate_minutes(
        &self,
        date: NaiveDate,
        departure_minute: i32,
        distance_km: f64,
        from: &Coordinates,
        to: &Coordinates,
    ) -> i64 {
        if !(distance_km.is_finite()) || distance_km <= 0.0 {
            return 0;
        }
        let mpk = match self.stat_key(date, departure_minute, distance_km, from, to) {
            Some(key) => self.minutes_per_km(&key),
            None => self.config.default_minutes_per_km,
        };
        // f64::round rounds half away from zero
        ((mpk * distance_km).round() as i64).max(0)
    }

    /// Feed one completed leg back into the learned statistics.
    pub fn record_completed_leg(
        &self,
        driver_id: Uuid,
        date: NaiveDate,
        departure_minute: i32,
        distance_km: f64,
        actual_minutes: f64,
        from: &Coordinates,
        to: &Coordinates,
        completed_at: DateTime<Utc>,
    ) {
        if distance_km < 0.1 || actual_minutes <= 0.0 {
            debug!("Skipping degenerate completed leg ({} km, {} min)", distance_km, actual_minutes);
            return;
        }
        if let Some(key) = self.stat_key(date, departure_minute, distance_km, from, to) {
            self.stats.record_sample(key, driver_id, actual_minutes / distance_km, completed_at);
        }
    }

    /// Quality review of every learned stat against its regional baseline.
    /// Surfaced to administrators; estimation never consults this.
    pub fn review_all(&self, now: DateTime<Utc>) -> Vec<StatReview> {
        self.stats
            .snapshot()
            .into_iter()
            .map(|stats| {
                let baseline = self
                    .profiles
                    .get(&(stats.key.region_id, stats.key.day_type, stats.key.hour_bucket))
                    .copied();
                let quality = evaluate_quality(&stats, baseline, now, self.stats.thresholds());
                StatReview { stats, quality, baseline_minutes_per_km: baseline }
            })
            .collect()
    }

    /// Run promotion/quarantine gating over all stats. Returns the keys
    /// whose status changed.
    pub fn apply_gating(&self, now: DateTime<Utc>) -> Vec<StatKey> {
        let mut changed = vec![];
        for review in self.review_all(now) {
            if self.stats.apply_gating(&review.stats.key, &review.quality).is_some() {
                changed.push(review.stats.key);
            }
        }
        changed
    }
}

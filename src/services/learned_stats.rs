//! Learned travel statistics store
//!
//! Accumulates minutes-per-km samples from completed stops, keyed by
//! (region, day-type, hour bucket, distance band). Merging happens under a
//! single write lock so concurrent drivers never lose updates; the SQL twin
//! of this merge lives in `db::queries::learned_stats`.
//!
//! Quality flags are surfaced to administrators and gate the
//! `Draft → Approved` promotion; they never block estimation itself.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::types::{LearnedTravelStats, StatKey, StatStatus};

/// Operator-configurable quality thresholds.
#[derive(Debug, Clone)]
pub struct StatThresholds {
    pub min_samples: i64,
    pub stale_after_days: i64,
    pub max_deviation_pct: f64,
    pub expected_min_minutes_per_km: f64,
    pub expected_max_minutes_per_km: f64,
    pub max_suspicious_ratio: f64,
}

impl StatThresholds {
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            min_samples: config.stat_min_samples,
            stale_after_days: config.stat_stale_after_days,
            max_deviation_pct: config.stat_max_deviation_pct,
            expected_min_minutes_per_km: config.expected_min_minutes_per_km,
            expected_max_minutes_per_km: config.expected_max_minutes_per_km,
            max_suspicious_ratio: config.stat_max_suspicious_ratio,
        }
    }
}

/// Quality classification of one learned stat — trustworthiness, not validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatQuality {
    pub is_low_sample: bool,
    pub is_stale: bool,
    /// Average deviates from the regional baseline beyond the threshold
    pub is_high_deviation: bool,
    /// Average outside the expected minutes-per-km range
    pub is_out_of_range: bool,
    pub suspicious_ratio: f64,
}

impl StatQuality {
    /// Whether the stat qualifies for `Draft → Approved` promotion.
    pub fn promotable(&self) -> bool {
        !self.is_low_sample && !self.is_high_deviation && !self.is_out_of_range
    }
}

/// Evaluate quality flags for a stat against its regional baseline.
pub fn evaluate_quality(
    stats: &LearnedTravelStats,
    baseline_minutes_per_km: Option<f64>,
    now: DateTime<Utc>,
    thresholds: &StatThresholds,
) -> StatQuality {
    let is_low_sample = stats.sample_count < thresholds.min_samples;
    let age_days = (now - stats.last_sample_at).num_days();
    let is_stale = age_days > thresholds.stale_after_days;

    let is_high_deviation = match baseline_minutes_per_km {
        Some(baseline) if baseline > 0.0 => {
            let deviation_pct = ((stats.avg_minutes_per_km - baseline) / baseline).abs() * 100.0;
            deviation_pct > thresholds.max_deviation_pct
        }
        _ => false,
    };

    let is_out_of_range = stats.avg_minutes_per_km < thresholds.expected_min_minutes_per_km
        || stats.avg_minutes_per_km > thresholds.expected_max_minutes_per_km;

    StatQuality {
        is_low_sample,
        is_stale,
        is_high_deviation,
        is_out_of_range,
        suspicious_ratio: stats.suspicious_ratio(),
    }
}

/// In-memory learned-statistics store. Safe to share via `Arc` across tasks.
pub struct LearnedStatsStore {
    inner: RwLock<HashMap<StatKey, LearnedTravelStats>>,
    thresholds: StatThresholds,
}

impl LearnedStatsStore {
    pub fn new(thresholds: StatThresholds) -> Self {
        Self { inner: RwLock::new(HashMap::new()), thresholds }
    }

    /// Seed the store, e.g. from persisted stats at startup.
    pub fn load(&self, stats: Vec<LearnedTravelStats>) {
        let mut inner = self.inner.write();
        for stat in stats {
            inner.insert(stat.key, stat);
        }
    }

    pub fn thresholds(&self) -> &StatThresholds {
        &self.thresholds
    }

    /// Merge one sample into the stat for `key`. The whole merge runs under
    /// the write lock, so concurrent completions cannot lose updates.
    pub fn record_sample(
        &self,
        key: StatKey,
        driver_id: Uuid,
        minutes_per_km: f64,
        at: DateTime<Utc>,
    ) {
        if !minutes_per_km.is_finite() || minutes_per_km <= 0.0 {
            debug!("Discarding non-positive minutes-per-km sample for {:?}", key);
            return;
        }

        let suspicious = minutes_per_km < self.thresholds.expected_min_minutes_per_km
            || minutes_per_km > self.thresholds.expected_max_minutes_per_km;

        let mut inner = self.inner.write();
        let stats = inner
            .entry(key)
            .or_insert_with(|| {
                let mut fresh = LearnedTravelStats::first_sample(key, minutes_per_km, at);
                // the merge below re-applies the first sample
                fresh.sample_count = 0;
                fresh.avg_minutes_per_km = 0.0;
                fresh.min_minutes_per_km = f64::MAX;
                fresh.max_minutes_per_km = 0.0;
                fresh
            });

        stats.sample_count += 1;
        stats.avg_minutes_per_km +=
            (minutes_per_km - stats.avg_minutes_per_km) / stats.sample_count as f64;
        stats.min_minutes_per_km = stats.min_minutes_per_km.min(minutes_per_km);
        stats.max_minutes_per_km = stats.max_minutes_per_km.max(minutes_per_km);
        if suspicious {
            stats.suspicious_count += 1;
        }
        if at > stats.last_sample_at {
            stats.last_sample_at = at;
        }
        *stats.contributors.entry(driver_id).or_insert(0) += 1;
    }

    /// Average minutes-per-km of an `Approved` stat with enough samples.
    pub fn approved_average(&self, key: &StatKey) -> Option<f64> {
        let inner = self.inner.read();
        inner.get(key).and_then(|s| {
            if s.status == StatStatus::Approved && s.sample_count >= self.thresholds.min_samples {
                Some(s.avg_minutes_per_km)
            } else {
                None
            }
        })
    }

    pub fn get(&self, key: &StatKey) -> Option<LearnedTravelStats> {
        self.inner.read().get(key).cloned()
    }

    /// Snapshot of all stats, for admin review and persistence.
    pub fn snapshot(&self) -> Vec<LearnedTravelStats> {
        self.inner.read().values().cloned().collect()
    }

    /// Administrator/gating status change. Returns false for unknown keys.
    pub fn set_status(&self, key: &StatKey, status: StatStatus) -> bool {
        let mut inner = self.inner.write();
        match inner.get_mut(key) {
            Some(stats) => {
                stats.status = status;
                true
            }
            None => false,
        }
    }

    /// Apply quality gating to one stat: `Draft → Approved` when promotable,
    /// `Approved → Quarantined` when the average drifts or too many samples
    /// look suspicious. `Rejected` is terminal and never touched.
    pub fn apply_gating(&self, key: &StatKey, quality: &StatQuality) -> Option<StatStatus> {
        let mut inner = self.inner.write();
        let stats = inner.get_mut(key)?;
        let next = match stats.status {
            StatStatus::Draft if quality.promotable()
                && quality.suspicious_ratio <= self.thresholds.max_suspicious_ratio =>
            {
                Some(StatStatus::Approved)
            }
            StatStatus::Approved
                if quality.is_high_deviation
                    || quality.is_out_of_range
                    || quality.suspicious_ratio > self.thresholds.max_suspicious_ratio =>
            {
                Some(StatStatus::Quarantined)
            }
            _ => None,
        };
        if let Some(status) = next {
            debug!("Learned stat {:?}: {} -> {}", key, stats.status.as_str(), status.as_str());
            stats.status = status;
        }
        next
    }
}

//! Configuration management
//!
//! Thresholds for the learned-statistics quality gating are deliberately
//! operator-configurable; the defaults below are starting points, not
//! calibrated values.

use anyhow::{Context, Result};

/// Planner configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// PostgreSQL connection string (route/stat persistence)
    pub database_url: Option<String>,

    /// Valhalla routing engine URL (optional, falls back to estimation if unset)
    pub routing_url: Option<String>,

    /// Travel matrix cache TTL in seconds
    pub matrix_cache_ttl_secs: u64,

    /// Minimum samples before a learned stat may be used / promoted
    pub stat_min_samples: i64,

    /// Days without a new sample before a stat is considered stale
    pub stat_stale_after_days: i64,

    /// Maximum deviation (percent) of a learned average from the regional
    /// baseline before the stat is flagged as high-deviation
    pub stat_max_deviation_pct: f64,

    /// Expected minutes-per-km range; samples outside count as suspicious
    pub expected_min_minutes_per_km: f64,
    pub expected_max_minutes_per_km: f64,

    /// Maximum fraction of suspicious samples tolerated before quarantine
    pub stat_max_suspicious_ratio: f64,

    /// Fallback minutes-per-km when neither learned stats nor a speed
    /// profile are available (1.5 min/km = 40 km/h)
    pub default_minutes_per_km: f64,

    /// Straight-line to road distance coefficient for estimated matrices
    pub road_coefficient: f64,

    /// Horizon (calendar days) for due-date urgency scaling
    pub urgency_horizon_days: i64,

    /// Upper bounds (km) of the distance bands keying learned stats.
    /// Legs beyond the last bound fall into one final open-ended band.
    pub distance_band_bounds: Vec<f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            routing_url: None,
            matrix_cache_ttl_secs: 900,
            stat_min_samples: 5,
            stat_stale_after_days: 60,
            stat_max_deviation_pct: 50.0,
            expected_min_minutes_per_km: 0.5,
            expected_max_minutes_per_km: 6.0,
            stat_max_suspicious_ratio: 0.2,
            default_minutes_per_km: 1.5,
            road_coefficient: 1.3,
            urgency_horizon_days: 14,
            distance_band_bounds: vec![5.0, 15.0, 50.0],
        }
    }
}

impl PlannerConfig {
    /// Load configuration from environment variables, using defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            routing_url: std::env::var("ROUTING_URL").ok(),
            matrix_cache_ttl_secs: env_parse("MATRIX_CACHE_TTL_SECS", defaults.matrix_cache_ttl_secs)?,
            stat_min_samples: env_parse("STAT_MIN_SAMPLES", defaults.stat_min_samples)?,
            stat_stale_after_days: env_parse("STAT_STALE_AFTER_DAYS", defaults.stat_stale_after_days)?,
            stat_max_deviation_pct: env_parse("STAT_MAX_DEVIATION_PCT", defaults.stat_max_deviation_pct)?,
            expected_min_minutes_per_km: env_parse(
                "EXPECTED_MIN_MINUTES_PER_KM",
                defaults.expected_min_minutes_per_km,
            )?,
            expected_max_minutes_per_km: env_parse(
                "EXPECTED_MAX_MINUTES_PER_KM",
                defaults.expected_max_minutes_per_km,
            )?,
            stat_max_suspicious_ratio: env_parse(
                "STAT_MAX_SUSPICIOUS_RATIO",
                defaults.stat_max_suspicious_ratio,
            )?,
            default_minutes_per_km: env_parse("DEFAULT_MINUTES_PER_KM", defaults.default_minutes_per_km)?,
            road_coefficient: env_parse("ROAD_COEFFICIENT", defaults.road_coefficient)?,
            urgency_horizon_days: env_parse("URGENCY_HORIZON_DAYS", defaults.urgency_horizon_days)?,
            distance_band_bounds: defaults.distance_band_bounds,
        })
    }

    /// Index of the distance band containing `km`.
    pub fn distance_band(&self, km: f64) -> u8 {
        let mut band = 0u8;
        for bound in &self.distance_band_bounds {
            if km <= *bound {
                return band;
            }
            band += 1;
        }
        band
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

//! Travel matrix provider
//!
//! Point-to-point travel time and distance for a candidate set, cached by a
//! content-derived key. Concurrent requests for the same key coalesce into a
//! single computation; cached results age out after a bounded TTL. A backend
//! failure degrades to the straight-line estimate instead of aborting the
//! planning run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::config::PlannerConfig;
use crate::services::geo::road_distance;
use crate::services::routing::{ValhallaBackend, ValhallaConfig};
use crate::services::travel_time::{hour_bucket, TravelTimeModel};
use crate::types::Coordinates;

/// Travel time (minutes) and distance (km) between all points; diagonal zero.
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    pub minutes: Vec<Vec<f64>>,
    pub km: Vec<Vec<f64>>,
    pub size: usize,
    /// True when the matrix came from the straight-line fallback after a
    /// backend failure
    pub degraded: bool,
}

impl TravelMatrix {
    pub fn empty() -> Self {
        Self { minutes: vec![], km: vec![], size: 0, degraded: false }
    }

    pub fn minutes(&self, from: usize, to: usize) -> f64 {
        self.minutes[from][to]
    }

    pub fn km(&self, from: usize, to: usize) -> f64 {
        self.km[from][to]
    }
}

/// Deterministic cache key for an ordered point set: SHA-256 over coordinates
/// rounded to 5 decimals (~1 m), the date, and the departure hour bucket.
pub fn matrix_cache_key(points: &[Coordinates], date: NaiveDate, departure_minute: i32) -> String {
    let mut hasher = Sha256::new();
    for p in points {
        hasher.update(format!("{:.5},{:.5};", p.lat, p.lng).as_bytes());
    }
    hasher.update(date.to_string().as_bytes());
    hasher.update([hour_bucket(departure_minute)]);
    hex::encode(hasher.finalize())
}

/// A matrix computation backend (road network or estimation).
#[async_trait]
pub trait MatrixBackend: Send + Sync {
    async fn compute(
        &self,
        points: &[Coordinates],
        date: NaiveDate,
        departure_minute: i32,
    ) -> Result<TravelMatrix>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Estimation backend: Haversine × road coefficient for distance, the
/// Travel Time Model for minutes. Infallible, also used as the fallback.
pub struct EstimateBackend {
    model: Arc<TravelTimeModel>,
    road_coefficient: f64,
}

impl EstimateBackend {
    pub fn new(model: Arc<TravelTimeModel>, road_coefficient: f64) -> Self {
        Self { model, road_coefficient }
    }

    /// Compute the estimated matrix directly (cannot fail).
    pub fn estimate(
        &self,
        points: &[Coordinates],
        date: NaiveDate,
        departure_minute: i32,
    ) -> TravelMatrix {
        let n = points.len();
        let mut minutes = vec![vec![0.0; n]; n];
        let mut km = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let distance = road_distance(&points[i], &points[j], self.road_coefficient);
                    km[i][j] = distance;
                    minutes[i][j] = self.model.estimate_minutes(
                        date,
                        departure_minute,
                        distance,
                        &points[i],
                        &points[j],
                    ) as f64;
                }
            }
        }

        TravelMatrix { minutes, km, size: n, degraded: false }
    }
}

#[async_trait]
impl MatrixBackend for EstimateBackend {
    async fn compute(
        &self,
        points: &[Coordinates],
        date: NaiveDate,
        departure_minute: i32,
    ) -> Result<TravelMatrix> {
        Ok(self.estimate(points, date, departure_minute))
    }

    fn name(&self) -> &str {
        "Estimate"
    }
}

struct CacheEntry {
    inserted_at: Instant,
    cell: Arc<OnceCell<Arc<TravelMatrix>>>,
}

/// Caching matrix provider over a primary backend with estimation fallback.
pub struct MatrixProvider {
    backend: Arc<dyn MatrixBackend>,
    fallback: Arc<EstimateBackend>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MatrixProvider {
    pub fn new(backend: Arc<dyn MatrixBackend>, fallback: Arc<EstimateBackend>, ttl: Duration) -> Self {
        Self { backend, fallback, cache: Mutex::new(HashMap::new()), ttl }
    }

    /// Provider with the estimation backend as primary (no road network).
    pub fn estimate_only(fallback: Arc<EstimateBackend>, ttl: Duration) -> Self {
        Self::new(Arc::clone(&fallback) as Arc<dyn MatrixBackend>, fallback, ttl)
    }

    /// Provider wired from configuration: the road-network backend when a
    /// routing URL is configured, estimation only otherwise.
    pub fn from_config(config: &PlannerConfig, model: Arc<TravelTimeModel>) -> Self {
        let fallback = Arc::new(EstimateBackend::new(model, config.road_coefficient));
        let ttl = Duration::from_secs(config.matrix_cache_ttl_secs);
        match &config.routing_url {
            Some(url) => Self::new(
                Arc::new(ValhallaBackend::new(ValhallaConfig::new(url.clone()))),
                fallback,
                ttl,
            ),
            None => Self::estimate_only(fallback, ttl),
        }
    }

    /// Get the matrix for an ordered point set, from cache when fresh.
    ///
    /// Concurrent misses for the same key share one computation. Never
    /// errors: a failing backend degrades to the straight-line estimate.
    pub async fn get_matrix(
        &self,
        points: &[Coordinates],
        date: NaiveDate,
        departure_minute: i32,
    ) -> Arc<TravelMatrix> {
        if points.is_empty() {
            return Arc::new(TravelMatrix::empty());
        }

        let key = matrix_cache_key(points, date, departure_minute);
        let cell = {
            let mut cache = self.cache.lock().await;
            // Age out every expired entry while holding the lock, so the
            // cache stays bounded without a separate maintenance task
            let ttl = self.ttl;
            cache.retain(|_, e| e.inserted_at.elapsed() <= ttl);
            if !cache.contains_key(&key) {
                cache.insert(
                    key.clone(),
                    CacheEntry { inserted_at: Instant::now(), cell: Arc::new(OnceCell::new()) },
                );
            }
            Arc::clone(&cache.get(&key).expect("entry just ensured").cell)
        };

        let backend = Arc::clone(&self.backend);
        let fallback = Arc::clone(&self.fallback);
        let points_owned = points.to_vec();

        let matrix = cell
            .get_or_init(|| async move {
                match backend.compute(&points_owned, date, departure_minute).await {
                    Ok(matrix) => {
                        debug!("Matrix of {} points computed via {}", points_owned.len(), backend.name());
                        Arc::new(matrix)
                    }
                    Err(err) => {
                        warn!(
                            "Matrix backend {} failed ({}), falling back to straight-line estimate",
                            backend.name(),
                            err
                        );
                        let mut estimated = fallback.estimate(&points_owned, date, departure_minute);
                        estimated.degraded = true;
                        Arc::new(estimated)
                    }
                }
            })
            .await;

        Arc::clone(matrix)
    }

    /// Number of live cache entries.
    pub async fn cache_size(&self) -> usize {
        self.cache.lock().await.len()
    }
}

//! Valhalla routing engine client
//!
//! Road-network matrix backend over the Valhalla `sources_to_targets` API:
//! https://valhalla.github.io/valhalla/api/matrix/api-reference/
//!
//! Distances come back in kilometers, times in seconds; times are converted
//! to whole minutes (half away from zero) to match the rest of the planner.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::matrix::{MatrixBackend, TravelMatrix};
use crate::types::Coordinates;

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Valhalla matrix backend
pub struct ValhallaBackend {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaBackend {
    pub fn new(config: ValhallaConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn build_matrix_request(&self, points: &[Coordinates]) -> MatrixRequest {
        let locs: Vec<ValhallaLocation> = points
            .iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                // 500m radius for geocoded coordinates that may sit off-road
                // (building centroid vs road edge)
                radius: Some(500),
            })
            .collect();

        MatrixRequest {
            sources: locs.clone(),
            targets: locs,
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }
}

#[async_trait]
impl MatrixBackend for ValhallaBackend {
    async fn compute(
        &self,
        points: &[Coordinates],
        _date: NaiveDate,
        _departure_minute: i32,
    ) -> Result<TravelMatrix> {
        let n = points.len();

        if n == 0 {
            return Ok(TravelMatrix::empty());
        }

        if n == 1 {
            return Ok(TravelMatrix {
                minutes: vec![vec![0.0]],
                km: vec![vec![0.0]],
                size: 1,
                degraded: false,
            });
        }

        let request = self.build_matrix_request(points);
        let url = format!("{}/sources_to_targets", self.config.base_url);

        debug!("Requesting distance matrix from Valhalla for {} locations", n);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Valhalla")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla returned error {}: {}", status, body);
        }

        let matrix_response: MatrixResponse = response
            .json()
            .await
            .context("Failed to parse Valhalla response")?;

        let mut minutes = vec![vec![0.0f64; n]; n];
        let mut km = vec![vec![0.0f64; n]; n];

        for (i, row) in matrix_response.sources_to_targets.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                if i == j {
                    continue;
                }
                let distance = cell
                    .distance
                    .with_context(|| format!("No distance for route {} -> {}", i, j))?;
                let seconds = cell
                    .time
                    .with_context(|| format!("No duration for route {} -> {}", i, j))?;
                km[i][j] = distance;
                minutes[i][j] = (seconds / 60.0).round().max(0.0);
            }
        }

        debug!("Received distance matrix from Valhalla: {}x{}", n, n);

        Ok(TravelMatrix { minutes, km, size: n, degraded: false })
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

// Valhalla API types

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ValhallaLocation>,
    targets: Vec<ValhallaLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    /// Distance in kilometers (when units="kilometers")
    distance: Option<f64>,
    /// Time in seconds
    time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valhalla_config_default() {
        let config = ValhallaConfig::default();
        assert_eq!(config.base_url, "http://localhost:8002");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_valhalla_config_custom() {
        let config = ValhallaConfig::new("http://valhalla:8002");
        assert_eq!(config.base_url, "http://valhalla:8002");
    }

    #[test]
    fn test_build_matrix_request() {
        let backend = ValhallaBackend::new(ValhallaConfig::default());

        let points = vec![
            Coordinates { lat: 50.0755, lng: 14.4378 },
            Coordinates { lat: 49.1951, lng: 16.6068 },
        ];

        let request = backend.build_matrix_request(&points);

        assert_eq!(request.sources.len(), 2);
        assert_eq!(request.targets.len(), 2);
        assert_eq!(request.costing, "auto");
        assert_eq!(request.units, "kilometers");

        assert!((request.sources[0].lat - 50.0755).abs() < 0.0001);
        assert!((request.sources[0].lon - 14.4378).abs() < 0.0001);
    }

    #[test]
    fn test_valhalla_backend_name() {
        let backend = ValhallaBackend::new(ValhallaConfig::default());
        assert_eq!(backend.name(), "Valhalla");
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_valhalla_integration_prague_brno() {
        let backend = ValhallaBackend::new(ValhallaConfig::new("http://localhost:8002"));

        let points = vec![
            Coordinates { lat: 50.0755, lng: 14.4378 }, // Prague
            Coordinates { lat: 49.1951, lng: 16.6068 }, // Brno
        ];

        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let matrix = backend.compute(&points, date, 480).await.unwrap();

        assert_eq!(matrix.size, 2);

        // Prague to Brno is ~205 km by road
        let distance_km = matrix.km(0, 1);
        assert!(distance_km > 190.0 && distance_km < 230.0,
            "Expected ~205 km, got {} km", distance_km);

        // Travel time should be ~2 hours
        let duration_hours = matrix.minutes(0, 1) / 60.0;
        assert!(duration_hours > 1.5 && duration_hours < 3.0,
            "Expected ~2 hours, got {} hours", duration_hours);
    }
}

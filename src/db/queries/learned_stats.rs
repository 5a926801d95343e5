//! Learned travel statistics queries
//!
//! The upsert merges a batch of new samples into the stored running average
//! arithmetically, so concurrent workers never lose each other's samples.
//! Contributor counts live in a jsonb column keyed by driver id.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::{DayType, LearnedTravelStats, StatKey, StatStatus};

#[derive(Debug, FromRow)]
struct LearnedStatRow {
    region_id: Uuid,
    day_type: DayType,
    hour_bucket: i16,
    distance_band: i16,
    sample_count: i64,
    avg_minutes_per_km: f64,
    min_minutes_per_km: f64,
    max_minutes_per_km: f64,
    suspicious_count: i64,
    last_sample_at: DateTime<Utc>,
    status: StatStatus,
    contributors: sqlx::types::Json<HashMap<Uuid, i64>>,
}

impl From<LearnedStatRow> for LearnedTravelStats {
    fn from(row: LearnedStatRow) -> Self {
        LearnedTravelStats {
            key: StatKey {
                region_id: row.region_id,
                day_type: row.day_type,
                hour_bucket: row.hour_bucket as u8,
                distance_band: row.distance_band as u8,
            },
            sample_count: row.sample_count,
            avg_minutes_per_km: row.avg_minutes_per_km,
            min_minutes_per_km: row.min_minutes_per_km,
            max_minutes_per_km: row.max_minutes_per_km,
            suspicious_count: row.suspicious_count,
            last_sample_at: row.last_sample_at,
            status: row.status,
            contributors: row.contributors.0,
        }
    }
}

/// Load all learned stats.
pub async fn fetch_all(pool: &PgPool) -> Result<Vec<LearnedTravelStats>> {
    let rows = sqlx::query_as::<_, LearnedStatRow>(
        r#"
        SELECT
            region_id, day_type, hour_bucket, distance_band,
            sample_count, avg_minutes_per_km, min_minutes_per_km, max_minutes_per_km,
            suspicious_count, last_sample_at, status, contributors
        FROM learned_travel_stats
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Merge an in-memory stat into the stored row.
///
/// The incoming row is a batch delta: sample and suspicious counts add up,
/// the running average recombines by sample counts, and per-driver
/// contributor counts sum key-wise. A batch accumulated in memory folds into
/// whatever another worker wrote meanwhile.
pub async fn upsert_merged(pool: &PgPool, stats: &LearnedTravelStats) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO learned_travel_stats (
            region_id, day_type, hour_bucket, distance_band,
            sample_count, avg_minutes_per_km, min_minutes_per_km, max_minutes_per_km,
            suspicious_count, last_sample_at, status, contributors
        )
        VALUES ($1, $2::day_type, $3, $4, $5, $6, $7, $8, $9, $10, $11::stat_status, $12)
        ON CONFLICT (region_id, day_type, hour_bucket, distance_band)
        DO UPDATE SET
            avg_minutes_per_km = (
                learned_travel_stats.avg_minutes_per_km * learned_travel_stats.sample_count
                + EXCLUDED.avg_minutes_per_km * EXCLUDED.sample_count
            ) / (learned_travel_stats.sample_count + EXCLUDED.sample_count),
            sample_count = learned_travel_stats.sample_count + EXCLUDED.sample_count,
            min_minutes_per_km = LEAST(learned_travel_stats.min_minutes_per_km, EXCLUDED.min_minutes_per_km),
            max_minutes_per_km = GREATEST(learned_travel_stats.max_minutes_per_km, EXCLUDED.max_minutes_per_km),
            suspicious_count = learned_travel_stats.suspicious_count + EXCLUDED.suspicious_count,
            last_sample_at = GREATEST(learned_travel_stats.last_sample_at, EXCLUDED.last_sample_at),
            contributors = (
                SELECT COALESCE(jsonb_object_agg(key, total), '{}'::jsonb)
                FROM (
                    SELECT key, SUM(value::bigint) AS total
                    FROM (
                        SELECT key, value FROM jsonb_each_text(learned_travel_stats.contributors)
                        UNION ALL
                        SELECT key, value FROM jsonb_each_text(EXCLUDED.contributors)
                    ) entries
                    GROUP BY key
                ) merged
            )
        "#,
    )
    .bind(stats.key.region_id)
    .bind(stats.key.day_type.as_str())
    .bind(stats.key.hour_bucket as i16)
    .bind(stats.key.distance_band as i16)
    .bind(stats.sample_count)
    .bind(stats.avg_minutes_per_km)
    .bind(stats.min_minutes_per_km)
    .bind(stats.max_minutes_per_km)
    .bind(stats.suspicious_count)
    .bind(stats.last_sample_at)
    .bind(stats.status.as_str())
    .bind(sqlx::types::Json(&stats.contributors))
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the lifecycle status of one stat.
pub async fn set_status(pool: &PgPool, key: &StatKey, status: StatStatus) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE learned_travel_stats
        SET status = $5::stat_status
        WHERE region_id = $1 AND day_type = $2::day_type
          AND hour_bucket = $3 AND distance_band = $4
        "#,
    )
    .bind(key.region_id)
    .bind(key.day_type.as_str())
    .bind(key.hour_bucket as i16)
    .bind(key.distance_band as i16)
    .bind(status.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Reset one stat to an empty draft, keeping the row.
pub async fn reset(pool: &PgPool, key: &StatKey) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE learned_travel_stats
        SET sample_count = 0,
            avg_minutes_per_km = 0,
            min_minutes_per_km = 0,
            max_minutes_per_km = 0,
            suspicious_count = 0,
            status = 'draft',
            contributors = '{}'::jsonb
        WHERE region_id = $1 AND day_type = $2::day_type
          AND hour_bucket = $3 AND distance_band = $4
        "#,
    )
    .bind(key.region_id)
    .bind(key.day_type.as_str())
    .bind(key.hour_bucket as i16)
    .bind(key.distance_band as i16)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

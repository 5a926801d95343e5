//! Route persistence queries
//!
//! A planning run replaces the whole schedule for its (date, owner) key in
//! one transaction: existing planned routes and their stops go away, the new
//! ones come in. Partially written plans are never visible.

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::mapper::MappedRoute;
use crate::types::{Route, RouteStop};

/// Replace all planned routes for (date, owner) with the given set.
/// Routes already in progress or completed are left untouched.
pub async fn replace_planned_routes(
    pool: &PgPool,
    date: NaiveDate,
    owner_id: Uuid,
    routes: &[MappedRoute],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM route_stops
        WHERE route_id IN (
            SELECT id FROM routes
            WHERE date = $1 AND owner_id = $2 AND status = 'planned'
        )
        "#,
    )
    .bind(date)
    .bind(owner_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM routes WHERE date = $1 AND owner_id = $2 AND status = 'planned'")
        .bind(date)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    for mapped in routes {
        let route = &mapped.route;
        sqlx::query(
            r#"
            INSERT INTO routes (
                id, date, owner_id, driver_id,
                total_minutes, total_km, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7::route_status, NOW(), NOW())
            "#,
        )
        .bind(route.id)
        .bind(route.date)
        .bind(route.owner_id)
        .bind(route.driver_id)
        .bind(route.total_minutes)
        .bind(route.total_km)
        .bind(route.status.as_str())
        .execute(&mut *tx)
        .await?;

        for stop in &mapped.stops {
            insert_stop(&mut tx, stop).await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

async fn insert_stop(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    stop: &RouteStop,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_stops (
            id, route_id, sequence, service_location_id, planning_cluster_id,
            lat, lng, service_minutes,
            travel_km_from_prev, travel_minutes_from_prev,
            planned_start, planned_end, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13::route_stop_status)
        "#,
    )
    .bind(stop.id)
    .bind(stop.route_id)
    .bind(stop.sequence)
    .bind(stop.service_location_id)
    .bind(stop.planning_cluster_id)
    .bind(stop.lat)
    .bind(stop.lng)
    .bind(stop.service_minutes)
    .bind(stop.travel_km_from_prev)
    .bind(stop.travel_minutes_from_prev)
    .bind(stop.planned_start)
    .bind(stop.planned_end)
    .bind(stop.status.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Routes for a date, all drivers of the owner.
pub async fn list_routes_for_date(
    pool: &PgPool,
    owner_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<Route>> {
    let routes = sqlx::query_as::<_, Route>(
        r#"
        SELECT
            id, date, owner_id, driver_id,
            total_minutes, total_km, status, created_at, updated_at
        FROM routes
        WHERE owner_id = $1 AND date = $2
        ORDER BY driver_id
        "#,
    )
    .bind(owner_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(routes)
}

/// Stops of one route in sequence order.
pub async fn list_route_stops(pool: &PgPool, route_id: Uuid) -> Result<Vec<RouteStop>> {
    let stops = sqlx::query_as::<_, RouteStop>(
        r#"
        SELECT
            id, route_id, sequence, service_location_id, planning_cluster_id,
            lat, lng, service_minutes,
            travel_km_from_prev, travel_minutes_from_prev,
            planned_start, planned_end, actual_arrival, actual_departure, status
        FROM route_stops
        WHERE route_id = $1
        ORDER BY sequence
        "#,
    )
    .bind(route_id)
    .fetch_all(pool)
    .await?;

    Ok(stops)
}

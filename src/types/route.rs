//! Route types: the persisted schedule and the plan response shapes

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Route status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "route_status", rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl RouteStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteStatus::Planned => "planned",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
            RouteStatus::Cancelled => "cancelled",
        }
    }
}

/// Stop status lifecycle: `Pending → Arrived → Completed`, or
/// `Skipped`/`NotVisited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "route_stop_status", rename_all = "snake_case")]
pub enum StopStatus {
    Pending,
    Arrived,
    Completed,
    Skipped,
    NotVisited,
}

impl StopStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            StopStatus::Pending => "pending",
            StopStatus::Arrived => "arrived",
            StopStatus::Completed => "completed",
            StopStatus::Skipped => "skipped",
            StopStatus::NotVisited => "not_visited",
        }
    }
}

/// A route per (date, owner, driver).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub date: NaiveDate,
    pub owner_id: Uuid,
    pub driver_id: Uuid,
    /// Total planned work minutes (travel + wait + service)
    pub total_minutes: i32,
    pub total_km: f64,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stop on a route. Sequence numbers are contiguous starting at 1; the
/// first stop's travel leg is relative to the driver's start point.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub sequence: i32,
    pub service_location_id: Option<Uuid>,
    pub planning_cluster_id: Option<Uuid>,
    pub lat: f64,
    pub lng: f64,
    pub service_minutes: i32,
    pub travel_km_from_prev: f64,
    pub travel_minutes_from_prev: i32,
    pub planned_start: NaiveTime,
    pub planned_end: NaiveTime,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub status: StopStatus,
}

/// Why a candidate location ended up unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// Closed all day (weekly hours or a closed exception)
    ClosedOnDate,
    /// No selected driver carries the required service type
    NoServiceTypeMatch,
    /// No driver has an availability row for the date
    NoDriversAvailable,
    /// The optimizer could not place the stop within constraints
    NotPlaced,
}

impl UnassignedReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            UnassignedReason::ClosedOnDate => "closed_on_date",
            UnassignedReason::NoServiceTypeMatch => "no_service_type_match",
            UnassignedReason::NoDriversAvailable => "no_drivers_available",
            UnassignedReason::NotPlaced => "not_placed",
        }
    }
}

/// An unassigned location with its reason — reported, never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedStop {
    pub location_id: Uuid,
    pub reason: UnassignedReason,
}

/// Non-fatal advisory attached to a plan response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWarning {
    pub code: String,
    pub message: String,
}

/// A planned stop in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStop {
    pub location_id: Uuid,
    /// 1-based order within the driver's route
    pub sequence: i32,
    pub planned_start: NaiveTime,
    pub planned_end: NaiveTime,
    pub wait_minutes: i32,
    pub service_minutes: i32,
    pub travel_km_from_prev: f64,
    pub travel_minutes_from_prev: i32,
}

/// One driver's planned route in the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedDriverRoute {
    pub driver_id: Uuid,
    pub stops: Vec<PlannedStop>,
    pub total_km: f64,
    pub total_minutes: i32,
}

/// Response of a planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub date: NaiveDate,
    pub owner_id: Uuid,
    pub routes: Vec<PlannedDriverRoute>,
    pub unassigned: Vec<UnassignedStop>,
    pub warnings: Vec<PlanWarning>,
    /// True when the matrix came from the straight-line fallback
    pub degraded_matrix: bool,
    pub solve_time_ms: u64,
}

impl PlanResponse {
    /// Zero-route response for an empty problem.
    pub fn empty(date: NaiveDate, owner_id: Uuid, unassigned: Vec<UnassignedStop>) -> Self {
        Self {
            date,
            owner_id,
            routes: vec![],
            unassigned,
            warnings: vec![],
            degraded_matrix: false,
            solve_time_ms: 0,
        }
    }
}

//! Result mapper
//!
//! Replays each solved route as a sequential schedule: travel from the
//! previous point, wait for the window to open, then service. Produces the
//! persisted route/stop records and the API response shape. A stop the
//! replay cannot place (the solver and the replay must agree, but the replay
//! is authoritative) is reported as unassigned rather than silently dropped.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::services::optimizer::OptimizerSolution;
use crate::services::problem::VrpProblem;
use crate::services::time_window::{minute_to_time, try_schedule};
use crate::types::{
    PlannedDriverRoute, PlannedStop, Route, RouteStatus, RouteStop, StopStatus, UnassignedReason,
    UnassignedStop,
};

/// One driver's persisted route with its stops.
#[derive(Debug, Clone)]
pub struct MappedRoute {
    pub route: Route,
    pub stops: Vec<RouteStop>,
    pub response: PlannedDriverRoute,
}

/// Mapper output: persisted rows plus response routes and leftovers.
#[derive(Debug, Clone, Default)]
pub struct MappedSolution {
    pub routes: Vec<MappedRoute>,
    pub unassigned: Vec<UnassignedStop>,
}

/// Map a solver solution onto schedule records for persistence and response.
pub fn map_solution(problem: &VrpProblem, solution: &OptimizerSolution) -> MappedSolution {
    let mut mapped = MappedSolution::default();

    for vehicle_route in &solution.routes {
        let Some(vehicle) = problem
            .vehicles
            .iter()
            .find(|v| v.driver_id == vehicle_route.driver_id)
        else {
            warn!("Solution references unknown driver {}", vehicle_route.driver_id);
            continue;
        };

        let now = Utc::now();
        let route_id = Uuid::new_v4();
        let mut stops = vec![];
        let mut planned = vec![];
        let mut at_point = vehicle.point_index;
        let mut minute = vehicle.start_minute;
        let mut total_km = 0.0;
        let mut sequence = 1;

        for &si in &vehicle_route.stop_indices {
            let stop = &problem.stops[si];
            let travel_km = problem.matrix.km(at_point, stop.point_index);
            let travel_minutes = problem.matrix.minutes(at_point, stop.point_index) as i32;
            let arrival = minute + travel_minutes;
            let service = stop.effective_service_minutes(vehicle);

            let Some(visit) = try_schedule(&stop.window, arrival, service) else {
                warn!(
                    "Stop {} infeasible during replay of driver {} route",
                    stop.location_id, vehicle.driver_id
                );
                mapped.unassigned.push(UnassignedStop {
                    location_id: stop.location_id,
                    reason: UnassignedReason::NotPlaced,
                });
                continue;
            };

            let point = &problem.points[stop.point_index];
            stops.push(RouteStop {
                id: Uuid::new_v4(),
                route_id,
                sequence,
                service_location_id: Some(stop.location_id),
                planning_cluster_id: None,
                lat: point.lat,
                lng: point.lng,
                service_minutes: service,
                travel_km_from_prev: travel_km,
                travel_minutes_from_prev: travel_minutes,
                planned_start: minute_to_time(visit.start_minute),
                planned_end: minute_to_time(visit.end_minute),
                actual_arrival: None,
                actual_departure: None,
                status: StopStatus::Pending,
            });
            planned.push(PlannedStop {
                location_id: stop.location_id,
                sequence,
                planned_start: minute_to_time(visit.start_minute),
                planned_end: minute_to_time(visit.end_minute),
                wait_minutes: visit.wait_minutes,
                service_minutes: service,
                travel_km_from_prev: travel_km,
                travel_minutes_from_prev: travel_minutes,
            });

            at_point = stop.point_index;
            minute = visit.end_minute;
            total_km += travel_km;
            sequence += 1;
        }

        if stops.is_empty() {
            continue;
        }

        let total_minutes = minute - vehicle.start_minute;
        mapped.routes.push(MappedRoute {
            route: Route {
                id: route_id,
                date: problem.date,
                owner_id: problem.owner_id,
                driver_id: vehicle.driver_id,
                total_minutes,
                total_km,
                status: RouteStatus::Planned,
                created_at: now,
                updated_at: now,
            },
            stops,
            response: PlannedDriverRoute {
                driver_id: vehicle.driver_id,
                stops: planned,
                total_km,
                total_minutes,
            },
        });
    }

    for &si in &solution.unplaced {
        mapped.unassigned.push(UnassignedStop {
            location_id: problem.stops[si].location_id,
            reason: UnassignedReason::NotPlaced,
        });
    }

    mapped
}

//! Route optimizer
//!
//! The optimizer contract plus the built-in greedy solver. The greedy solver
//! repeatedly appends the globally cheapest feasible (vehicle, stop) pair,
//! checking window feasibility, availability end, work duration cap and stop
//! cap at every step. Ties break deterministically so identical input yields
//! identical output.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::problem::VrpProblem;
use crate::services::time_window::try_schedule;

/// Solver tuning caps, typically taken from the resolved weight template.
/// Strategy hints are free-form and engine-specific; the greedy solver
/// ignores them.
#[derive(Debug, Clone)]
pub struct OptimizerTuning {
    pub time_limit_seconds: u64,
    pub solution_limit: Option<u32>,
    pub construction_strategy: Option<String>,
    pub improvement_strategy: Option<String>,
}

impl Default for OptimizerTuning {
    fn default() -> Self {
        Self {
            time_limit_seconds: 30,
            solution_limit: None,
            construction_strategy: None,
            improvement_strategy: None,
        }
    }
}

/// One vehicle's ordered stop assignment (indices into `problem.stops`).
#[derive(Debug, Clone)]
pub struct VehicleRoute {
    pub driver_id: Uuid,
    pub stop_indices: Vec<usize>,
}

/// Solver output: routes plus stop indices that could not be placed.
#[derive(Debug, Clone)]
pub struct OptimizerSolution {
    pub routes: Vec<VehicleRoute>,
    pub unplaced: Vec<usize>,
}

/// A route optimizer. Implementations must respect vehicle windows, work
/// caps, stop caps and stop feasibility windows; they differ only in how
/// hard they search.
#[async_trait]
pub trait RouteOptimizer: Send + Sync {
    async fn solve(&self, problem: &VrpProblem, tuning: &OptimizerTuning) -> Result<OptimizerSolution>;

    /// Optimizer name for logging
    fn name(&self) -> &str;
}

/// Per-vehicle construction state while building routes.
struct VehicleState {
    /// Current point index (start point, then last visited stop)
    at_point: usize,
    /// Current clock, minutes-of-day
    minute: i32,
    /// Work minutes consumed so far (travel + wait + service)
    work_minutes: i32,
    stop_indices: Vec<usize>,
}

/// Greedy cheapest-insertion-at-end solver.
///
/// Deterministic: candidate ties resolve by lower edge score, then lower
/// stop index, then lower vehicle index.
pub struct GreedyOptimizer;

impl GreedyOptimizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GreedyOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteOptimizer for GreedyOptimizer {
    async fn solve(&self, problem: &VrpProblem, tuning: &OptimizerTuning) -> Result<OptimizerSolution> {
        let started = Instant::now();

        let mut states: Vec<VehicleState> = problem
            .vehicles
            .iter()
            .map(|v| VehicleState {
                at_point: v.point_index,
                minute: v.start_minute,
                work_minutes: 0,
                stop_indices: vec![],
            })
            .collect();

        let mut remaining: Vec<usize> = (0..problem.stops.len()).collect();

        while !remaining.is_empty() {
            if started.elapsed().as_secs() >= tuning.time_limit_seconds {
                warn!(
                    "Greedy solve hit the {}s time limit with {} stops remaining",
                    tuning.time_limit_seconds,
                    remaining.len()
                );
                break;
            }

            // Cheapest feasible (vehicle, stop) append across the whole fleet
            let mut best: Option<(f64, usize, usize, i32, i32)> = None;
            for (vi, vehicle) in problem.vehicles.iter().enumerate() {
                let state = &states[vi];
                if let Some(cap) = vehicle.max_stops {
                    if state.stop_indices.len() as i32 >= cap {
                        continue;
                    }
                }
                for &si in &remaining {
                    let stop = &problem.stops[si];
                    if problem.require_service_type_match && !vehicle.can_service(stop.service_type_id)
                    {
                        continue;
                    }
                    let travel = problem.matrix.minutes(state.at_point, stop.point_index) as i32;
                    let arrival = state.minute + travel;
                    let service = stop.effective_service_minutes(vehicle);
                    let Some(visit) = try_schedule(&stop.window, arrival, service) else {
                        continue;
                    };
                    if visit.end_minute > vehicle.end_minute {
                        continue;
                    }
                    let added_work = travel + visit.wait_minutes + service;
                    if state.work_minutes + added_work > vehicle.max_duration_minutes {
                        continue;
                    }

                    let score = problem.edge_cost[state.at_point][stop.point_index];
                    let candidate = (score, si, vi, visit.end_minute, added_work);
                    let better = match &best {
                        None => true,
                        Some((bs, bsi, bvi, _, _)) => {
                            (score, si, vi) < (*bs, *bsi, *bvi)
                        }
                    };
                    if better {
                        best = Some(candidate);
                    }
                }
            }

            let Some((_, si, vi, end_minute, added_work)) = best else {
                break;
            };

            let state = &mut states[vi];
            state.at_point = problem.stops[si].point_index;
            state.minute = end_minute;
            state.work_minutes += added_work;
            state.stop_indices.push(si);
            remaining.retain(|&r| r != si);
        }

        let routes: Vec<VehicleRoute> = problem
            .vehicles
            .iter()
            .zip(states)
            .filter(|(_, s)| !s.stop_indices.is_empty())
            .map(|(v, s)| VehicleRoute { driver_id: v.driver_id, stop_indices: s.stop_indices })
            .collect();

        debug!(
            "Greedy solve placed {} of {} stops across {} routes in {:?}",
            problem.stops.len() - remaining.len(),
            problem.stops.len(),
            routes.len(),
            started.elapsed()
        );

        Ok(OptimizerSolution { routes, unplaced: remaining })
    }

    fn name(&self) -> &str {
        "Greedy"
    }
}

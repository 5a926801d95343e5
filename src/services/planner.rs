//! Route planner orchestration
//!
//! Ties the pipeline together for one (date, owner) run: resolve weights and
//! cost settings, guard against concurrent runs for the same key, build the
//! problem, solve, map, and assemble the response. Empty problems and
//! unplaceable stops are ordinary outcomes; only configuration faults and a
//! duplicate in-flight run are errors.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::services::cost::CostModel;
use crate::services::mapper::{map_solution, MappedSolution};
use crate::services::matrix::MatrixProvider;
use crate::services::optimizer::{OptimizerSolution, OptimizerTuning, RouteOptimizer};
use crate::services::problem::{build_problem, PlanningData, VrpProblem};
use crate::types::{
    resolve_template, PlanRequest, PlanResponse, PlanWarning, UnassignedReason, UnassignedStop,
    VrpCostSettings, VrpWeightSet,
};

/// At most one planning run per (date, owner) at a time.
#[derive(Default)]
pub struct RunGuard {
    active: Arc<Mutex<HashSet<(NaiveDate, Uuid)>>>,
}

/// Releases the (date, owner) slot on drop.
pub struct RunPermit {
    key: (NaiveDate, Uuid),
    active: Arc<Mutex<HashSet<(NaiveDate, Uuid)>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, date: NaiveDate, owner_id: Uuid) -> Option<RunPermit> {
        let key = (date, owner_id);
        let mut active = self.active.lock();
        if active.insert(key) {
            Some(RunPermit { key, active: Arc::clone(&self.active) })
        } else {
            None
        }
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}

/// The planning service.
pub struct RoutePlanner {
    provider: MatrixProvider,
    optimizer: Arc<dyn RouteOptimizer>,
    guard: RunGuard,
    config: PlannerConfig,
}

impl RoutePlanner {
    pub fn new(
        provider: MatrixProvider,
        optimizer: Arc<dyn RouteOptimizer>,
        config: PlannerConfig,
    ) -> Self {
        Self { provider, optimizer, guard: RunGuard::new(), config }
    }

    /// Run one planning pass and return the full plan with persisted-shape
    /// routes, unassigned stops and warnings.
    pub async fn plan(
        &self,
        request: &PlanRequest,
        data: &PlanningData,
    ) -> Result<(PlanResponse, MappedSolution), PlanError> {
        let (weights, tuning) = self.resolve_weights(request, data)?;
        weights
            .validate()
            .map_err(PlanError::Configuration)?;

        let settings = self.resolve_cost_settings(request, data)?;

        let _permit = self
            .guard
            .begin(request.date, request.owner_id)
            .ok_or(PlanError::AlreadyRunning {
                date: request.date,
                owner_id: request.owner_id,
            })?;

        let cost_model = CostModel::new(weights, settings, request.normalize_weights);
        let mut warnings: Vec<PlanWarning> = vec![];
        if let Some(message) = cost_model.correlated_weights_warning() {
            warnings.push(PlanWarning { code: "correlated_weights".to_string(), message });
        }

        let problem =
            build_problem(request, data, &cost_model, &self.provider, &self.config).await;

        if problem.is_empty() {
            info!(
                "Empty problem for {} / owner {}: {} excluded",
                request.date,
                request.owner_id,
                problem.excluded.len()
            );
            let mut response =
                PlanResponse::empty(request.date, request.owner_id, all_unassigned(&problem));
            response.warnings = warnings;
            return Ok((response, MappedSolution::default()));
        }

        if problem.matrix.degraded {
            warnings.push(PlanWarning {
                code: "degraded_matrix".to_string(),
                message: "Road network matrix unavailable, using straight-line estimates"
                    .to_string(),
            });
        }

        let started = Instant::now();
        let solution = match self.optimizer.solve(&problem, &tuning).await {
            Ok(solution) => solution,
            Err(err) => {
                warn!("Optimizer {} failed: {}", self.optimizer.name(), err);
                warnings.push(PlanWarning {
                    code: "optimizer_failed".to_string(),
                    message: format!("Optimizer failed, no routes planned: {}", err),
                });
                OptimizerSolution { routes: vec![], unplaced: (0..problem.stops.len()).collect() }
            }
        };
        let solve_time_ms = started.elapsed().as_millis() as u64;

        let mapped = map_solution(&problem, &solution);

        let mut unassigned = problem.excluded.clone();
        unassigned.extend(mapped.unassigned.clone());

        let response = PlanResponse {
            date: request.date,
            owner_id: request.owner_id,
            routes: mapped.routes.iter().map(|r| r.response.clone()).collect(),
            unassigned,
            warnings,
            degraded_matrix: problem.matrix.degraded,
            solve_time_ms,
        };

        info!(
            "Planned {} routes, {} unassigned for {} / owner {} in {} ms",
            response.routes.len(),
            response.unassigned.len(),
            request.date,
            request.owner_id,
            solve_time_ms
        );

        Ok((response, mapped))
    }

    /// An explicit template id wins; otherwise the most specific applicable
    /// template; otherwise the request weights with default tuning.
    fn resolve_weights(
        &self,
        request: &PlanRequest,
        data: &PlanningData,
    ) -> Result<(VrpWeightSet, OptimizerTuning), PlanError> {
        let template = match request.weight_template_id {
            Some(id) => Some(
                data.templates
                    .iter()
                    .find(|t| t.id == id)
                    .ok_or_else(|| {
                        PlanError::Configuration(format!("weight template {} not found", id))
                    })?,
            ),
            None => resolve_template(&data.templates, request.owner_id, None),
        };

        Ok(match template {
            Some(t) => (
                t.weights,
                OptimizerTuning {
                    time_limit_seconds: t.time_limit_seconds,
                    solution_limit: t.solution_limit,
                    ..OptimizerTuning::default()
                },
            ),
            None => (request.weights, OptimizerTuning::default()),
        })
    }

    fn resolve_cost_settings(
        &self,
        request: &PlanRequest,
        data: &PlanningData,
    ) -> Result<VrpCostSettings, PlanError> {
        request
            .cost_settings
            .clone()
            .or_else(|| data.cost_settings.clone())
            .ok_or_else(|| {
                PlanError::Configuration(format!(
                    "no cost settings for owner {}",
                    request.owner_id
                ))
            })
    }
}

fn all_unassigned(problem: &VrpProblem) -> Vec<UnassignedStop> {
    let mut unassigned = problem.excluded.clone();
    unassigned.extend(problem.stops.iter().map(|s| UnassignedStop {
        location_id: s.location_id,
        reason: UnassignedReason::NoDriversAvailable,
    }));
    unassigned
}

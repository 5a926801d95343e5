//! Planning problem builder
//!
//! Assembles the daily planning input: eligible vehicles, feasible stop
//! candidates with resolved windows, the travel matrix over all points, and
//! the weighted edge-cost table the optimizer consumes. Locations that cannot
//! participate are excluded up front, each with a reason. An empty problem is
//! a valid result, never an error.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::services::cost::{due_urgency, CostModel, EdgeSignals, SignalScale};
use crate::services::matrix::{MatrixProvider, TravelMatrix};
use crate::services::time_window::{resolve_for_date, DayWindow};
use crate::types::{
    Coordinates, Driver, DriverAvailability, LocationStatus, PlanRequest, ServiceLocation,
    ServiceLocationException, ServiceLocationHours, UnassignedReason, UnassignedStop,
    VrpCostSettings, WeightTemplate,
};

/// Everything the builder reads for one planning run, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct PlanningData {
    pub drivers: Vec<Driver>,
    pub availability: Vec<DriverAvailability>,
    pub locations: Vec<ServiceLocation>,
    pub hours: Vec<ServiceLocationHours>,
    pub exceptions: Vec<ServiceLocationException>,
    pub cost_settings: Option<VrpCostSettings>,
    pub templates: Vec<WeightTemplate>,
}

/// A driver available on the plan date, bound to its start point index.
#[derive(Debug, Clone)]
pub struct VrpVehicle {
    pub driver_id: Uuid,
    pub point_index: usize,
    /// Availability window, minutes-of-day
    pub start_minute: i32,
    pub end_minute: i32,
    /// Hard cap on planned work: min(driver cap, availability length)
    pub max_duration_minutes: i32,
    pub max_stops: Option<i32>,
    pub default_service_minutes: i32,
    /// Service types this vehicle can handle, carried from the driver
    pub service_type_ids: Vec<Uuid>,
}

impl VrpVehicle {
    /// Whether this vehicle can service the given required type. Checked per
    /// assignment when the problem enforces type matching.
    pub fn can_service(&self, required: Option<Uuid>) -> bool {
        match required {
            None => true,
            Some(t) => self.service_type_ids.contains(&t),
        }
    }
}

/// A plannable stop with its resolved feasibility window.
#[derive(Debug, Clone)]
pub struct VrpStopCandidate {
    pub location_id: Uuid,
    pub point_index: usize,
    /// Service duration; non-positive falls back to the vehicle default
    pub service_minutes: i32,
    pub window: DayWindow,
    pub due_urgency: f64,
    pub service_type_id: Option<Uuid>,
}

impl VrpStopCandidate {
    pub fn effective_service_minutes(&self, vehicle: &VrpVehicle) -> i32 {
        if self.service_minutes > 0 {
            self.service_minutes
        } else {
            vehicle.default_service_minutes
        }
    }
}

/// The assembled problem handed to the optimizer.
pub struct VrpProblem {
    pub date: NaiveDate,
    pub owner_id: Uuid,
    /// Vehicle start points first, then stop points
    pub points: Vec<Coordinates>,
    pub vehicles: Vec<VrpVehicle>,
    pub stops: Vec<VrpStopCandidate>,
    pub matrix: Arc<TravelMatrix>,
    /// Weighted score for every (from point, to point) edge; lower is better
    pub edge_cost: Vec<Vec<f64>>,
    /// Locations excluded before optimization, with reasons
    pub excluded: Vec<UnassignedStop>,
    /// When set, a vehicle may only take stops it `can_service`
    pub require_service_type_match: bool,
}

impl VrpProblem {
    /// Nothing to optimize: no vehicle or no candidate stop.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() || self.stops.is_empty()
    }
}

/// Build the planning problem for one (date, owner) run.
pub async fn build_problem(
    request: &PlanRequest,
    data: &PlanningData,
    cost_model: &CostModel,
    provider: &MatrixProvider,
    config: &PlannerConfig,
) -> VrpProblem {
    let date = request.date;
    let owner_id = request.owner_id;

    // Eligible drivers: active, owned, with a valid availability row for the date
    let mut vehicles: Vec<(Driver, DriverAvailability)> = vec![];
    for driver in &data.drivers {
        if !driver.is_active || driver.owner_id != owner_id {
            continue;
        }
        let availability = data
            .availability
            .iter()
            .find(|a| a.driver_id == driver.id && a.date == date && a.is_valid());
        if let Some(availability) = availability {
            vehicles.push((driver.clone(), availability.clone()));
        }
    }
    // Deterministic vehicle order
    vehicles.sort_by_key(|(d, _)| d.id);

    // Candidate locations: open, owned, in the requested subset
    let candidates: Vec<&ServiceLocation> = data
        .locations
        .iter()
        .filter(|l| l.status == LocationStatus::Open && l.owner_id == owner_id)
        .filter(|l| match &request.location_ids {
            Some(ids) => ids.contains(&l.id),
            None => true,
        })
        .collect();

    let mut excluded = vec![];
    let mut stops: Vec<(&ServiceLocation, DayWindow)> = vec![];

    for location in candidates {
        let weekly: Vec<ServiceLocationHours> = data
            .hours
            .iter()
            .filter(|h| h.location_id == location.id)
            .cloned()
            .collect();
        let exceptions: Vec<ServiceLocationException> = data
            .exceptions
            .iter()
            .filter(|e| e.location_id == location.id)
            .cloned()
            .collect();

        let window = resolve_for_date(&weekly, &exceptions, date);
        if window.is_closed() {
            excluded.push(UnassignedStop {
                location_id: location.id,
                reason: UnassignedReason::ClosedOnDate,
            });
            continue;
        }

        if request.require_service_type_match
            && !vehicles.is_empty()
            && !vehicles.iter().any(|(d, _)| d.can_service(location.service_type_id))
        {
            excluded.push(UnassignedStop {
                location_id: location.id,
                reason: UnassignedReason::NoServiceTypeMatch,
            });
            continue;
        }

        stops.push((location, window));
    }

    if vehicles.is_empty() {
        for (location, _) in &stops {
            excluded.push(UnassignedStop {
                location_id: location.id,
                reason: UnassignedReason::NoDriversAvailable,
            });
        }
        info!("No drivers available on {}, {} locations unassigned", date, excluded.len());
        return VrpProblem {
            date,
            owner_id,
            points: vec![],
            vehicles: vec![],
            stops: vec![],
            matrix: Arc::new(TravelMatrix::empty()),
            edge_cost: vec![],
            excluded,
            require_service_type_match: request.require_service_type_match,
        };
    }

    // Deterministic stop order
    stops.sort_by_key(|(l, _)| l.id);

    // With type matching on, a driver who can service none of the remaining
    // stops contributes nothing; drop it from the vehicle set.
    if request.require_service_type_match && !stops.is_empty() {
        vehicles.retain(|(d, _)| stops.iter().any(|(l, _)| d.can_service(l.service_type_id)));
    }

    // Point layout: vehicle starts first, then stops
    let mut points: Vec<Coordinates> = vehicles.iter().map(|(d, _)| d.start_point()).collect();
    let stop_base = points.len();
    points.extend(stops.iter().map(|(l, _)| l.point()));

    let vrp_vehicles: Vec<VrpVehicle> = vehicles
        .iter()
        .enumerate()
        .map(|(i, (driver, availability))| VrpVehicle {
            driver_id: driver.id,
            point_index: i,
            start_minute: availability.start_minute,
            end_minute: availability.end_minute,
            max_duration_minutes: driver
                .max_work_minutes_per_day
                .min(availability.work_minutes()),
            max_stops: request.max_stops_per_driver,
            default_service_minutes: driver.default_service_minutes,
            service_type_ids: driver.service_type_ids.clone(),
        })
        .collect();

    let vrp_stops: Vec<VrpStopCandidate> = stops
        .iter()
        .enumerate()
        .map(|(i, (location, window))| VrpStopCandidate {
            location_id: location.id,
            point_index: stop_base + i,
            service_minutes: location.service_minutes,
            window: window.clone(),
            due_urgency: due_urgency(date, Some(location.due_date), config.urgency_horizon_days),
            service_type_id: location.service_type_id,
        })
        .collect();

    let departure_minute = vrp_vehicles
        .iter()
        .map(|v| v.start_minute)
        .min()
        .unwrap_or(480);
    let matrix = provider.get_matrix(&points, date, departure_minute).await;

    let edge_cost = build_edge_costs(&matrix, &vrp_stops, cost_model);

    debug!(
        "Problem built for {}: {} vehicles, {} stops, {} excluded",
        date,
        vrp_vehicles.len(),
        vrp_stops.len(),
        excluded.len()
    );

    VrpProblem {
        date,
        owner_id,
        points,
        vehicles: vrp_vehicles,
        stops: vrp_stops,
        matrix,
        edge_cost,
        excluded,
        require_service_type_match: request.require_service_type_match,
    }
}

/// Score every edge into a stop point. Edges into non-stop points stay at
/// zero; the optimizer never traverses them.
fn build_edge_costs(
    matrix: &TravelMatrix,
    stops: &[VrpStopCandidate],
    cost_model: &CostModel,
) -> Vec<Vec<f64>> {
    let n = matrix.size;
    let mut signals: Vec<Vec<Option<EdgeSignals>>> = vec![vec![None; n]; n];

    for stop in stops {
        let to = stop.point_index;
        for from in 0..n {
            if from == to {
                continue;
            }
            signals[from][to] = Some(cost_model.signals(
                matrix.km(from, to),
                matrix.minutes(from, to),
                stop.due_urgency,
                0.0,
            ));
        }
    }

    let scale = SignalScale::from_signals(signals.iter().flatten().flatten());

    let mut edge_cost = vec![vec![0.0; n]; n];
    for from in 0..n {
        for to in 0..n {
            if let Some(s) = &signals[from][to] {
                edge_cost[from][to] = cost_model.score(s, &scale);
            }
        }
    }
    edge_cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::learned_stats::{LearnedStatsStore, StatThresholds};
    use crate::services::matrix::EstimateBackend;
    use crate::services::travel_time::TravelTimeModel;
    use crate::types::{TravelTimeRegion, VrpWeightSet};
    use chrono::Utc;
    use std::time::Duration;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn driver(owner: Uuid, lat: f64, lng: f64) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: "Driver".to_string(),
            start_lat: lat,
            start_lng: lng,
            default_service_minutes: 30,
            max_work_minutes_per_day: 480,
            is_active: true,
            service_type_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn availability(driver_id: Uuid, date: NaiveDate) -> DriverAvailability {
        DriverAvailability {
            id: Uuid::new_v4(),
            driver_id,
            date,
            start_minute: 480,
            end_minute: 1020,
        }
    }

    fn location(owner: Uuid, lat: f64, lng: f64) -> ServiceLocation {
        ServiceLocation {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: "Location".to_string(),
            lat,
            lng,
            due_date: monday() + chrono::Duration::days(30),
            priority_date: None,
            service_minutes: 30,
            service_type_id: None,
            status: LocationStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn global_region() -> TravelTimeRegion {
        TravelTimeRegion {
            id: Uuid::new_v4(),
            name: "Global".to_string(),
            min_lat: -90.0,
            min_lng: -180.0,
            max_lat: 90.0,
            max_lng: 180.0,
            priority: 0,
            is_global: true,
        }
    }

    fn provider() -> MatrixProvider {
        let config = PlannerConfig::default();
        let stats = Arc::new(LearnedStatsStore::new(StatThresholds::from_config(&config)));
        let model = Arc::new(TravelTimeModel::new(vec![global_region()], vec![], stats, config));
        MatrixProvider::estimate_only(
            Arc::new(EstimateBackend::new(model, 1.3)),
            Duration::from_secs(60),
        )
    }

    fn cost_model(owner: Uuid) -> CostModel {
        CostModel::new(
            VrpWeightSet::default(),
            VrpCostSettings {
                owner_id: owner,
                fuel_cost_per_km: 0.2,
                personnel_cost_per_hour: 20.0,
                currency_code: "CZK".to_string(),
            },
            false,
        )
    }

    fn request(owner: Uuid) -> PlanRequest {
        PlanRequest {
            date: monday(),
            owner_id: owner,
            location_ids: None,
            max_stops_per_driver: None,
            weights: VrpWeightSet::default(),
            cost_settings: None,
            require_service_type_match: false,
            normalize_weights: false,
            weight_template_id: None,
        }
    }

    #[tokio::test]
    async fn test_build_basic_problem() {
        let owner = Uuid::new_v4();
        let d = driver(owner, 50.05, 14.40);
        let data = PlanningData {
            availability: vec![availability(d.id, monday())],
            drivers: vec![d],
            locations: vec![location(owner, 50.10, 14.45), location(owner, 50.08, 14.50)],
            ..Default::default()
        };

        let problem = build_problem(
            &request(owner),
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        assert!(!problem.is_empty());
        assert_eq!(problem.vehicles.len(), 1);
        assert_eq!(problem.stops.len(), 2);
        assert_eq!(problem.points.len(), 3);
        assert_eq!(problem.matrix.size, 3);
        assert!(problem.excluded.is_empty());

        // Vehicle caps: min(480 driver cap, 540 availability)
        assert_eq!(problem.vehicles[0].max_duration_minutes, 480);
        // Edge from the vehicle start into each stop is scored
        for stop in &problem.stops {
            assert!(problem.edge_cost[0][stop.point_index] > 0.0);
        }
    }

    #[tokio::test]
    async fn test_no_drivers_excludes_everything() {
        let owner = Uuid::new_v4();
        let data = PlanningData {
            locations: vec![location(owner, 50.10, 14.45)],
            ..Default::default()
        };

        let problem = build_problem(
            &request(owner),
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        assert!(problem.is_empty());
        assert_eq!(problem.excluded.len(), 1);
        assert_eq!(problem.excluded[0].reason, UnassignedReason::NoDriversAvailable);
    }

    #[tokio::test]
    async fn test_closed_location_excluded() {
        let owner = Uuid::new_v4();
        let d = driver(owner, 50.05, 14.40);
        let open = location(owner, 50.10, 14.45);
        let closed = location(owner, 50.08, 14.50);
        let exceptions = vec![ServiceLocationException {
            id: Uuid::new_v4(),
            location_id: closed.id,
            date: monday(),
            is_closed: true,
            open_minute: None,
            close_minute: None,
            note: None,
        }];
        let closed_id = closed.id;
        let data = PlanningData {
            availability: vec![availability(d.id, monday())],
            drivers: vec![d],
            locations: vec![open, closed],
            exceptions,
            ..Default::default()
        };

        let problem = build_problem(
            &request(owner),
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        assert_eq!(problem.stops.len(), 1);
        assert_eq!(problem.excluded.len(), 1);
        assert_eq!(problem.excluded[0].location_id, closed_id);
        assert_eq!(problem.excluded[0].reason, UnassignedReason::ClosedOnDate);
    }

    #[tokio::test]
    async fn test_service_type_mismatch_excluded_when_required() {
        let owner = Uuid::new_v4();
        let d = driver(owner, 50.05, 14.40);
        let mut loc = location(owner, 50.10, 14.45);
        loc.service_type_id = Some(Uuid::new_v4());
        let loc_id = loc.id;
        let data = PlanningData {
            availability: vec![availability(d.id, monday())],
            drivers: vec![d],
            locations: vec![loc],
            ..Default::default()
        };

        let mut req = request(owner);
        req.require_service_type_match = true;
        let problem = build_problem(
            &req,
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        assert!(problem.is_empty());
        assert_eq!(problem.excluded.len(), 1);
        assert_eq!(problem.excluded[0].location_id, loc_id);
        assert_eq!(problem.excluded[0].reason, UnassignedReason::NoServiceTypeMatch);

        // Without the flag the stop stays in
        let problem = build_problem(
            &request(owner),
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;
        assert_eq!(problem.stops.len(), 1);
    }

    #[tokio::test]
    async fn test_type_match_drops_incapable_drivers_and_keeps_capability() {
        let owner = Uuid::new_v4();
        let service_type = Uuid::new_v4();
        let untyped_driver = driver(owner, 50.05, 14.40);
        let mut typed_driver = driver(owner, 50.06, 14.41);
        typed_driver.service_type_ids = vec![service_type];
        let typed_driver_id = typed_driver.id;
        let mut loc = location(owner, 50.10, 14.45);
        loc.service_type_id = Some(service_type);
        let data = PlanningData {
            availability: vec![
                availability(untyped_driver.id, monday()),
                availability(typed_driver.id, monday()),
            ],
            drivers: vec![untyped_driver, typed_driver],
            locations: vec![loc],
            ..Default::default()
        };

        let mut req = request(owner);
        req.require_service_type_match = true;
        let problem = build_problem(
            &req,
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        // The driver with no matching type cannot take the only stop
        assert_eq!(problem.stops.len(), 1);
        assert_eq!(problem.vehicles.len(), 1);
        assert_eq!(problem.vehicles[0].driver_id, typed_driver_id);
        assert!(problem.require_service_type_match);
        assert!(problem.vehicles[0].can_service(Some(service_type)));
        assert!(!problem.vehicles[0].can_service(Some(Uuid::new_v4())));
    }

    #[tokio::test]
    async fn test_foreign_and_non_open_locations_filtered() {
        let owner = Uuid::new_v4();
        let d = driver(owner, 50.05, 14.40);
        let mut done = location(owner, 50.10, 14.45);
        done.status = LocationStatus::Done;
        let foreign = location(Uuid::new_v4(), 50.08, 14.50);
        let data = PlanningData {
            availability: vec![availability(d.id, monday())],
            drivers: vec![d],
            locations: vec![done, foreign],
            ..Default::default()
        };

        let problem = build_problem(
            &request(owner),
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        assert!(problem.is_empty());
        assert!(problem.excluded.is_empty());
    }

    #[tokio::test]
    async fn test_subset_filter() {
        let owner = Uuid::new_v4();
        let d = driver(owner, 50.05, 14.40);
        let a = location(owner, 50.10, 14.45);
        let b = location(owner, 50.08, 14.50);
        let wanted = a.id;
        let data = PlanningData {
            availability: vec![availability(d.id, monday())],
            drivers: vec![d],
            locations: vec![a, b],
            ..Default::default()
        };

        let mut req = request(owner);
        req.location_ids = Some(vec![wanted]);
        let problem = build_problem(
            &req,
            &data,
            &cost_model(owner),
            &provider(),
            &PlannerConfig::default(),
        )
        .await;

        assert_eq!(problem.stops.len(), 1);
        assert_eq!(problem.stops[0].location_id, wanted);
    }
}

//! Weight templates and cost settings for multi-objective scoring

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five objective weights applied when scoring candidate assignments.
/// All weights are non-negative; their relative magnitudes drive the score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrpWeightSet {
    pub distance: f64,
    pub time: f64,
    /// Due-date urgency
    pub date: f64,
    /// Monetary cost (fuel + personnel)
    pub cost: f64,
    pub overtime: f64,
}

impl Default for VrpWeightSet {
    fn default() -> Self {
        Self { distance: 40.0, time: 30.0, date: 20.0, cost: 10.0, overtime: 0.0 }
    }
}

impl VrpWeightSet {
    pub fn sum(&self) -> f64 {
        self.distance + self.time + self.date + self.cost + self.overtime
    }

    /// Validate the set: every weight non-negative and at least one positive.
    pub fn validate(&self) -> Result<(), String> {
        let all = [self.distance, self.time, self.date, self.cost, self.overtime];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("weights must be non-negative finite numbers".to_string());
        }
        if self.sum() <= 0.0 {
            return Err("at least one weight must be positive".to_string());
        }
        Ok(())
    }

    /// Rescale so the weights sum to 100 — relative, not absolute,
    /// magnitudes drive the combined score.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return *self;
        }
        let f = 100.0 / sum;
        Self {
            distance: self.distance * f,
            time: self.time * f,
            date: self.date * f,
            cost: self.cost * f,
            overtime: self.overtime * f,
        }
    }
}

/// Owner-scoped cost settings used by the monetary component of the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrpCostSettings {
    pub owner_id: Uuid,
    pub fuel_cost_per_km: f64,
    pub personnel_cost_per_hour: f64,
    pub currency_code: String,
}

/// Scope of a weight template, narrowest wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScope {
    Global,
    Owner,
    ServiceType,
}

impl WeightScope {
    /// Higher = more specific.
    const fn specificity(self) -> u8 {
        match self {
            WeightScope::Global => 0,
            WeightScope::Owner => 1,
            WeightScope::ServiceType => 2,
        }
    }
}

/// Named, reusable set of objective weights plus solver tuning caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTemplate {
    pub id: Uuid,
    pub name: String,
    pub scope: WeightScope,
    /// Required for `Owner` scope
    pub owner_id: Option<Uuid>,
    /// Required for `ServiceType` scope
    pub service_type_id: Option<Uuid>,
    /// Optional explicit location set the template applies to
    pub location_ids: Option<Vec<Uuid>>,
    pub weights: VrpWeightSet,
    pub time_limit_seconds: u64,
    pub solution_limit: Option<u32>,
}

impl WeightTemplate {
    fn applies_to(&self, owner_id: Uuid, service_type_id: Option<Uuid>) -> bool {
        match self.scope {
            WeightScope::Global => true,
            WeightScope::Owner => self.owner_id == Some(owner_id),
            WeightScope::ServiceType => {
                self.service_type_id.is_some() && self.service_type_id == service_type_id
            }
        }
    }
}

/// Pick the most specific applicable template (ServiceType > Owner > Global);
/// ties resolve deterministically by lowest template id.
pub fn resolve_template<'a>(
    templates: &'a [WeightTemplate],
    owner_id: Uuid,
    service_type_id: Option<Uuid>,
) -> Option<&'a WeightTemplate> {
    templates
        .iter()
        .filter(|t| t.applies_to(owner_id, service_type_id))
        .min_by_key(|t| (std::cmp::Reverse(t.scope.specificity()), t.id))
}

/// Solve request consumed by the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub date: NaiveDate,
    pub owner_id: Uuid,
    /// Optional explicit subset of location ids to plan
    pub location_ids: Option<Vec<Uuid>>,
    /// Optional per-driver stop cap
    pub max_stops_per_driver: Option<i32>,
    pub weights: VrpWeightSet,
    /// When absent, owner-scoped system settings are used
    pub cost_settings: Option<VrpCostSettings>,
    #[serde(default)]
    pub require_service_type_match: bool,
    #[serde(default)]
    pub normalize_weights: bool,
    pub weight_template_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(scope: WeightScope, owner: Option<Uuid>, service_type: Option<Uuid>) -> WeightTemplate {
        WeightTemplate {
            id: Uuid::new_v4(),
            name: "t".to_string(),
            scope,
            owner_id: owner,
            service_type_id: service_type,
            location_ids: None,
            weights: VrpWeightSet::default(),
            time_limit_seconds: 10,
            solution_limit: None,
        }
    }

    #[test]
    fn test_validate_rejects_negative() {
        let w = VrpWeightSet { distance: -1.0, ..VrpWeightSet::default() };
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_all_zero() {
        let w = VrpWeightSet { distance: 0.0, time: 0.0, date: 0.0, cost: 0.0, overtime: 0.0 };
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_normalized_sums_to_100() {
        let w = VrpWeightSet { distance: 2.0, time: 1.0, date: 1.0, cost: 0.0, overtime: 0.0 };
        let n = w.normalized();
        assert!((n.sum() - 100.0).abs() < 1e-9);
        assert!((n.distance - 50.0).abs() < 1e-9);
        assert!((n.time - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_prefers_most_specific() {
        let owner = Uuid::new_v4();
        let service_type = Uuid::new_v4();
        let templates = vec![
            template(WeightScope::Global, None, None),
            template(WeightScope::Owner, Some(owner), None),
            template(WeightScope::ServiceType, None, Some(service_type)),
        ];

        let picked = resolve_template(&templates, owner, Some(service_type)).unwrap();
        assert_eq!(picked.scope, WeightScope::ServiceType);

        let picked = resolve_template(&templates, owner, None).unwrap();
        assert_eq!(picked.scope, WeightScope::Owner);

        let picked = resolve_template(&templates, Uuid::new_v4(), None).unwrap();
        assert_eq!(picked.scope, WeightScope::Global);
    }

    #[test]
    fn test_resolve_tie_breaks_by_lowest_id() {
        let a = template(WeightScope::Global, None, None);
        let b = template(WeightScope::Global, None, None);
        let expected = a.id.min(b.id);
        let templates = [a, b];
        let picked = resolve_template(&templates, Uuid::new_v4(), None).unwrap();
        assert_eq!(picked.id, expected);
    }
}

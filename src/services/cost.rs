//! Edge cost scoring
//!
//! Combines five signals into a single edge score: distance, travel time,
//! due-date urgency, monetary cost, and overtime. Each signal is normalized
//! to a 0-100 scale against the maximum observed over the candidate set
//! before the weights are applied, so no raw unit dominates the others.

use chrono::NaiveDate;

use crate::types::{VrpCostSettings, VrpWeightSet};

/// Raw (unnormalized) signal values for one candidate edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeSignals {
    pub km: f64,
    pub minutes: f64,
    /// Due-date urgency of the target stop (0 when not due soon)
    pub urgency: f64,
    /// Fuel + personnel cost of traversing the edge
    pub money: f64,
    pub overtime_minutes: f64,
}

/// Monetary cost of an edge: fuel by distance plus personnel by time.
pub fn monetary_cost(km: f64, minutes: f64, settings: &VrpCostSettings) -> f64 {
    km * settings.fuel_cost_per_km + minutes / 60.0 * settings.personnel_cost_per_hour
}

/// Urgency of a due date seen from the plan date.
///
/// Grows linearly as the due date approaches: zero when it is at least
/// `horizon_days` away, `horizon_days` when due today, and keeps growing
/// past the horizon for overdue stops.
pub fn due_urgency(plan_date: NaiveDate, due_date: Option<NaiveDate>, horizon_days: i64) -> f64 {
    match due_date {
        Some(due) => {
            let days_until = (due - plan_date).num_days();
            (horizon_days - days_until).max(0) as f64
        }
        None => 0.0,
    }
}

/// Per-signal maxima over a candidate set, used for normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalScale {
    pub max_km: f64,
    pub max_minutes: f64,
    pub max_urgency: f64,
    pub max_money: f64,
    pub max_overtime: f64,
}

impl SignalScale {
    pub fn from_signals<'a>(signals: impl IntoIterator<Item = &'a EdgeSignals>) -> Self {
        let mut scale = Self::default();
        for s in signals {
            scale.max_km = scale.max_km.max(s.km);
            scale.max_minutes = scale.max_minutes.max(s.minutes);
            scale.max_urgency = scale.max_urgency.max(s.urgency);
            scale.max_money = scale.max_money.max(s.money);
            scale.max_overtime = scale.max_overtime.max(s.overtime_minutes);
        }
        scale
    }
}

/// Weighted scoring of candidate edges.
#[derive(Debug, Clone)]
pub struct CostModel {
    weights: VrpWeightSet,
    settings: VrpCostSettings,
}

impl CostModel {
    pub fn new(weights: VrpWeightSet, settings: VrpCostSettings, normalize: bool) -> Self {
        let weights = if normalize { weights.normalized() } else { weights };
        Self { weights, settings }
    }

    pub fn weights(&self) -> &VrpWeightSet {
        &self.weights
    }

    pub fn settings(&self) -> &VrpCostSettings {
        &self.settings
    }

    pub fn signals(&self, km: f64, minutes: f64, urgency: f64, overtime_minutes: f64) -> EdgeSignals {
        EdgeSignals {
            km,
            minutes,
            urgency,
            money: monetary_cost(km, minutes, &self.settings),
            overtime_minutes,
        }
    }

    /// Combined score; lower is better. A signal whose maximum over the
    /// candidate set is zero contributes nothing. Urgency enters inverted:
    /// the most urgent stop in the set costs 0 on the date component, a
    /// stop with no urgency costs the full weight.
    pub fn score(&self, signals: &EdgeSignals, scale: &SignalScale) -> f64 {
        let date_component = if scale.max_urgency > 0.0 {
            100.0 - normalize(signals.urgency, scale.max_urgency)
        } else {
            0.0
        };
        self.weights.distance * normalize(signals.km, scale.max_km)
            + self.weights.time * normalize(signals.minutes, scale.max_minutes)
            + self.weights.date * date_component
            + self.weights.cost * normalize(signals.money, scale.max_money)
            + self.weights.overtime * normalize(signals.overtime_minutes, scale.max_overtime)
    }

    /// Distance and monetary cost rise and fall together (money is partly
    /// a linear function of distance); weighting both double-counts.
    pub fn correlated_weights_warning(&self) -> Option<String> {
        if self.weights.distance > 0.0 && self.weights.cost > 0.0 {
            Some(
                "Distance and cost weights are both active; they are strongly correlated and \
                 distance effectively counts twice"
                    .to_string(),
            )
        } else {
            None
        }
    }
}

/// Scale a value to 0..=100 against the observed maximum.
fn normalize(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        value / max * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn settings() -> VrpCostSettings {
        VrpCostSettings {
            owner_id: Uuid::new_v4(),
            fuel_cost_per_km: 0.2,
            personnel_cost_per_hour: 20.0,
            currency_code: "CZK".to_string(),
        }
    }

    #[test]
    fn test_monetary_cost() {
        // 10 km * 0.2 + 0.5 h * 20 = 12
        let cost = monetary_cost(10.0, 30.0, &settings());
        assert!((cost - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_due_urgency_horizon() {
        let plan = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        // Due far out: no urgency
        let far = plan + chrono::Duration::days(30);
        assert_eq!(due_urgency(plan, Some(far), 14), 0.0);

        // Due in 4 days: 14 - 4 = 10
        let soon = plan + chrono::Duration::days(4);
        assert_eq!(due_urgency(plan, Some(soon), 14), 10.0);

        // Due today: full horizon
        assert_eq!(due_urgency(plan, Some(plan), 14), 14.0);

        // Overdue: keeps growing
        let overdue = plan - chrono::Duration::days(3);
        assert_eq!(due_urgency(plan, Some(overdue), 14), 17.0);

        // No due date at all
        assert_eq!(due_urgency(plan, None, 14), 0.0);
    }

    #[test]
    fn test_scale_from_signals() {
        let signals = vec![
            EdgeSignals { km: 10.0, minutes: 20.0, urgency: 0.0, money: 5.0, overtime_minutes: 0.0 },
            EdgeSignals { km: 4.0, minutes: 35.0, urgency: 7.0, money: 9.0, overtime_minutes: 0.0 },
        ];
        let scale = SignalScale::from_signals(&signals);
        assert_eq!(scale.max_km, 10.0);
        assert_eq!(scale.max_minutes, 35.0);
        assert_eq!(scale.max_urgency, 7.0);
        assert_eq!(scale.max_money, 9.0);
        assert_eq!(scale.max_overtime, 0.0);
    }

    #[test]
    fn test_score_prefers_shorter_edge_with_distance_weight() {
        let weights = VrpWeightSet { distance: 100.0, time: 0.0, date: 0.0, cost: 0.0, overtime: 0.0 };
        let model = CostModel::new(weights, settings(), false);

        let near = model.signals(2.0, 5.0, 0.0, 0.0);
        let far = model.signals(20.0, 40.0, 0.0, 0.0);
        let scale = SignalScale::from_signals([&near, &far]);

        assert!(model.score(&near, &scale) < model.score(&far, &scale));
    }

    #[test]
    fn test_score_zero_max_contributes_nothing() {
        let weights = VrpWeightSet::default();
        let model = CostModel::new(weights, settings(), false);

        // All signals zero over the whole set
        let s = EdgeSignals::default();
        let scale = SignalScale::from_signals([&s]);
        assert_eq!(model.score(&s, &scale), 0.0);
    }

    #[test]
    fn test_score_urgency_pulls_due_stop_ahead() {
        let weights = VrpWeightSet { distance: 20.0, time: 0.0, date: 80.0, cost: 0.0, overtime: 0.0 };
        let model = CostModel::new(weights, settings(), false);

        // A slightly farther stop due today beats a near stop with no deadline
        // when the date weight dominates
        let near_relaxed = model.signals(5.0, 10.0, 0.0, 0.0);
        let far_urgent = model.signals(8.0, 15.0, 14.0, 0.0);
        let scale = SignalScale::from_signals([&near_relaxed, &far_urgent]);

        assert!(model.score(&far_urgent, &scale) < model.score(&near_relaxed, &scale));
    }

    #[test]
    fn test_score_no_urgency_anywhere_ignores_date_weight() {
        let weights = VrpWeightSet { distance: 0.0, time: 0.0, date: 100.0, cost: 0.0, overtime: 0.0 };
        let model = CostModel::new(weights, settings(), false);

        let a = model.signals(5.0, 10.0, 0.0, 0.0);
        let b = model.signals(8.0, 15.0, 0.0, 0.0);
        let scale = SignalScale::from_signals([&a, &b]);

        assert_eq!(model.score(&a, &scale), 0.0);
        assert_eq!(model.score(&b, &scale), 0.0);
    }

    #[test]
    fn test_normalize_weights_on_construction() {
        let weights = VrpWeightSet { distance: 2.0, time: 1.0, date: 1.0, cost: 0.0, overtime: 0.0 };
        let model = CostModel::new(weights, settings(), true);
        assert!((model.weights().sum() - 100.0).abs() < 1e-9);
        assert!((model.weights().distance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlated_weights_warning() {
        let both = VrpWeightSet { distance: 40.0, time: 0.0, date: 0.0, cost: 10.0, overtime: 0.0 };
        assert!(CostModel::new(both, settings(), false).correlated_weights_warning().is_some());

        let only_distance = VrpWeightSet { distance: 40.0, time: 0.0, date: 0.0, cost: 0.0, overtime: 0.0 };
        assert!(CostModel::new(only_distance, settings(), false).correlated_weights_warning().is_none());
    }
}

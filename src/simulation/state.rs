//! Externally visible simulation state and the global metric rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{ParameterMetrics, Philosophy, ScenarioConfig};
use crate::simulation::agent::Agent;

/// One of the seven society-wide indicators, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlobalMetric {
    SocialTrust,
    ResourceEfficiency,
    IndividualAutonomy,
    CommunityWellbeing,
    TotalHappiness,
    PrivacyScore,
    FreedomIndex,
}

impl GlobalMetric {
    /// Every metric, in display order.
    pub const ALL: [GlobalMetric; 7] = [
        Self::SocialTrust,
        Self::ResourceEfficiency,
        Self::IndividualAutonomy,
        Self::CommunityWellbeing,
        Self::TotalHappiness,
        Self::PrivacyScore,
        Self::FreedomIndex,
    ];

    /// camelCase name used by scenario success metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SocialTrust => "socialTrust",
            Self::ResourceEfficiency => "resourceEfficiency",
            Self::IndividualAutonomy => "individualAutonomy",
            Self::CommunityWellbeing => "communityWellbeing",
            Self::TotalHappiness => "totalHappiness",
            Self::PrivacyScore => "privacyScore",
            Self::FreedomIndex => "freedomIndex",
        }
    }

    /// Inverse of [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Current value of every global metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMetrics {
    pub social_trust: f64,
    pub resource_efficiency: f64,
    pub individual_autonomy: f64,
    pub community_wellbeing: f64,
    pub total_happiness: f64,
    pub privacy_score: f64,
    pub freedom_index: f64,
}

impl Default for GlobalMetrics {
    /// Baseline values every scenario starts from.
    fn default() -> Self {
        Self {
            social_trust: 65.0,
            resource_efficiency: 70.0,
            individual_autonomy: 60.0,
            community_wellbeing: 68.0,
            total_happiness: 66.0,
            privacy_score: 75.0,
            freedom_index: 70.0,
        }
    }
}

impl GlobalMetrics {
    /// Value of one metric.
    pub fn get(&self, metric: GlobalMetric) -> f64 {
        match metric {
            GlobalMetric::SocialTrust => self.social_trust,
            GlobalMetric::ResourceEfficiency => self.resource_efficiency,
            GlobalMetric::IndividualAutonomy => self.individual_autonomy,
            GlobalMetric::CommunityWellbeing => self.community_wellbeing,
            GlobalMetric::TotalHappiness => self.total_happiness,
            GlobalMetric::PrivacyScore => self.privacy_score,
            GlobalMetric::FreedomIndex => self.freedom_index,
        }
    }

    fn get_mut(&mut self, metric: GlobalMetric) -> &mut f64 {
        match metric {
            GlobalMetric::SocialTrust => &mut self.social_trust,
            GlobalMetric::ResourceEfficiency => &mut self.resource_efficiency,
            GlobalMetric::IndividualAutonomy => &mut self.individual_autonomy,
            GlobalMetric::CommunityWellbeing => &mut self.community_wellbeing,
            GlobalMetric::TotalHappiness => &mut self.total_happiness,
            GlobalMetric::PrivacyScore => &mut self.privacy_score,
            GlobalMetric::FreedomIndex => &mut self.freedom_index,
        }
    }

    /// Add `delta` to `metric` without clamping.
    pub fn nudge(&mut self, metric: GlobalMetric, delta: f64) {
        *self.get_mut(metric) += delta;
    }

    /// Clamp every metric to `[0, 100]`; NaN becomes 0.
    pub fn clamp_all(&mut self) {
        for metric in GlobalMetric::ALL {
            let v = self.get_mut(metric);
            *v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
        }
    }

    /// Value by camelCase name.
    pub fn by_name(&self, name: &str) -> Option<f64> {
        GlobalMetric::from_name(name).map(|m| self.get(m))
    }

    /// Every metric with its value, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (GlobalMetric, f64)> + '_ {
        GlobalMetric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// `metric += (avg_satisfaction - baseline) * gain`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRule {
    /// Metric the rule moves.
    pub metric: GlobalMetric,
    /// Average satisfaction at which the rule is neutral.
    pub baseline: f64,
    /// Metric points per unit of satisfaction above the baseline.
    pub gain: f64,
}

const fn rule(metric: GlobalMetric, baseline: f64, gain: f64) -> MetricRule {
    MetricRule {
        metric,
        baseline,
        gain,
    }
}

const COMMUNITARIAN_RULES: [MetricRule; 3] = [
    rule(GlobalMetric::SocialTrust, 0.5, 3.0),
    rule(GlobalMetric::CommunityWellbeing, 0.5, 4.0),
    rule(GlobalMetric::IndividualAutonomy, 0.6, 2.0),
];

const UTILITARIAN_RULES: [MetricRule; 3] = [
    rule(GlobalMetric::TotalHappiness, 0.5, 4.0),
    rule(GlobalMetric::ResourceEfficiency, 0.5, 3.0),
    rule(GlobalMetric::PrivacyScore, 0.7, 2.0),
];

const EXISTENTIALIST_RULES: [MetricRule; 3] = [
    rule(GlobalMetric::IndividualAutonomy, 0.5, 4.0),
    rule(GlobalMetric::FreedomIndex, 0.5, 3.0),
    rule(GlobalMetric::CommunityWellbeing, 0.6, 1.5),
];

const DEONTOLOGICAL_RULES: [MetricRule; 3] = [
    rule(GlobalMetric::PrivacyScore, 0.5, 3.0),
    rule(GlobalMetric::FreedomIndex, 0.5, 3.0),
    rule(GlobalMetric::SocialTrust, 0.5, 2.5),
];

/// Linear update rules applied each step under `philosophy`.
pub fn metric_rules(philosophy: Philosophy) -> &'static [MetricRule] {
    match philosophy {
        Philosophy::Communitarianism => &COMMUNITARIAN_RULES,
        Philosophy::Utilitarianism => &UTILITARIAN_RULES,
        Philosophy::Existentialism => &EXISTENTIALIST_RULES,
        Philosophy::Deontology => &DEONTOLOGICAL_RULES,
    }
}

/// Full snapshot of a running simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    /// Set by the runner while the timer loop is active.
    pub is_running: bool,
    /// Steps taken so far.
    pub current_step: u64,
    /// Step budget.
    pub total_steps: u64,
    /// Id of the active scenario.
    pub selected_scenario: String,
    /// Creation order.
    pub agents: Vec<Agent>,
    /// Society-wide indicators.
    pub global_metrics: GlobalMetrics,
    /// Variable id -> current metrics.
    pub variable_state: BTreeMap<String, ParameterMetrics>,
}

impl SimulationState {
    /// Agent by id.
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Whether the step budget is used up.
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.total_steps
    }

    /// Mean of the scenario's success metrics; names that do not resolve are skipped.
    pub fn success_score(&self, scenario: &ScenarioConfig) -> Option<f64> {
        let values: Vec<f64> = scenario
            .success_metrics
            .iter()
            .filter_map(|name| self.global_metrics.by_name(name))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Partial overwrite for [`SimulationEngine::set_state`](crate::simulation::SimulationEngine::set_state).
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatePatch {
    pub is_running: Option<bool>,
    pub current_step: Option<u64>,
    pub total_steps: Option<u64>,
    pub selected_scenario: Option<String>,
    pub agents: Option<Vec<Agent>>,
    pub global_metrics: Option<GlobalMetrics>,
    pub variable_state: Option<BTreeMap<String, ParameterMetrics>>,
}

impl StatePatch {
    /// Patch that only sets `is_running`.
    pub fn running(is_running: bool) -> Self {
        Self {
            is_running: Some(is_running),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(self, state: &mut SimulationState) {
        if let Some(v) = self.is_running {
            state.is_running = v;
        }
        if let Some(v) = self.current_step {
            state.current_step = v;
        }
        if let Some(v) = self.total_steps {
            state.total_steps = v;
        }
        if let Some(v) = self.selected_scenario {
            state.selected_scenario = v;
        }
        if let Some(v) = self.agents {
            state.agents = v;
        }
        if let Some(v) = self.global_metrics {
            state.global_metrics = v;
        }
        if let Some(v) = self.variable_state {
            state.variable_state = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_roundtrip() {
        for m in GlobalMetric::ALL {
            assert_eq!(GlobalMetric::from_name(m.name()), Some(m));
            let json = serde_json::to_value(m).unwrap();
            assert_eq!(json, m.name());
        }
    }

    #[test]
    fn test_clamp_all() {
        let mut metrics = GlobalMetrics::default();
        metrics.nudge(GlobalMetric::SocialTrust, 80.0);
        metrics.nudge(GlobalMetric::PrivacyScore, -200.0);
        metrics.clamp_all();
        assert_eq!(metrics.social_trust, 100.0);
        assert_eq!(metrics.privacy_score, 0.0);
        assert_eq!(metrics.freedom_index, 70.0);
    }

    #[test]
    fn test_every_philosophy_has_rules() {
        for p in Philosophy::ALL {
            let rules = metric_rules(p);
            assert!((2..=3).contains(&rules.len()));
        }
    }

    #[test]
    fn test_global_metrics_serialize_camel_case() {
        let json = serde_json::to_value(GlobalMetrics::default()).unwrap();
        assert_eq!(json["socialTrust"], 65.0);
        assert_eq!(json["freedomIndex"], 70.0);
    }
}

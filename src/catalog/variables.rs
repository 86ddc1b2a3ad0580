//! Variables, dated parameters and their typed metric payloads.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Broad family a variable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableCategory {
    Technology,
    Resource,
    Psychology,
    Philosophy,
}

impl VariableCategory {
    /// Lowercase name used in catalog files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technology => "technology",
            Self::Resource => "resource",
            Self::Psychology => "psychology",
            Self::Philosophy => "philosophy",
        }
    }
}

/// A named simulation input (a technology, a psychological driver, a lens).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Stable key, e.g. `tech-ai`.
    pub id: String,
    /// Display name.
    pub name: String,
    pub category: VariableCategory,
    /// What the variable measures.
    pub description: String,
}

/// Metric values of one variable at one effective date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Stable key, e.g. `param-ai-2025`.
    pub id: String,
    /// Variable these metrics describe.
    pub variable_id: String,
    /// Date from which the metrics apply.
    pub effective_date: NaiveDate,
    pub metrics: ParameterMetrics,
    /// Where the numbers come from.
    pub source: String,
}

/// Relative dependency of a technology on each base resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<f64>,
}

/// Maturity and reach of a technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyMetrics {
    /// Technology readiness level, 1-9.
    pub trl: u8,
    /// Share of the population with practical access, in `[0, 1]`.
    pub accessibility: f64,
    /// Strength of the technology's effect on social life, in `[0, 1]`.
    pub social_impact: f64,
    #[serde(default)]
    pub resource_dependency: ResourceDependency,
}

/// Strength and current fulfilment of a psychological driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologyMetrics {
    /// Baseline strength of the need, in `[0, 1]`.
    pub base_value: f64,
    /// How well the need is currently met, in `[0, 1]`.
    pub satisfaction_level: f64,
    /// Technology variable id -> stimulus strength.
    #[serde(default)]
    pub tech_stimulus_map: BTreeMap<String, f64>,
}

/// Welfare-maximizing lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilitarianismMetrics {
    pub objective_function: String,
    /// Factor name -> weight.
    pub happiness_factors: BTreeMap<String, f64>,
}

/// Rule-based lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeontologyMetrics {
    /// Duties that must not be violated.
    pub constraints: Vec<String>,
    /// Penalty per violated constraint.
    pub penalty_factor: f64,
}

/// Choice-centred lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistentialismMetrics {
    pub objective_function: String,
    /// Quantities that reflect freedom of choice.
    pub choice_metrics: Vec<String>,
}

/// Relative weight of individual and community goods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceWeights {
    pub individual: f64,
    pub community: f64,
}

/// Community-centred lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitarianismMetrics {
    pub objective_function: String,
    pub balance_weights: BalanceWeights,
}

/// Metric payload of a [`Parameter`], one variant per variable family.
///
/// Resources have no fixed shape and carry an open numeric map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterMetrics {
    Technology(TechnologyMetrics),
    Psychology(PsychologyMetrics),
    Utilitarianism(UtilitarianismMetrics),
    Deontology(DeontologyMetrics),
    Existentialism(ExistentialismMetrics),
    Communitarianism(CommunitarianismMetrics),
    Resource(BTreeMap<String, f64>),
}

impl ParameterMetrics {
    /// The variable category this payload is valid for.
    pub fn category(&self) -> VariableCategory {
        match self {
            Self::Technology(_) => VariableCategory::Technology,
            Self::Psychology(_) => VariableCategory::Psychology,
            Self::Resource(_) => VariableCategory::Resource,
            Self::Utilitarianism(_)
            | Self::Deontology(_)
            | Self::Existentialism(_)
            | Self::Communitarianism(_) => VariableCategory::Philosophy,
        }
    }

    /// Technology accessibility, if these are technology metrics.
    pub fn accessibility(&self) -> Option<f64> {
        match self {
            Self::Technology(m) => Some(m.accessibility),
            _ => None,
        }
    }

    /// Technology social impact, if these are technology metrics.
    pub fn social_impact(&self) -> Option<f64> {
        match self {
            Self::Technology(m) => Some(m.social_impact),
            _ => None,
        }
    }

    /// How well the environment currently satisfies this driver, if the
    /// payload records it.
    pub fn satisfaction_level(&self) -> Option<f64> {
        match self {
            Self::Psychology(m) => Some(m.satisfaction_level),
            Self::Resource(m) => m.get("satisfaction_level").copied(),
            _ => None,
        }
    }
}

//! Read-only variable, parameter and scenario catalog.
//!
//! The engine and the persona service consult the catalog as fixed lookup
//! tables. Absent entries are returned as `None` and treated by callers as
//! "no modifier"; they are never errors.

pub mod scenarios;
pub mod variables;

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::utilities::errors::CatalogError;

pub use scenarios::{Philosophy, RuleValue, ScenarioConfig};
pub use variables::{
    BalanceWeights, CommunitarianismMetrics, DeontologyMetrics, ExistentialismMetrics,
    Parameter, ParameterMetrics, PsychologyMetrics, ResourceDependency, TechnologyMetrics,
    UtilitarianismMetrics, Variable, VariableCategory,
};

/// Scenario used when a requested id does not resolve.
pub const DEFAULT_SCENARIO_ID: &str = "empathic";

static BUILTIN_CATALOG: Lazy<Arc<Catalog>> = Lazy::new(|| Arc::new(Catalog::builtin_tables()));

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 31).unwrap_or_default()
}

/// Variables, their dated parameters and the scenario configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Date whose parameters count as "current".
    #[serde(default = "reference_date")]
    pub reference_date: NaiveDate,
    /// All known variables.
    pub variables: Vec<Variable>,
    /// Dated parameter sets, any order.
    pub parameters: Vec<Parameter>,
    /// Scenario definitions.
    pub scenarios: Vec<ScenarioConfig>,
}

impl Catalog {
    /// Shared handle to the built-in catalog.
    pub fn builtin() -> Arc<Catalog> {
        BUILTIN_CATALOG.clone()
    }

    /// Parse and validate a YAML catalog document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read, parse and validate a YAML catalog file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Check referential integrity: parameters point at known variables and
    /// scenarios point at philosophy/technology variables of the right kind.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for param in &self.parameters {
            if self.variable(&param.variable_id).is_none() {
                return Err(CatalogError::UnknownVariable {
                    parameter_id: param.id.clone(),
                    variable_id: param.variable_id.clone(),
                });
            }
        }
        for scenario in &self.scenarios {
            self.expect_category(
                &scenario.id,
                &scenario.dominant_philosophy,
                VariableCategory::Philosophy,
            )?;
            for tech in &scenario.key_technologies {
                self.expect_category(&scenario.id, tech, VariableCategory::Technology)?;
            }
        }
        Ok(())
    }

    fn expect_category(
        &self,
        scenario_id: &str,
        variable_id: &str,
        category: VariableCategory,
    ) -> Result<(), CatalogError> {
        match self.variable(variable_id) {
            Some(v) if v.category == category => Ok(()),
            _ => Err(CatalogError::InvalidScenarioReference {
                scenario_id: scenario_id.to_string(),
                variable_id: variable_id.to_string(),
                expected: category.as_str(),
            }),
        }
    }

    /// Variable by id.
    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    /// Variables of one category, in declaration order.
    pub fn variables_by_category(&self, category: VariableCategory) -> Vec<&Variable> {
        self.variables
            .iter()
            .filter(|v| v.category == category)
            .collect()
    }

    /// Parameter of `variable_id` effective at the reference date.
    pub fn parameter_by_variable_id(&self, variable_id: &str) -> Option<&Parameter> {
        self.parameter_at(variable_id, self.reference_date)
    }

    /// Parameter for `variable_id` effective exactly on `date`.
    pub fn parameter_at(&self, variable_id: &str, date: NaiveDate) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.variable_id == variable_id && p.effective_date == date)
    }

    /// Parameters effective on the reference date.
    pub fn all_current_parameters(&self) -> Vec<&Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.effective_date == self.reference_date)
            .collect()
    }

    /// Scenario by id.
    pub fn scenario(&self, id: &str) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Every scenario, in declaration order.
    pub fn all_scenarios(&self) -> &[ScenarioConfig] {
        &self.scenarios
    }

    fn builtin_tables() -> Self {
        Self {
            reference_date: reference_date(),
            variables: builtin_variables(),
            parameters: builtin_parameters(),
            scenarios: scenarios::builtin_scenarios(),
        }
    }
}

fn var(id: &str, name: &str, category: VariableCategory, description: &str) -> Variable {
    Variable {
        id: id.into(),
        name: name.into(),
        category,
        description: description.into(),
    }
}

fn builtin_variables() -> Vec<Variable> {
    use VariableCategory::*;
    vec![
        var("tech-ai", "AI", Technology, "Artificial Intelligence including LLM and AGI technologies"),
        var("tech-bci", "BCI", Technology, "Brain-Computer Interface technology"),
        var("tech-quantum", "Quantum Computing", Technology, "Quantum computing and quantum algorithms"),
        var("tech-blockchain", "Blockchain", Technology, "Decentralized and distributed ledger technologies"),
        var("tech-bioeng", "Bio-engineering", Technology, "Biotechnology and genetic engineering"),
        var("psych-connection", "Connection", Psychology, "Human need for social connection and belonging"),
        var("psych-growth", "Growth", Psychology, "Drive for personal growth and self-actualization"),
        var("psych-safety", "Safety", Psychology, "Need for security and control over environment"),
        var("psych-pleasure", "Pleasure", Psychology, "Pursuit of enjoyment and hedonic satisfaction"),
        var("phil-utilitarianism", "Utilitarianism", Philosophy, "Maximizing overall happiness and utility"),
        var("phil-deontology", "Deontology", Philosophy, "Duty-based ethics with universal moral rules"),
        var("phil-existentialism", "Existentialism", Philosophy, "Individual freedom and authentic choice"),
        var("phil-communitarianism", "Communitarianism", Philosophy, "Balance between individual and community wellbeing"),
    ]
}

fn param(id: &str, variable_id: &str, metrics: ParameterMetrics, source: &str) -> Parameter {
    Parameter {
        id: id.into(),
        variable_id: variable_id.into(),
        effective_date: reference_date(),
        metrics,
        source: source.into(),
    }
}

fn numeric_map(entries: &[(&str, f64)]) -> std::collections::BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn builtin_parameters() -> Vec<Parameter> {
    vec![
        param(
            "param-ai-2025",
            "tech-ai",
            ParameterMetrics::Technology(TechnologyMetrics {
                trl: 8,
                accessibility: 0.7,
                social_impact: 0.85,
                resource_dependency: ResourceDependency {
                    energy: Some(0.9),
                    compute: Some(1.0),
                    data: Some(0.95),
                },
            }),
            "Expert estimation based on current LLM capabilities",
        ),
        param(
            "param-bci-2025",
            "tech-bci",
            ParameterMetrics::Technology(TechnologyMetrics {
                trl: 6,
                accessibility: 0.3,
                social_impact: 0.6,
                resource_dependency: ResourceDependency {
                    energy: Some(0.6),
                    compute: Some(0.8),
                    data: None,
                },
            }),
            "BCI research progress",
        ),
        param(
            "param-connection-2025",
            "psych-connection",
            ParameterMetrics::Psychology(PsychologyMetrics {
                base_value: 0.8,
                satisfaction_level: 0.6,
                tech_stimulus_map: numeric_map(&[
                    ("tech-ai", 0.7),
                    ("tech-blockchain", 0.5),
                    ("tech-bci", 0.8),
                ]),
            }),
            "Social psychology research on human connection needs",
        ),
        param(
            "param-growth-2025",
            "psych-growth",
            ParameterMetrics::Psychology(PsychologyMetrics {
                base_value: 0.75,
                satisfaction_level: 0.55,
                tech_stimulus_map: numeric_map(&[
                    ("tech-ai", 0.8),
                    ("tech-bci", 0.9),
                    ("tech-bioeng", 0.85),
                ]),
            }),
            "Maslow hierarchy and self-actualization research",
        ),
        param(
            "param-util-2025",
            "phil-utilitarianism",
            ParameterMetrics::Utilitarianism(UtilitarianismMetrics {
                objective_function: "maximize(total_happiness)".into(),
                happiness_factors: numeric_map(&[
                    ("resource_equality", 0.6),
                    ("pleasure_satisfaction", 0.4),
                    ("safety_level", 0.5),
                    ("growth_fulfillment", 0.3),
                ]),
            }),
            "Bentham and Mill utilitarian ethics",
        ),
        param(
            "param-deont-2025",
            "phil-deontology",
            ParameterMetrics::Deontology(DeontologyMetrics {
                constraints: vec![
                    "privacy_score > 0.9".into(),
                    "freedom_index > 0.8".into(),
                    "human_dignity > 0.95".into(),
                ],
                penalty_factor: 0.5,
            }),
            "Kantian categorical imperative principles",
        ),
        param(
            "param-comm-2025",
            "phil-communitarianism",
            ParameterMetrics::Communitarianism(CommunitarianismMetrics {
                objective_function: "optimize(balance(individual_growth, community_wellbeing))"
                    .into(),
                balance_weights: BalanceWeights {
                    individual: 0.5,
                    community: 0.5,
                },
            }),
            "Communitarian philosophy research",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let catalog = Catalog::builtin();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.variables.len(), 13);
        assert_eq!(catalog.all_current_parameters().len(), 7);
        assert_eq!(catalog.all_scenarios().len(), 4);
        assert!(catalog.scenario(DEFAULT_SCENARIO_ID).is_some());
    }

    #[test]
    fn test_parameter_lookup_tolerates_absence() {
        let catalog = Catalog::builtin();
        let ai = catalog.parameter_by_variable_id("tech-ai").unwrap();
        assert_eq!(ai.metrics.social_impact(), Some(0.85));
        assert!(catalog.parameter_by_variable_id("tech-quantum").is_none());
        assert!(catalog.parameter_by_variable_id("nope").is_none());

        let other_date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert!(catalog.parameter_at("tech-ai", other_date).is_none());
    }

    #[test]
    fn test_variables_by_category() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.variables_by_category(VariableCategory::Technology).len(), 5);
        assert_eq!(catalog.variables_by_category(VariableCategory::Philosophy).len(), 4);
        assert!(catalog.variables_by_category(VariableCategory::Resource).is_empty());
    }

    #[test]
    fn test_yaml_rejects_dangling_parameter() {
        let yaml = r#"
variables:
  - { id: tech-x, name: X, category: technology, description: test }
parameters:
  - id: p1
    variable_id: tech-missing
    effective_date: 2025-08-31
    source: test
    metrics: { kind: technology, trl: 3, accessibility: 0.1, social_impact: 0.2 }
scenarios: []
"#;
        let err = Catalog::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownVariable { .. }));
    }

    #[test]
    fn test_yaml_file_roundtrip_of_builtin() {
        let yaml = serde_yaml::to_string(Catalog::builtin().as_ref()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let loaded = Catalog::from_yaml_file(file.path()).unwrap();
        assert_eq!(&loaded, Catalog::builtin().as_ref());
    }

    #[test]
    fn test_scenario_with_wrong_category_is_rejected() {
        let mut catalog = Catalog::builtin().as_ref().clone();
        catalog.scenarios[0].key_technologies.push("psych-growth".into());
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::InvalidScenarioReference { .. })
        ));
    }
}

//! Scenario configurations and the philosophical lenses that drive them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One of the four philosophy variables a scenario can be dominated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Philosophy {
    #[serde(rename = "phil-utilitarianism")]
    Utilitarianism,
    #[serde(rename = "phil-deontology")]
    Deontology,
    #[serde(rename = "phil-existentialism")]
    Existentialism,
    #[serde(rename = "phil-communitarianism")]
    Communitarianism,
}

impl Philosophy {
    /// The four lenses in catalog order.
    pub const ALL: [Philosophy; 4] = [
        Self::Utilitarianism,
        Self::Deontology,
        Self::Existentialism,
        Self::Communitarianism,
    ];

    /// Catalog variable id of this philosophy.
    pub fn variable_id(&self) -> &'static str {
        match self {
            Self::Utilitarianism => "phil-utilitarianism",
            Self::Deontology => "phil-deontology",
            Self::Existentialism => "phil-existentialism",
            Self::Communitarianism => "phil-communitarianism",
        }
    }

    /// Inverse of [`variable_id`](Self::variable_id).
    pub fn from_variable_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.variable_id() == id)
    }
}

/// A scenario global rule: either a numeric weight or a symbolic label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Weight(f64),
    Label(String),
}

impl RuleValue {
    /// Numeric value, or `None` for labels.
    pub fn as_weight(&self) -> Option<f64> {
        match self {
            Self::Weight(w) => Some(*w),
            Self::Label(_) => None,
        }
    }
}

/// Static description of one future society.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    /// Stable key, e.g. `"empathic"`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One-paragraph summary.
    pub description: String,
    /// Philosophy variable id.
    pub dominant_philosophy: String,
    /// Technology variable ids.
    pub key_technologies: Vec<String>,
    /// Named rule weights and labels.
    #[serde(default)]
    pub global_rules: BTreeMap<String, RuleValue>,
    /// Names of global metrics (camelCase) that define success.
    #[serde(default)]
    pub success_metrics: Vec<String>,
}

impl ScenarioConfig {
    /// Typed dominant philosophy; `None` for ids outside the four lenses.
    pub fn philosophy(&self) -> Option<Philosophy> {
        Philosophy::from_variable_id(&self.dominant_philosophy)
    }

    /// Numeric weight of a global rule.
    pub fn rule_weight(&self, name: &str) -> Option<f64> {
        self.global_rules.get(name).and_then(RuleValue::as_weight)
    }
}

fn rules(entries: &[(&str, RuleValue)]) -> BTreeMap<String, RuleValue> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The four built-in scenarios.
pub(crate) fn builtin_scenarios() -> Vec<ScenarioConfig> {
    use RuleValue::{Label, Weight};
    vec![
        ScenarioConfig {
            id: "empathic".into(),
            name: "Empathic Renaissance".into(),
            description: "Affective computing and decentralized social platforms drive a community-centred society".into(),
            dominant_philosophy: Philosophy::Communitarianism.variable_id().into(),
            key_technologies: strings(&["tech-ai", "tech-blockchain"]),
            global_rules: rules(&[
                ("community_weight", Weight(0.7)),
                ("individual_weight", Weight(0.5)),
                ("trust_requirement", Weight(0.8)),
                ("empathy_amplification", Weight(1.2)),
            ]),
            success_metrics: strings(&["socialTrust", "communityWellbeing", "resourceEfficiency"]),
        },
        ScenarioConfig {
            id: "optimized".into(),
            name: "Optimized Society".into(),
            description: "A centralized super-scale AI manages an efficiency-first society".into(),
            dominant_philosophy: Philosophy::Utilitarianism.variable_id().into(),
            key_technologies: strings(&["tech-ai", "tech-quantum"]),
            global_rules: rules(&[
                ("efficiency_priority", Weight(0.9)),
                ("centralized_control", Weight(0.8)),
                ("optimization_target", Label("total_happiness".into())),
                ("individual_privacy", Weight(0.4)),
            ]),
            success_metrics: strings(&["resourceEfficiency", "totalHappiness", "socialTrust"]),
        },
        ScenarioConfig {
            id: "sovereign".into(),
            name: "Sovereign Individual".into(),
            description: "Decentralized AI and zero-knowledge proofs maximize individual autonomy".into(),
            dominant_philosophy: Philosophy::Existentialism.variable_id().into(),
            key_technologies: strings(&["tech-blockchain", "tech-bci"]),
            global_rules: rules(&[
                ("individual_sovereignty", Weight(0.9)),
                ("decentralization_level", Weight(0.8)),
                ("privacy_protection", Weight(0.95)),
                ("community_support", Weight(0.3)),
            ]),
            success_metrics: strings(&["individualAutonomy", "freedomIndex", "privacyScore"]),
        },
        ScenarioConfig {
            id: "duty".into(),
            name: "Duty-Based Society".into(),
            description: "Universal moral rules and human dignity take precedence over efficiency".into(),
            dominant_philosophy: Philosophy::Deontology.variable_id().into(),
            key_technologies: strings(&["tech-ai", "tech-bioeng"]),
            global_rules: rules(&[
                ("moral_constraints", Weight(0.95)),
                ("human_dignity_protection", Weight(0.98)),
                ("rule_compliance", Weight(0.9)),
                ("efficiency_sacrifice", Weight(0.7)),
            ]),
            success_metrics: strings(&["privacyScore", "freedomIndex", "communityWellbeing"]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_philosophy_ids_roundtrip() {
        for p in Philosophy::ALL {
            assert_eq!(Philosophy::from_variable_id(p.variable_id()), Some(p));
        }
        assert_eq!(Philosophy::from_variable_id("phil-stoicism"), None);
    }

    #[test]
    fn test_builtin_scenarios_have_known_philosophies() {
        let scenarios = builtin_scenarios();
        assert_eq!(scenarios.len(), 4);
        for s in &scenarios {
            assert!(s.philosophy().is_some(), "{} has unknown philosophy", s.id);
            assert!(!s.success_metrics.is_empty());
        }
    }

    #[test]
    fn test_rule_weight_skips_labels() {
        let optimized = builtin_scenarios()
            .into_iter()
            .find(|s| s.id == "optimized")
            .unwrap();
        assert_eq!(optimized.rule_weight("efficiency_priority"), Some(0.9));
        assert_eq!(optimized.rule_weight("optimization_target"), None);
        assert_eq!(optimized.rule_weight("missing"), None);
    }
}

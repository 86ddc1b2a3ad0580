//! UPDM persona profile: Big Five personality traits and Schwartz values.
//!
//! Every score lives in `[0, 1]`; all mutation goes through
//! [`Updm::apply_trait_delta`] / [`Updm::apply_value_delta`], which clamp.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five personality traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalityTrait {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
}

impl PersonalityTrait {
    /// Every trait, in profile order.
    pub const ALL: [PersonalityTrait; 5] = [
        Self::Openness,
        Self::Conscientiousness,
        Self::Extraversion,
        Self::Agreeableness,
        Self::Neuroticism,
    ];

    /// snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openness => "openness",
            Self::Conscientiousness => "conscientiousness",
            Self::Extraversion => "extraversion",
            Self::Agreeableness => "agreeableness",
            Self::Neuroticism => "neuroticism",
        }
    }
}

impl fmt::Display for PersonalityTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ten Schwartz basic values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchwartzValue {
    SelfDirection,
    Stimulation,
    Hedonism,
    Achievement,
    Power,
    Security,
    Conformity,
    Tradition,
    Benevolence,
    Universalism,
}

impl SchwartzValue {
    /// Every value, in profile order.
    pub const ALL: [SchwartzValue; 10] = [
        Self::SelfDirection,
        Self::Stimulation,
        Self::Hedonism,
        Self::Achievement,
        Self::Power,
        Self::Security,
        Self::Conformity,
        Self::Tradition,
        Self::Benevolence,
        Self::Universalism,
    ];

    /// snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfDirection => "self_direction",
            Self::Stimulation => "stimulation",
            Self::Hedonism => "hedonism",
            Self::Achievement => "achievement",
            Self::Power => "power",
            Self::Security => "security",
            Self::Conformity => "conformity",
            Self::Tradition => "tradition",
            Self::Benevolence => "benevolence",
            Self::Universalism => "universalism",
        }
    }
}

impl fmt::Display for SchwartzValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation that justified a trait score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    /// Source event id, or `init` for generated scores.
    pub event_id: String,
    /// Why the score moved.
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A trait score with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    /// In `[0, 1]`.
    pub score: f64,
    /// Append-only.
    #[serde(default)]
    pub evidence_snippets: Vec<EvidenceSnippet>,
}

impl TraitScore {
    /// Score clamped to `[0, 1]` with no evidence.
    pub fn new(score: f64) -> Self {
        Self {
            score: clamp_unit(score),
            evidence_snippets: Vec::new(),
        }
    }
}

/// Big Five scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub openness: TraitScore,
    pub conscientiousness: TraitScore,
    pub extraversion: TraitScore,
    pub agreeableness: TraitScore,
    pub neuroticism: TraitScore,
}

impl PersonalityTraits {
    /// Score entry for `t`.
    pub fn get(&self, t: PersonalityTrait) -> &TraitScore {
        match t {
            PersonalityTrait::Openness => &self.openness,
            PersonalityTrait::Conscientiousness => &self.conscientiousness,
            PersonalityTrait::Extraversion => &self.extraversion,
            PersonalityTrait::Agreeableness => &self.agreeableness,
            PersonalityTrait::Neuroticism => &self.neuroticism,
        }
    }

    fn get_mut(&mut self, t: PersonalityTrait) -> &mut TraitScore {
        match t {
            PersonalityTrait::Openness => &mut self.openness,
            PersonalityTrait::Conscientiousness => &mut self.conscientiousness,
            PersonalityTrait::Extraversion => &mut self.extraversion,
            PersonalityTrait::Agreeableness => &mut self.agreeableness,
            PersonalityTrait::Neuroticism => &mut self.neuroticism,
        }
    }

    /// Bare score for `t`.
    pub fn score(&self, t: PersonalityTrait) -> f64 {
        self.get(t).score
    }
}

/// Schwartz value weights, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSystem {
    pub self_direction: f64,
    pub stimulation: f64,
    pub hedonism: f64,
    pub achievement: f64,
    pub power: f64,
    pub security: f64,
    pub conformity: f64,
    pub tradition: f64,
    pub benevolence: f64,
    pub universalism: f64,
}

impl ValueSystem {
    /// Weight of `v`.
    pub fn get(&self, v: SchwartzValue) -> f64 {
        match v {
            SchwartzValue::SelfDirection => self.self_direction,
            SchwartzValue::Stimulation => self.stimulation,
            SchwartzValue::Hedonism => self.hedonism,
            SchwartzValue::Achievement => self.achievement,
            SchwartzValue::Power => self.power,
            SchwartzValue::Security => self.security,
            SchwartzValue::Conformity => self.conformity,
            SchwartzValue::Tradition => self.tradition,
            SchwartzValue::Benevolence => self.benevolence,
            SchwartzValue::Universalism => self.universalism,
        }
    }

    fn get_mut(&mut self, v: SchwartzValue) -> &mut f64 {
        match v {
            SchwartzValue::SelfDirection => &mut self.self_direction,
            SchwartzValue::Stimulation => &mut self.stimulation,
            SchwartzValue::Hedonism => &mut self.hedonism,
            SchwartzValue::Achievement => &mut self.achievement,
            SchwartzValue::Power => &mut self.power,
            SchwartzValue::Security => &mut self.security,
            SchwartzValue::Conformity => &mut self.conformity,
            SchwartzValue::Tradition => &mut self.tradition,
            SchwartzValue::Benevolence => &mut self.benevolence,
            SchwartzValue::Universalism => &mut self.universalism,
        }
    }

    /// Every value with its weight, in profile order.
    pub fn iter(&self) -> impl Iterator<Item = (SchwartzValue, f64)> + '_ {
        SchwartzValue::ALL.into_iter().map(move |v| (v, self.get(v)))
    }
}

/// Persona profile of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Updm {
    /// Owner id; equals the agent id in the simulation.
    pub user_id: String,
    /// Profile schema version.
    pub schema_version: String,
    /// Time of the last score change.
    pub last_updated: DateTime<Utc>,
    /// Where the profile data came from.
    pub data_sources: Vec<String>,
    #[serde(rename = "personality_traits")]
    pub personality_traits: PersonalityTraits,
    #[serde(rename = "value_system")]
    pub value_system: ValueSystem,
    #[serde(rename = "application_specific_data", default)]
    pub application_specific_data: BTreeMap<String, serde_json::Value>,
}

impl Updm {
    /// Schema version written by [`Updm::generate`].
    pub const SCHEMA_VERSION: &'static str = "1.0";

    /// Build a profile whose 15 scores are drawn from `draw`, in trait order
    /// then value order. Each trait gets one initialization snippet.
    pub fn generate(user_id: impl Into<String>, mut draw: impl FnMut() -> f64) -> Self {
        let now = Utc::now();
        let mut next_trait = || {
            let mut score = TraitScore::new(draw());
            score.evidence_snippets.push(EvidenceSnippet {
                event_id: "init".to_string(),
                text: "Trait generated at simulation initialization".to_string(),
                timestamp: now,
            });
            score
        };
        let personality_traits = PersonalityTraits {
            openness: next_trait(),
            conscientiousness: next_trait(),
            extraversion: next_trait(),
            agreeableness: next_trait(),
            neuroticism: next_trait(),
        };
        let mut next_value = || clamp_unit(draw());
        let value_system = ValueSystem {
            self_direction: next_value(),
            stimulation: next_value(),
            hedonism: next_value(),
            achievement: next_value(),
            power: next_value(),
            security: next_value(),
            conformity: next_value(),
            tradition: next_value(),
            benevolence: next_value(),
            universalism: next_value(),
        };

        let mut application_specific_data = BTreeMap::new();
        application_specific_data.insert(
            "simulation_context".to_string(),
            serde_json::Value::String("social_future_modeling".to_string()),
        );

        Self {
            user_id: user_id.into(),
            schema_version: Self::SCHEMA_VERSION.to_string(),
            last_updated: now,
            data_sources: vec!["simulation_initialization".to_string()],
            personality_traits,
            value_system,
            application_specific_data,
        }
    }

    /// Shift a trait score, clamped to `[0, 1]`, and record why.
    pub fn apply_trait_delta(&mut self, t: PersonalityTrait, delta: f64, evidence: EvidenceSnippet) {
        let entry = self.personality_traits.get_mut(t);
        entry.score = clamp_unit(entry.score + delta);
        self.last_updated = evidence.timestamp;
        entry.evidence_snippets.push(evidence);
    }

    /// Shift a value score, clamped to `[0, 1]`.
    pub fn apply_value_delta(&mut self, v: SchwartzValue, delta: f64) {
        let entry = self.value_system.get_mut(v);
        *entry = clamp_unit(*entry + delta);
        self.last_updated = Utc::now();
    }

    /// Weighted personality contribution to satisfaction; neuroticism counts inverted.
    pub fn personality_satisfaction(&self) -> f64 {
        let t = &self.personality_traits;
        t.openness.score * 0.2
            + t.conscientiousness.score * 0.2
            + t.extraversion.score * 0.15
            + t.agreeableness.score * 0.25
            + (1.0 - t.neuroticism.score) * 0.2
    }

    /// Iterate every trait and value score.
    pub fn all_scores(&self) -> impl Iterator<Item = f64> + '_ {
        PersonalityTrait::ALL
            .into_iter()
            .map(move |t| self.personality_traits.score(t))
            .chain(self.value_system.iter().map(|(_, v)| v))
    }
}

pub(crate) fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet() -> EvidenceSnippet {
        EvidenceSnippet {
            event_id: "e1".into(),
            text: "test".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_generate_clamps_draws() {
        let mut draws = [1.7, -0.2, 0.5].into_iter().cycle();
        let updm = Updm::generate("agent-1", || draws.next().unwrap());
        assert!(updm.all_scores().all(|s| (0.0..=1.0).contains(&s)));
        assert_eq!(updm.personality_traits.openness.score, 1.0);
        assert_eq!(updm.personality_traits.conscientiousness.score, 0.0);
        assert_eq!(updm.personality_traits.openness.evidence_snippets.len(), 1);
        assert_eq!(updm.all_scores().count(), 15);
    }

    #[test]
    fn test_trait_delta_clamps_and_records_evidence() {
        let mut updm = Updm::generate("agent-1", || 0.99);
        updm.apply_trait_delta(PersonalityTrait::Agreeableness, 0.5, snippet());
        assert_eq!(updm.personality_traits.agreeableness.score, 1.0);
        assert_eq!(updm.personality_traits.agreeableness.evidence_snippets.len(), 2);

        updm.apply_value_delta(SchwartzValue::Power, -3.0);
        assert_eq!(updm.value_system.power, 0.0);
    }

    #[test]
    fn test_personality_satisfaction_weights() {
        let updm = Updm::generate("agent-1", || 1.0);
        // All traits at 1.0: neuroticism contributes nothing.
        assert!((updm.personality_satisfaction() - 0.8).abs() < 1e-9);

        let updm = Updm::generate("agent-2", || 0.0);
        assert!((updm.personality_satisfaction() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_value_names_are_snake_case() {
        let json = serde_json::to_value(SchwartzValue::SelfDirection).unwrap();
        assert_eq!(json, "self_direction");
        assert_eq!(SchwartzValue::SelfDirection.as_str(), "self_direction");
    }
}

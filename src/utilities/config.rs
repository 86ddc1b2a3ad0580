//! Runtime configuration for the simulation core.
//!
//! Defaults reproduce the fixed constants of the simulation (24 agents,
//! 100 steps, 1000-message bus history trimmed in batches of 100, 0.3
//! confidence threshold). Overrides come from environment variables or a
//! YAML document.

use serde::{Deserialize, Serialize};

use crate::utilities::errors::ConfigError;

/// Configuration shared by the engine, the event bus and the persona service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of agents generated per scenario reset.
    pub agent_count: usize,
    /// Step budget; `step()` is a no-op once reached.
    pub total_steps: u64,
    /// Seed for the engine RNG. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Interval of the timer-driven runner, in milliseconds.
    pub tick_interval_ms: u64,
    /// Scenario used when none is given, and as fallback for unknown ids.
    pub default_scenario: String,
    /// Event bus history size that triggers a batched eviction. Also bounds
    /// the persona service's queue of unapplied updates in the runner.
    pub history_capacity: usize,
    /// Number of messages an eviction frees below `history_capacity`.
    pub eviction_batch: usize,
    /// Persona updates with lower confidence are dropped.
    pub confidence_threshold: f64,
    /// Probability per agent per step that the default hook emits an event.
    pub event_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            agent_count: 24,
            total_steps: 100,
            seed: None,
            tick_interval_ms: 300,
            default_scenario: "empathic".to_string(),
            history_capacity: 1000,
            eviction_batch: 100,
            confidence_threshold: 0.3,
            event_rate: 0.15,
        }
    }
}

impl SimulationConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Recognized keys: `DEEP_DIVE_AGENTS`, `DEEP_DIVE_STEPS`,
    /// `DEEP_DIVE_SEED`, `DEEP_DIVE_TICK_MS`, `DEEP_DIVE_SCENARIO`,
    /// `DEEP_DIVE_EVENT_RATE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = env_parse::<usize>("DEEP_DIVE_AGENTS")? {
            config.agent_count = v;
        }
        if let Some(v) = env_parse::<u64>("DEEP_DIVE_STEPS")? {
            config.total_steps = v;
        }
        if let Some(v) = env_parse::<u64>("DEEP_DIVE_SEED")? {
            config.seed = Some(v);
        }
        if let Some(v) = env_parse::<u64>("DEEP_DIVE_TICK_MS")? {
            config.tick_interval_ms = v;
        }
        if let Ok(v) = std::env::var("DEEP_DIVE_SCENARIO") {
            if !v.trim().is_empty() {
                config.default_scenario = v.trim().to_string();
            }
        }
        if let Some(v) = env_parse::<f64>("DEEP_DIVE_EVENT_RATE")? {
            config.event_rate = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting lies in its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eviction_batch == 0 || self.eviction_batch >= self.history_capacity {
            return Err(ConfigError::OutOfRange {
                message: format!(
                    "eviction_batch ({}) must be in 1..history_capacity ({})",
                    self.eviction_batch, self.history_capacity
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::OutOfRange {
                message: format!(
                    "confidence_threshold {} is outside [0, 1]",
                    self.confidence_threshold
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.event_rate) {
            return Err(ConfigError::OutOfRange {
                message: format!("event_rate {} is outside [0, 1]", self.event_rate),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                message: "tick_interval_ms must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_simulation_constants() {
        let c = SimulationConfig::default();
        assert_eq!(c.agent_count, 24);
        assert_eq!(c.total_steps, 100);
        assert_eq!(c.history_capacity, 1000);
        assert_eq!(c.eviction_batch, 100);
        assert!((c.confidence_threshold - 0.3).abs() < f64::EPSILON);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let c = SimulationConfig::from_yaml_str("agent_count: 8\nseed: 42\n").unwrap();
        assert_eq!(c.agent_count, 8);
        assert_eq!(c.seed, Some(42));
        assert_eq!(c.total_steps, 100);
        assert_eq!(c.default_scenario, "empathic");
    }

    #[test]
    fn test_rejects_batch_not_below_capacity() {
        let err = SimulationConfig::from_yaml_str("history_capacity: 50\neviction_batch: 50\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_rejects_event_rate_above_one() {
        let c = SimulationConfig {
            event_rate: 1.5,
            ..SimulationConfig::default()
        };
        assert!(c.validate().is_err());
    }
}

//! Error types for the simulation core.
//!
//! Missing catalog lookups are not errors; they surface as `Option`s and the
//! engine substitutes defaults. The types here cover malformed input only.

use thiserror::Error;

/// Errors raised while loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog document could not be parsed.
    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The catalog file could not be read.
    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parameter references a variable that does not exist.
    #[error("Parameter {parameter_id} references unknown variable {variable_id}")]
    UnknownVariable {
        parameter_id: String,
        variable_id: String,
    },

    /// A scenario references a variable that does not exist or has the wrong category.
    #[error("Scenario {scenario_id} references invalid {expected} variable {variable_id}")]
    InvalidScenarioReference {
        scenario_id: String,
        variable_id: String,
        expected: &'static str,
    },
}

/// Errors raised while building a [`SimulationConfig`](crate::utilities::config::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    /// A setting is outside its accepted range.
    #[error("Invalid configuration: {message}")]
    OutOfRange { message: String },

    /// The configuration document could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors raised while interpreting a simulation event as a persona update.
#[derive(Debug, Error)]
pub enum PersonaUpdateError {
    /// The event magnitude is not a finite value in `[0, 1]`.
    #[error("Event {event_id} has invalid magnitude {magnitude}")]
    InvalidMagnitude { event_id: String, magnitude: f64 },
}

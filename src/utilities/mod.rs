//! Shared configuration and error types.

pub mod config;
pub mod errors;

pub use config::SimulationConfig;
pub use errors::{CatalogError, ConfigError, PersonaUpdateError};

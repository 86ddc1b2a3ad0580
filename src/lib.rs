//! # Deep Dive
//!
//! Simulation core for modelling future societies. A population of agents,
//! each carrying a psychometric profile (UPDM), evolves step by step under
//! one of four philosophical scenarios. Agent events travel over a
//! topic-based bus; the persona update service turns them into small,
//! confidence-gated shifts of the agents' traits and values.
//!
//! - [`catalog`]: variables, dated parameters and scenario definitions
//! - [`events`]: simulation events and the in-process event bus
//! - [`persona`]: the UPDM profile and the persona update service
//! - [`simulation`]: agents, global metrics and the stepping engine
//! - [`utilities`]: configuration and error types

pub mod catalog;
pub mod events;
pub mod persona;
pub mod simulation;
pub mod utilities;

pub use catalog::{Catalog, Philosophy, ScenarioConfig};
pub use events::{EventBus, EventBusMessage, SimulationEvent};
pub use persona::{PersonaUpdateResult, PersonaUpdateService, Updm};
pub use simulation::{Agent, SatisfactionEventPolicy, SimulationEngine, SimulationState};
pub use utilities::{CatalogError, ConfigError, PersonaUpdateError, SimulationConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

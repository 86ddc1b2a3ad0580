//! Agent population, per-step dynamics and the state they produce.

pub mod agent;
pub mod engine;
pub mod hooks;
pub mod state;

pub use agent::{Agent, AgentEvent, AgentStatus, AgentType, Position, BASE_RESOURCES};
pub use engine::SimulationEngine;
pub use hooks::{AgentEventHook, AgentStepContext, SatisfactionEventPolicy};
pub use state::{metric_rules, GlobalMetric, GlobalMetrics, MetricRule, SimulationState, StatePatch};

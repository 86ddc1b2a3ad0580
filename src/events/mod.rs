//! Event infrastructure: simulation events, bus envelopes and the topic bus.
//!
//! Producers and consumers agree on topic names out of band; the two topics
//! the simulation core uses are exported as constants.

pub mod event_bus;
pub mod simulation_event;

pub use event_bus::{
    BusStatistics, EventBus, MessageHandler, Subscription, TopicSubscribers, DEFAULT_TOPIC_LIMIT,
};
pub use simulation_event::{EventBusMessage, EventOutcome, EventType, SimulationEvent};

/// Raw per-agent simulation events.
pub const SIMULATION_EVENTS_TOPIC: &str = "simulation-events";

/// Derived notifications published after a persona update.
pub const PERSONA_UPDATES_TOPIC: &str = "persona-updates";

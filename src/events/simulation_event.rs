//! Simulation events and the envelope the bus wraps them in.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of social fact an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PolicySupport,
    TechnologyAdoption,
    SocialInteraction,
    ResourceAllocation,
    ConflictResolution,
    CommunityParticipation,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 6] = [
        Self::PolicySupport,
        Self::TechnologyAdoption,
        Self::SocialInteraction,
        Self::ResourceAllocation,
        Self::ConflictResolution,
        Self::CommunityParticipation,
    ];

    /// snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicySupport => "policy_support",
            Self::TechnologyAdoption => "technology_adoption",
            Self::SocialInteraction => "social_interaction",
            Self::ResourceAllocation => "resource_allocation",
            Self::ConflictResolution => "conflict_resolution",
            Self::CommunityParticipation => "community_participation",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an event turned out for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Positive,
    Negative,
    Neutral,
}

/// An immutable fact observed during the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// `evt-<uuid>` unless set by the producer.
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    /// Selects the persona impact table.
    pub event_type: EventType,
    /// Free text; policy impacts key off its wording.
    pub details: String,
    /// Labels; each one raises update confidence.
    #[serde(default)]
    pub impact_tags: Vec<String>,
    /// Other agents involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    /// `None` scales impacts like a neutral outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EventOutcome>,
    /// Impact strength in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f64>,
}

impl SimulationEvent {
    /// New event stamped now, with a fresh id and no tags.
    pub fn new(event_type: EventType, details: impl Into<String>) -> Self {
        Self {
            event_id: format!("evt-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            event_type,
            details: details.into(),
            impact_tags: Vec::new(),
            participants: None,
            outcome: None,
            magnitude: None,
        }
    }

    /// Set the outcome.
    pub fn with_outcome(mut self, outcome: EventOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Set the magnitude, expected in `[0, 1]`.
    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    /// Append impact tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.impact_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set the participants.
    pub fn with_participants(mut self, participants: Vec<String>) -> Self {
        self.participants = Some(participants);
        self
    }
}

/// Envelope created by [`EventBus::publish`](crate::events::EventBus::publish).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBusMessage {
    /// `msg-<uuid>`.
    pub message_id: String,
    /// Topic the message was published on.
    pub topic: String,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
    /// Agent the event is about.
    pub agent_id: String,
    /// The wrapped event.
    pub event: SimulationEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

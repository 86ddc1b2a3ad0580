//! Agents: the units of the simulation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::Updm;

/// Kind of actor an agent represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Individual,
    Community,
    Institution,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Transitioning,
}

/// Screen coordinates; owned by the rendering layer after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One entry of an agent's life log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Id of the originating event.
    pub id: String,
    /// Agent that acted.
    pub agent_id: String,
    /// Event type name.
    pub action: String,
    /// Event details.
    pub context: String,
    /// Named effect sizes, e.g. `magnitude`.
    #[serde(default)]
    pub impact_metrics: BTreeMap<String, f64>,
    /// Why the agent acted.
    pub philosophical_reasoning: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Other agents involved.
    #[serde(default)]
    pub affected_agents: Vec<String>,
}

/// Resource names every agent starts with.
pub const BASE_RESOURCES: [&str; 3] = ["energy", "compute", "data"];

/// One simulated member of society.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// `agent-<n>`, unique within a run.
    pub id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    /// Initial layout position.
    pub position: Position,
    /// Psychometric profile.
    pub updm: Updm,
    /// Philosophy variable id, fixed at creation.
    pub philosophical_alignment: String,
    /// Resource name -> amount in `[0, 100]`.
    pub resources: BTreeMap<String, f64>,
    /// Ids of connected agents. Kept symmetric by the engine.
    pub connections: BTreeSet<String>,
    /// Lifecycle state; always active in the current model.
    pub status: AgentStatus,
    /// Append-only.
    pub life_log: Vec<AgentEvent>,
    /// Recomputed every step, in `[0, 1]`.
    pub satisfaction_level: f64,
    /// Peer id -> influence weight. Reserved for the presentation layer.
    #[serde(default)]
    pub influence_network: BTreeMap<String, f64>,
}

impl Agent {
    /// Whether a link to `other_id` exists.
    pub fn is_connected_to(&self, other_id: &str) -> bool {
        self.connections.contains(other_id)
    }

    /// Number of linked agents.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Name and amount of the scarcest resource.
    pub fn scarcest_resource(&self) -> Option<(&str, f64)> {
        self.resources
            .iter()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, amount)| (name.as_str(), *amount))
    }
}

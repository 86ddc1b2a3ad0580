//! Per-agent event production during a step.
//!
//! The engine asks its hook once per agent per step whether that agent
//! produced a [`SimulationEvent`]; produced events are logged on the agent
//! and published on the bus. Trigger policy lives entirely in the hook.

use rand::rngs::StdRng;
use rand::Rng;

use crate::catalog::{Philosophy, ScenarioConfig};
use crate::events::{EventOutcome, EventType, SimulationEvent};
use crate::simulation::agent::{Agent, AgentType};

/// What a hook sees about one agent in one step.
#[derive(Debug, Clone, Copy)]
pub struct AgentStepContext<'a> {
    /// Agent being stepped.
    pub agent: &'a Agent,
    /// Active scenario.
    pub scenario: &'a ScenarioConfig,
    /// Step being executed (before increment).
    pub step: u64,
    /// Partner id if the agent formed a connection earlier in this step.
    pub formed_connection: Option<&'a str>,
}

/// Produces at most one event per agent per step.
pub trait AgentEventHook: Send {
    /// Return the event `ctx.agent` produced this step, if any.
    fn on_agent_step(
        &mut self,
        ctx: &AgentStepContext<'_>,
        rng: &mut StdRng,
    ) -> Option<SimulationEvent>;
}

impl<F> AgentEventHook for F
where
    F: FnMut(&AgentStepContext<'_>, &mut StdRng) -> Option<SimulationEvent> + Send,
{
    fn on_agent_step(
        &mut self,
        ctx: &AgentStepContext<'_>,
        rng: &mut StdRng,
    ) -> Option<SimulationEvent> {
        self(ctx, rng)
    }
}

/// Default hook: with probability `event_rate`, emit an event whose type
/// follows the agent's situation and the scenario's philosophy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatisfactionEventPolicy {
    /// Emission probability per agent per step, in `[0, 1]`.
    pub event_rate: f64,
}

impl Default for SatisfactionEventPolicy {
    fn default() -> Self {
        Self { event_rate: 0.15 }
    }
}

/// Resources below this amount count as scarce.
const SCARCITY_LEVEL: f64 = 20.0;

impl SatisfactionEventPolicy {
    /// Policy with `event_rate` clamped to `[0, 1]`.
    pub fn new(event_rate: f64) -> Self {
        Self {
            event_rate: event_rate.clamp(0.0, 1.0),
        }
    }

    fn choose_type(ctx: &AgentStepContext<'_>) -> EventType {
        let agent = ctx.agent;
        if ctx.formed_connection.is_some() {
            return EventType::SocialInteraction;
        }
        if agent.satisfaction_level < 0.4 {
            return EventType::ConflictResolution;
        }
        if agent.agent_type == AgentType::Community {
            return EventType::CommunityParticipation;
        }
        if matches!(agent.scarcest_resource(), Some((_, amount)) if amount < SCARCITY_LEVEL) {
            return EventType::ResourceAllocation;
        }
        match ctx.scenario.philosophy() {
            Some(Philosophy::Communitarianism) => EventType::CommunityParticipation,
            Some(Philosophy::Utilitarianism) => EventType::TechnologyAdoption,
            Some(Philosophy::Deontology) => EventType::PolicySupport,
            Some(Philosophy::Existentialism) | None => EventType::SocialInteraction,
        }
    }

    fn describe(event_type: EventType, ctx: &AgentStepContext<'_>, rng: &mut StdRng) -> String {
        let agent = ctx.agent;
        match event_type {
            EventType::SocialInteraction => match ctx.formed_connection {
                Some(partner) => format!("{} reached out to {}", agent.id, partner),
                None => format!("{} exchanged views with its network", agent.id),
            },
            EventType::ConflictResolution => {
                format!("{} mediated a dispute within its network", agent.id)
            }
            EventType::CommunityParticipation => {
                format!("{} took part in a community assembly", agent.id)
            }
            EventType::ResourceAllocation => {
                let resource = agent.scarcest_resource().map_or("resources", |(name, _)| name);
                format!("{} requested a share of pooled {}", agent.id, resource)
            }
            EventType::TechnologyAdoption => {
                let techs = &ctx.scenario.key_technologies;
                let tech = if techs.is_empty() {
                    "new tooling"
                } else {
                    techs[rng.gen_range(0..techs.len())].as_str()
                };
                format!("{} adopted {}", agent.id, tech)
            }
            EventType::PolicySupport => {
                if rng.gen_bool(0.5) {
                    format!("{} endorsed a universal equality charter", agent.id)
                } else {
                    format!("{} endorsed a public safety and security act", agent.id)
                }
            }
        }
    }
}

impl AgentEventHook for SatisfactionEventPolicy {
    fn on_agent_step(
        &mut self,
        ctx: &AgentStepContext<'_>,
        rng: &mut StdRng,
    ) -> Option<SimulationEvent> {
        let rate = if self.event_rate.is_finite() {
            self.event_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if !rng.gen_bool(rate) {
            return None;
        }

        let event_type = Self::choose_type(ctx);
        let details = Self::describe(event_type, ctx, rng);
        let satisfaction = ctx.agent.satisfaction_level;
        let outcome = if satisfaction >= 0.6 {
            EventOutcome::Positive
        } else if satisfaction < 0.4 {
            EventOutcome::Negative
        } else {
            EventOutcome::Neutral
        };
        let alignment = ctx
            .agent
            .philosophical_alignment
            .trim_start_matches("phil-")
            .to_string();

        let mut event = SimulationEvent::new(event_type, details)
            .with_outcome(outcome)
            .with_magnitude(rng.gen_range(0.3..=1.0))
            .with_tags([alignment, event_type.as_str().to_string()]);
        if let Some(partner) = ctx.formed_connection {
            event = event.with_participants(vec![ctx.agent.id.clone(), partner.to_string()]);
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::persona::Updm;
    use crate::simulation::agent::{AgentStatus, Position};
    use rand::SeedableRng;
    use std::collections::{BTreeMap, BTreeSet};

    fn agent(satisfaction: f64, agent_type: AgentType) -> Agent {
        Agent {
            id: "agent-1".into(),
            agent_type,
            position: Position { x: 0.0, y: 0.0 },
            updm: Updm::generate("agent-1", || 0.5),
            philosophical_alignment: "phil-deontology".into(),
            resources: BTreeMap::from([("energy".to_string(), 50.0), ("data".to_string(), 60.0)]),
            connections: BTreeSet::new(),
            status: AgentStatus::Active,
            life_log: Vec::new(),
            satisfaction_level: satisfaction,
            influence_network: BTreeMap::new(),
        }
    }

    #[test]
    fn test_zero_rate_never_emits() {
        let catalog = Catalog::builtin();
        let scenario = catalog.scenario("duty").unwrap();
        let a = agent(0.7, AgentType::Individual);
        let ctx = AgentStepContext {
            agent: &a,
            scenario,
            step: 0,
            formed_connection: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut policy = SatisfactionEventPolicy::new(0.0);
        assert!((0..100).all(|_| policy.on_agent_step(&ctx, &mut rng).is_none()));
    }

    #[test]
    fn test_event_shape_follows_agent_state() {
        let catalog = Catalog::builtin();
        let scenario = catalog.scenario("duty").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut policy = SatisfactionEventPolicy::new(1.0);

        let unhappy = agent(0.2, AgentType::Individual);
        let ctx = AgentStepContext {
            agent: &unhappy,
            scenario,
            step: 3,
            formed_connection: None,
        };
        let event = policy.on_agent_step(&ctx, &mut rng).unwrap();
        assert_eq!(event.event_type, EventType::ConflictResolution);
        assert_eq!(event.outcome, Some(EventOutcome::Negative));
        let m = event.magnitude.unwrap();
        assert!((0.3..=1.0).contains(&m));
        assert!(event.impact_tags.contains(&"deontology".to_string()));

        let content = agent(0.7, AgentType::Individual);
        let ctx = AgentStepContext {
            agent: &content,
            scenario,
            step: 3,
            formed_connection: None,
        };
        let event = policy.on_agent_step(&ctx, &mut rng).unwrap();
        assert_eq!(event.event_type, EventType::PolicySupport);
        assert_eq!(event.outcome, Some(EventOutcome::Positive));
    }

    #[test]
    fn test_new_connection_yields_social_interaction() {
        let catalog = Catalog::builtin();
        let scenario = catalog.scenario("empathic").unwrap();
        let a = agent(0.3, AgentType::Community);
        let ctx = AgentStepContext {
            agent: &a,
            scenario,
            step: 0,
            formed_connection: Some("agent-9"),
        };
        let mut rng = StdRng::seed_from_u64(3);
        let event = SatisfactionEventPolicy::new(1.0)
            .on_agent_step(&ctx, &mut rng)
            .unwrap();
        assert_eq!(event.event_type, EventType::SocialInteraction);
        assert_eq!(
            event.participants,
            Some(vec!["agent-1".to_string(), "agent-9".to_string()])
        );
    }
}

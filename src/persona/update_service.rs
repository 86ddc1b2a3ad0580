//! Event-driven persona update service.
//!
//! Subscribes to [`SIMULATION_EVENTS_TOPIC`] and, while active, interprets
//! each event as a set of personality/value deltas. Confident updates are
//! recorded, queued for the engine, and announced on
//! [`PERSONA_UPDATES_TOPIC`]. While inactive every message is discarded
//! before analysis. After [`destroy`](PersonaUpdateService::destroy) the
//! service is unsubscribed for good.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{
    EventBus, EventBusMessage, EventOutcome, EventType, SimulationEvent, Subscription,
    PERSONA_UPDATES_TOPIC, SIMULATION_EVENTS_TOPIC,
};
use crate::persona::updm::{PersonalityTrait, SchwartzValue};
use crate::utilities::errors::PersonaUpdateError;

static GLOBAL_PERSONA_SERVICE: OnceLock<Arc<PersonaUpdateService>> = OnceLock::new();

/// Updates below this confidence are dropped.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Pending queue size that triggers a batched eviction of the oldest updates.
pub const DEFAULT_PENDING_CAPACITY: usize = 1000;

/// Number of updates an eviction frees below the pending capacity.
pub const DEFAULT_PENDING_EVICTION_BATCH: usize = 100;

// ---------------------------------------------------------------------------
// Impact table
// ---------------------------------------------------------------------------

/// What an impact entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "name", rename_all = "snake_case")]
pub enum ImpactTarget {
    Personality(PersonalityTrait),
    Value(SchwartzValue),
}

impl ImpactTarget {
    /// snake_case name of the trait or value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Personality(t) => t.as_str(),
            Self::Value(v) => v.as_str(),
        }
    }
}

/// One delta implied by an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitImpact {
    /// Trait or value moved.
    pub target: ImpactTarget,
    /// Signed change, already scaled by outcome and magnitude.
    pub change: f64,
}

fn base_impacts(event: &SimulationEvent) -> Vec<TraitImpact> {
    use ImpactTarget::{Personality as P, Value as V};
    use PersonalityTrait::*;
    use SchwartzValue::*;

    let table: &[(ImpactTarget, f64)] = match event.event_type {
        EventType::CommunityParticipation => &[
            (P(Agreeableness), 0.02),
            (V(Universalism), 0.015),
            (V(Benevolence), 0.01),
        ],
        EventType::TechnologyAdoption => &[
            (P(Openness), 0.015),
            (V(SelfDirection), 0.01),
            (V(Stimulation), 0.01),
        ],
        EventType::ConflictResolution => &[
            (P(Agreeableness), 0.025),
            (P(Conscientiousness), 0.015),
            (V(Benevolence), 0.02),
        ],
        EventType::ResourceAllocation => &[
            (P(Conscientiousness), 0.01),
            (V(Achievement), 0.015),
            (V(Security), 0.01),
        ],
        EventType::SocialInteraction => &[(P(Extraversion), 0.01), (P(Agreeableness), 0.005)],
        EventType::PolicySupport => &[],
    };

    let mut impacts: Vec<TraitImpact> = table
        .iter()
        .map(|&(target, change)| TraitImpact { target, change })
        .collect();

    if event.event_type == EventType::PolicySupport {
        let details = event.details.as_str();
        if details.contains("universal") || details.contains("equality") {
            impacts.push(TraitImpact {
                target: V(Universalism),
                change: 0.02,
            });
        }
        if details.contains("security") || details.contains("safety") {
            impacts.push(TraitImpact {
                target: V(Security),
                change: 0.015,
            });
        }
    }
    impacts
}

fn outcome_multiplier(outcome: Option<EventOutcome>) -> f64 {
    match outcome {
        Some(EventOutcome::Positive) => 1.0,
        Some(EventOutcome::Negative) => -0.5,
        Some(EventOutcome::Neutral) | None => 0.3,
    }
}

/// Scaled trait/value deltas implied by `event`.
pub fn impact_mapping(event: &SimulationEvent) -> Vec<TraitImpact> {
    let scale = outcome_multiplier(event.outcome) * event.magnitude.unwrap_or(1.0);
    base_impacts(event)
        .into_iter()
        .map(|i| TraitImpact {
            change: i.change * scale,
            ..i
        })
        .collect()
}

/// How strongly `event` should move a persona, in `[0, 1]`.
pub fn update_confidence(event: &SimulationEvent, impacts: &[TraitImpact]) -> f64 {
    let mut confidence = 0.5 + event.impact_tags.len() as f64 * 0.1;
    if let Some(magnitude) = event.magnitude {
        confidence *= magnitude;
    }
    confidence += impacts.len() as f64 * 0.05;
    confidence.clamp(0.0, 1.0)
}

fn format_changes(impacts: &[TraitImpact]) -> String {
    impacts
        .iter()
        .map(|i| {
            let sign = if i.change > 0.0 { "+" } else { "" };
            format!("{}: {}{:.1}%", i.target.name(), sign, i.change * 100.0)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Results and statistics
// ---------------------------------------------------------------------------

/// One accepted persona update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaUpdateResult {
    /// Agent the update applies to.
    pub agent_id: String,
    /// Trait -> delta.
    pub updated_traits: BTreeMap<PersonalityTrait, f64>,
    /// Value -> delta.
    pub updated_values: BTreeMap<SchwartzValue, f64>,
    /// Human-readable deltas, e.g. `agreeableness: +2.0%`.
    pub changes_summary: String,
    /// Confidence in `[0, 1]`; at least the service threshold.
    pub confidence_score: f64,
    /// Event that caused the update.
    pub source_event_id: String,
    /// When the update was accepted.
    pub timestamp: DateTime<Utc>,
}

/// Totals reported by [`PersonaUpdateService::statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaStatistics {
    /// Updates accepted since creation.
    pub total_updates: usize,
    /// Accepted updates per agent.
    pub agent_update_counts: BTreeMap<String, usize>,
    /// Mean confidence of accepted updates, `0.0` when none.
    pub average_confidence: f64,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Turns simulation events into persona updates; share it as an `Arc`.
pub struct PersonaUpdateService {
    bus: Arc<EventBus>,
    subscription: Mutex<Option<Subscription>>,
    update_history: Mutex<Vec<PersonaUpdateResult>>,
    /// Accepted updates not yet applied, oldest first. Bounded.
    pending: Mutex<VecDeque<PersonaUpdateResult>>,
    active: AtomicBool,
    destroyed: AtomicBool,
    confidence_threshold: f64,
    pending_capacity: usize,
    pending_eviction_batch: usize,
}

impl std::fmt::Debug for PersonaUpdateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaUpdateService")
            .field("active", &self.is_active())
            .field("updates", &self.update_history.lock().len())
            .finish()
    }
}

impl PersonaUpdateService {
    /// Create an inactive service subscribed to `bus`.
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Self::with_threshold(bus, DEFAULT_CONFIDENCE_THRESHOLD)
    }

    /// Inactive service with a custom confidence threshold.
    pub fn with_threshold(bus: Arc<EventBus>, confidence_threshold: f64) -> Arc<Self> {
        Self::with_limits(
            bus,
            confidence_threshold,
            DEFAULT_PENDING_CAPACITY,
            DEFAULT_PENDING_EVICTION_BATCH,
        )
    }

    /// Service whose pending queue evicts its oldest updates once it holds
    /// more than `pending_capacity`, trimming to
    /// `pending_capacity - eviction_batch`.
    pub fn with_limits(
        bus: Arc<EventBus>,
        confidence_threshold: f64,
        pending_capacity: usize,
        eviction_batch: usize,
    ) -> Arc<Self> {
        let service = Arc::new(Self {
            bus,
            subscription: Mutex::new(None),
            update_history: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            active: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            confidence_threshold,
            pending_capacity,
            pending_eviction_batch: eviction_batch.min(pending_capacity),
        });
        service.subscribe_to_simulation_events();
        service
    }

    fn subscribe_to_simulation_events(self: &Arc<Self>) {
        // Weak so the bus does not keep the service alive.
        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = self.bus.subscribe(SIMULATION_EVENTS_TOPIC, move |message| {
            if let Some(service) = weak.upgrade() {
                service.handle_message(message);
            }
            Ok(())
        });
        *self.subscription.lock() = Some(subscription);
    }

    /// Process-wide service bound to [`EventBus::global`].
    pub fn global() -> Arc<PersonaUpdateService> {
        GLOBAL_PERSONA_SERVICE
            .get_or_init(|| PersonaUpdateService::new(EventBus::global()))
            .clone()
    }

    fn handle_message(&self, message: &EventBusMessage) {
        if !self.is_active() {
            return;
        }

        let result = match self.analyze(&message.agent_id, &message.event) {
            Ok(Some(result)) => result,
            Ok(None) => return,
            Err(e) => {
                log::error!("[PersonaUpdate] Error processing simulation event: {e}");
                return;
            }
        };

        self.update_history.lock().push(result.clone());
        self.enqueue_pending(result.clone());

        let announcement = SimulationEvent {
            event_id: format!("persona-update-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            event_type: EventType::SocialInteraction,
            details: format!("Persona updated: {}", result.changes_summary),
            impact_tags: vec!["persona_evolution".into(), "dynamic_traits".into()],
            participants: None,
            outcome: Some(EventOutcome::Positive),
            magnitude: Some(result.confidence_score),
        };
        self.bus
            .publish(PERSONA_UPDATES_TOPIC, &message.agent_id, announcement, None);

        log::info!(
            "[PersonaUpdate] Updated persona for {}: {}",
            result.agent_id,
            result.changes_summary
        );
    }

    /// Interpret one event for one agent without touching service state.
    ///
    /// Returns `Ok(None)` when the event maps to no impact or is not
    /// confident enough.
    pub fn analyze(
        &self,
        agent_id: &str,
        event: &SimulationEvent,
    ) -> Result<Option<PersonaUpdateResult>, PersonaUpdateError> {
        if let Some(magnitude) = event.magnitude {
            if !magnitude.is_finite() || !(0.0..=1.0).contains(&magnitude) {
                return Err(PersonaUpdateError::InvalidMagnitude {
                    event_id: event.event_id.clone(),
                    magnitude,
                });
            }
        }

        let impacts = impact_mapping(event);
        if impacts.is_empty() {
            return Ok(None);
        }

        let confidence = update_confidence(event, &impacts);
        if confidence < self.confidence_threshold {
            log::debug!(
                "[PersonaUpdate] Dropped {} for {agent_id}: confidence {confidence:.2}",
                event.event_type
            );
            return Ok(None);
        }

        let mut updated_traits = BTreeMap::new();
        let mut updated_values = BTreeMap::new();
        for impact in &impacts {
            match impact.target {
                ImpactTarget::Personality(t) => {
                    *updated_traits.entry(t).or_insert(0.0) += impact.change;
                }
                ImpactTarget::Value(v) => {
                    *updated_values.entry(v).or_insert(0.0) += impact.change;
                }
            }
        }

        Ok(Some(PersonaUpdateResult {
            agent_id: agent_id.to_string(),
            updated_traits,
            updated_values,
            changes_summary: format_changes(&impacts),
            confidence_score: confidence,
            source_event_id: event.event_id.clone(),
            timestamp: Utc::now(),
        }))
    }

    fn enqueue_pending(&self, result: PersonaUpdateResult) {
        let mut pending = self.pending.lock();
        pending.push_back(result);
        if pending.len() > self.pending_capacity {
            let keep = self.pending_capacity - self.pending_eviction_batch;
            let evict = pending.len() - keep;
            pending.drain(..evict);
            log::warn!("[PersonaUpdate] Pending queue full, evicted {evict} unapplied updates");
        }
    }

    /// Updates accepted since the last call, oldest first.
    pub fn take_pending_updates(&self) -> Vec<PersonaUpdateResult> {
        std::mem::take(&mut *self.pending.lock()).into()
    }

    /// Drop every unapplied update. Returns how many were dropped.
    pub fn discard_pending_updates(&self) -> usize {
        let mut pending = self.pending.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Number of updates waiting to be applied.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Every recorded update for `agent_id`, oldest first.
    pub fn agent_update_history(&self, agent_id: &str) -> Vec<PersonaUpdateResult> {
        self.update_history
            .lock()
            .iter()
            .filter(|u| u.agent_id == agent_id)
            .cloned()
            .collect()
    }

    /// Totals over the full update history.
    pub fn statistics(&self) -> PersonaStatistics {
        let history = self.update_history.lock();
        let mut agent_update_counts = BTreeMap::new();
        for update in history.iter() {
            *agent_update_counts.entry(update.agent_id.clone()).or_insert(0) += 1;
        }
        let average_confidence = if history.is_empty() {
            0.0
        } else {
            history.iter().map(|u| u.confidence_score).sum::<f64>() / history.len() as f64
        };
        PersonaStatistics {
            total_updates: history.len(),
            agent_update_counts,
            average_confidence,
            is_active: self.is_active(),
        }
    }

    /// Whether incoming events are analyzed.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Toggle analysis. Activation is refused after [`destroy`](Self::destroy).
    pub fn set_active(&self, active: bool) {
        if active && self.destroyed.load(Ordering::SeqCst) {
            log::warn!("[PersonaUpdate] Ignoring activation of a destroyed service");
            return;
        }
        self.active.store(active, Ordering::SeqCst);
        log::info!(
            "[PersonaUpdate] Service {}",
            if active { "activated" } else { "deactivated" }
        );
    }

    /// Unsubscribe permanently and deactivate.
    pub fn destroy(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.destroyed.store(true, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }
}

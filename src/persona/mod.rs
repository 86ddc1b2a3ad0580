//! Persona model and its event-driven evolution.
//!
//! # Architecture
//!
//! ```text
//! SimulationEvent (bus topic "simulation-events")
//!   ↓  impact table × outcome × magnitude
//! TraitImpact[]  →  confidence ≥ threshold?
//!   ↓
//! PersonaUpdateResult  →  history, pending queue, "persona-updates"
//!   ↓  drained by the engine
//! Updm (clamped trait/value scores + evidence)
//! ```

pub mod update_service;
pub mod updm;

pub use update_service::{
    impact_mapping, update_confidence, ImpactTarget, PersonaStatistics, PersonaUpdateResult,
    PersonaUpdateService, TraitImpact, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_PENDING_CAPACITY,
    DEFAULT_PENDING_EVICTION_BATCH,
};
pub use updm::{
    EvidenceSnippet, PersonalityTrait, PersonalityTraits, SchwartzValue, TraitScore, Updm,
    ValueSystem,
};

//! The simulation engine: agent generation and the per-step update.
//!
//! A step runs these phases in order:
//!
//! 1. per agent: recompute satisfaction, maybe form a connection when
//!    unhappy, drift resources
//! 2. nudge the global metrics from average satisfaction under the
//!    scenario's philosophy
//! 3. apply key technology effects
//! 4. let the event hook produce per-agent events (life log + bus)
//! 5. fold pending persona updates back into the agents
//!
//! The engine owns its RNG; a fixed seed makes runs reproducible.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::catalog::{Catalog, ParameterMetrics, Philosophy, ScenarioConfig, DEFAULT_SCENARIO_ID};
use crate::events::{EventBus, SimulationEvent, SIMULATION_EVENTS_TOPIC};
use crate::persona::{EvidenceSnippet, PersonaUpdateResult, PersonaUpdateService, Updm};
use crate::simulation::agent::{Agent, AgentEvent, AgentStatus, AgentType, Position, BASE_RESOURCES};
use crate::simulation::hooks::{AgentEventHook, AgentStepContext};
use crate::simulation::state::{metric_rules, GlobalMetric, GlobalMetrics, SimulationState, StatePatch};
use crate::utilities::SimulationConfig;

/// Weight of the personality term in the satisfaction average.
const PERSONALITY_WEIGHT: f64 = 0.3;
/// Agents below this satisfaction may seek a new connection.
const LOW_SATISFACTION: f64 = 0.4;
const RECONNECT_CHANCE: f64 = 0.3;
const DOMINANT_ALIGNMENT_CHANCE: f64 = 0.7;
const COMMUNITY_AGENT_CHANCE: f64 = 0.2;

/// Owns the population, the state and the RNG of one simulation run.
pub struct SimulationEngine {
    config: SimulationConfig,
    catalog: Arc<Catalog>,
    scenario: ScenarioConfig,
    state: SimulationState,
    rng: StdRng,
    bus: Option<Arc<EventBus>>,
    persona: Option<Arc<PersonaUpdateService>>,
    event_hook: Option<Box<dyn AgentEventHook>>,
}

impl fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("scenario", &self.scenario.id)
            .field("current_step", &self.state.current_step)
            .field("agents", &self.state.agents.len())
            .field("bus", &self.bus.is_some())
            .field("persona", &self.persona.is_some())
            .field("event_hook", &self.event_hook.is_some())
            .finish()
    }
}

impl SimulationEngine {
    /// Engine with default configuration over the built-in catalog.
    pub fn new(scenario_id: &str) -> Self {
        Self::with_config(scenario_id, SimulationConfig::default(), Catalog::builtin())
    }

    /// Like [`new`](Self::new) but reproducible.
    pub fn with_seed(scenario_id: &str, seed: u64) -> Self {
        let config = SimulationConfig {
            seed: Some(seed),
            ..SimulationConfig::default()
        };
        Self::with_config(scenario_id, config, Catalog::builtin())
    }

    /// Unknown scenario ids fall back to `config.default_scenario`, then to
    /// the built-in default.
    pub fn with_config(scenario_id: &str, config: SimulationConfig, catalog: Arc<Catalog>) -> Self {
        let scenario = resolve_scenario(&catalog, scenario_id, &config.default_scenario);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut engine = Self {
            config,
            catalog,
            scenario,
            state: empty_state(),
            rng,
            bus: None,
            persona: None,
            event_hook: None,
        };
        engine.state = engine.build_state();
        log::info!(
            "[SimulationEngine] Initialized scenario '{}' with {} agents",
            engine.scenario.id,
            engine.state.agents.len()
        );
        engine
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    /// Bus that receives hook-produced events.
    pub fn attach_event_bus(&mut self, bus: Arc<EventBus>) {
        self.bus = Some(bus);
    }

    /// Activates `service`; its pending updates are applied at the end of each step.
    pub fn attach_persona_service(&mut self, service: Arc<PersonaUpdateService>) {
        service.set_active(true);
        self.persona = Some(service);
    }

    /// Install the per-agent event hook, replacing any previous one.
    pub fn set_event_hook(&mut self, hook: impl AgentEventHook + 'static) {
        self.event_hook = Some(Box::new(hook));
    }

    /// Remove the event hook; steps then emit no events.
    pub fn clear_event_hook(&mut self) {
        self.event_hook = None;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Snapshot of the current state. Later steps do not affect it.
    pub fn get_state(&self) -> SimulationState {
        self.state.clone()
    }

    /// Borrow the current state.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Overwrite the given fields of the state. No validation is applied.
    pub fn set_state(&mut self, patch: StatePatch) {
        patch.apply_to(&mut self.state);
    }

    /// Active scenario.
    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    /// Catalog the engine reads parameters from.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Whether the step budget is used up.
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Mean of the scenario's success metrics, if any resolve.
    pub fn success_score(&self) -> Option<f64> {
        self.state.success_score(&self.scenario)
    }

    /// Switch to `scenario_id` and regenerate everything, including dropping
    /// persona updates queued for the old roster. Returns `false` and leaves
    /// the engine untouched when the id is unknown.
    pub fn change_scenario(&mut self, scenario_id: &str) -> bool {
        let Some(scenario) = self.catalog.scenario(scenario_id).cloned() else {
            log::warn!("[SimulationEngine] Unknown scenario '{}', keeping '{}'", scenario_id, self.scenario.id);
            return false;
        };
        if let Some(service) = &self.persona {
            let dropped = service.discard_pending_updates();
            if dropped > 0 {
                log::debug!("[SimulationEngine] Dropped {dropped} persona updates for the old roster");
            }
        }
        self.scenario = scenario;
        self.state = self.build_state();
        log::info!("[SimulationEngine] Switched to scenario '{}'", self.scenario.id);
        true
    }

    // -----------------------------------------------------------------------
    // Randomness and satisfaction
    // -----------------------------------------------------------------------

    /// Uniform draw reshaped by the scenario's dominant philosophy.
    pub fn influenced_random(&mut self) -> f64 {
        let raw = self.rng.gen::<f64>();
        influence(self.scenario.philosophy(), raw)
    }

    /// Value-weighted environmental satisfaction blended with the
    /// personality term, in `[0, 1]`.
    pub fn calculate_satisfaction(&self, agent: &Agent) -> f64 {
        let mut total = 0.0;
        let mut weight_sum = 0.0;

        for (value, weight) in agent.updm.value_system.iter() {
            let variable_id = format!("phil-{}", value.as_str());
            if let Some(metrics) = self.current_metrics(&variable_id) {
                total += metrics.satisfaction_level().unwrap_or(0.5) * weight;
                weight_sum += weight;
            }
        }

        total += agent.updm.personality_satisfaction() * PERSONALITY_WEIGHT;
        weight_sum += PERSONALITY_WEIGHT;

        if weight_sum > 0.0 {
            (total / weight_sum).clamp(0.0, 1.0)
        } else {
            agent.satisfaction_level
        }
    }

    /// Live metrics for a variable: state overrides first, then the catalog.
    fn current_metrics(&self, variable_id: &str) -> Option<&ParameterMetrics> {
        self.state.variable_state.get(variable_id).or_else(|| {
            self.catalog
                .parameter_by_variable_id(variable_id)
                .map(|p| &p.metrics)
        })
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance one step. Returns `false` without touching anything once the
    /// step budget is used up.
    pub fn step(&mut self) -> bool {
        if self.state.is_complete() {
            return false;
        }

        let formed = self.update_agent_behaviors();
        self.update_global_metrics();
        self.apply_technology_effects();
        self.emit_agent_events(&formed);
        self.apply_pending_persona_updates();

        self.state.current_step += 1;
        log::debug!(
            "[SimulationEngine] Step {}/{} done",
            self.state.current_step,
            self.state.total_steps
        );
        true
    }

    /// Run up to `n` steps; returns how many actually ran.
    pub fn step_n(&mut self, n: u64) -> u64 {
        let mut ran = 0;
        while ran < n && self.step() {
            ran += 1;
        }
        ran
    }

    /// Phase 1. Returns, per agent index, the partner of a connection formed this step.
    fn update_agent_behaviors(&mut self) -> Vec<Option<String>> {
        let n = self.state.agents.len();
        let mut formed = vec![None; n];
        for i in 0..n {
            let satisfaction = self.calculate_satisfaction(&self.state.agents[i]);
            self.state.agents[i].satisfaction_level = satisfaction;
            if satisfaction < LOW_SATISFACTION {
                formed[i] = self.seek_connection(i);
            }
            self.drift_resources(i);
        }
        formed
    }

    fn seek_connection(&mut self, i: usize) -> Option<String> {
        if self.rng.gen::<f64>() >= RECONNECT_CHANCE {
            return None;
        }
        let agents = &self.state.agents;
        let candidates: Vec<usize> = (0..agents.len())
            .filter(|&j| j != i && !agents[i].is_connected_to(&agents[j].id))
            .collect();
        let j = *candidates.choose(&mut self.rng)?;
        connect(&mut self.state.agents, i, j);
        Some(self.state.agents[j].id.clone())
    }

    fn drift_resources(&mut self, i: usize) {
        let agent = &mut self.state.agents[i];
        let bonus = agent.connection_count() as f64 * 0.1;
        for amount in agent.resources.values_mut() {
            let drift = (self.rng.gen::<f64>() - 0.45) * 2.0 + bonus;
            *amount = (*amount + drift).clamp(0.0, 100.0);
        }
    }

    /// Phase 2.
    fn update_global_metrics(&mut self) {
        let n = self.state.agents.len();
        if n > 0 {
            let average = self
                .state
                .agents
                .iter()
                .map(|a| self.calculate_satisfaction(a))
                .sum::<f64>()
                / n as f64;
            if let Some(philosophy) = self.scenario.philosophy() {
                for rule in metric_rules(philosophy) {
                    self.state
                        .global_metrics
                        .nudge(rule.metric, (average - rule.baseline) * rule.gain);
                }
            }
        }
        self.state.global_metrics.clamp_all();
    }

    /// Phase 3.
    fn apply_technology_effects(&mut self) {
        let effects: Vec<(Option<f64>, Option<f64>)> = self
            .scenario
            .key_technologies
            .iter()
            .filter_map(|tech| self.current_metrics(tech))
            .map(|m| (m.accessibility(), m.social_impact()))
            .collect();

        for (accessibility, social_impact) in effects {
            if accessibility.is_some_and(|a| a > 0.7) {
                self.state
                    .global_metrics
                    .nudge(GlobalMetric::ResourceEfficiency, 0.5);
            }
            if social_impact.is_some_and(|s| s > 0.8) {
                let swing = (self.rng.gen::<f64>() - 0.5) * 2.0;
                self.state.global_metrics.nudge(GlobalMetric::SocialTrust, swing);
            }
        }
        self.state.global_metrics.clamp_all();
    }

    /// Phase 4. Needs both a hook and a bus.
    fn emit_agent_events(&mut self, formed: &[Option<String>]) {
        let (Some(bus), Some(hook)) = (self.bus.clone(), self.event_hook.as_mut()) else {
            return;
        };

        let mut produced: Vec<(usize, SimulationEvent)> = Vec::new();
        for (i, agent) in self.state.agents.iter().enumerate() {
            let ctx = AgentStepContext {
                agent,
                scenario: &self.scenario,
                step: self.state.current_step,
                formed_connection: formed.get(i).and_then(|p| p.as_deref()),
            };
            if let Some(event) = hook.on_agent_step(&ctx, &mut self.rng) {
                produced.push((i, event));
            }
        }

        for (i, event) in produced {
            let agent = &mut self.state.agents[i];
            let entry = life_log_entry(agent, &event);
            agent.life_log.push(entry);
            let agent_id = agent.id.clone();
            bus.publish(SIMULATION_EVENTS_TOPIC, &agent_id, event, None);
        }
    }

    /// Phase 5.
    fn apply_pending_persona_updates(&mut self) {
        let Some(service) = self.persona.clone() else {
            return;
        };
        for update in service.take_pending_updates() {
            self.apply_persona_update(&update);
        }
    }

    /// Fold a persona update into the matching agent, clamping every score.
    /// Returns `false` when no agent has that id.
    pub fn apply_persona_update(&mut self, update: &PersonaUpdateResult) -> bool {
        let Some(agent) = self.state.agents.iter_mut().find(|a| a.id == update.agent_id) else {
            log::debug!(
                "[SimulationEngine] Dropping persona update for unknown agent {}",
                update.agent_id
            );
            return false;
        };
        for (&t, &delta) in &update.updated_traits {
            let evidence = EvidenceSnippet {
                event_id: update.source_event_id.clone(),
                text: update.changes_summary.clone(),
                timestamp: update.timestamp,
            };
            agent.updm.apply_trait_delta(t, delta, evidence);
        }
        for (&v, &delta) in &update.updated_values {
            agent.updm.apply_value_delta(v, delta);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    fn build_state(&mut self) -> SimulationState {
        let agents = generate_agents(&mut self.rng, &self.scenario, self.config.agent_count);
        let variable_state = self
            .catalog
            .all_current_parameters()
            .into_iter()
            .map(|p| (p.variable_id.clone(), p.metrics.clone()))
            .collect();
        SimulationState {
            is_running: false,
            current_step: 0,
            total_steps: self.config.total_steps,
            selected_scenario: self.scenario.id.clone(),
            agents,
            global_metrics: GlobalMetrics::default(),
            variable_state,
        }
    }
}

fn resolve_scenario(catalog: &Catalog, requested: &str, configured_default: &str) -> ScenarioConfig {
    if let Some(s) = catalog.scenario(requested) {
        return s.clone();
    }
    log::warn!(
        "[SimulationEngine] Unknown scenario '{}', falling back to '{}'",
        requested,
        configured_default
    );
    catalog
        .scenario(configured_default)
        .or_else(|| catalog.scenario(DEFAULT_SCENARIO_ID))
        .or_else(|| catalog.all_scenarios().first())
        .cloned()
        .unwrap_or_else(neutral_scenario)
}

/// Used only with a catalog that defines no scenarios at all.
fn neutral_scenario() -> ScenarioConfig {
    ScenarioConfig {
        id: "neutral".to_string(),
        name: "Neutral".to_string(),
        description: "No dominant philosophy".to_string(),
        dominant_philosophy: String::new(),
        key_technologies: Vec::new(),
        global_rules: BTreeMap::new(),
        success_metrics: Vec::new(),
    }
}

fn empty_state() -> SimulationState {
    SimulationState {
        is_running: false,
        current_step: 0,
        total_steps: 0,
        selected_scenario: String::new(),
        agents: Vec::new(),
        global_metrics: GlobalMetrics::default(),
        variable_state: BTreeMap::new(),
    }
}

fn influence(philosophy: Option<Philosophy>, raw: f64) -> f64 {
    let shaped = match philosophy {
        Some(Philosophy::Communitarianism) => (raw + 0.2).min(1.0),
        Some(Philosophy::Existentialism) => raw.max(0.3),
        Some(Philosophy::Deontology) => 0.4 + raw * 0.4,
        Some(Philosophy::Utilitarianism) => 0.3 + raw * 0.5,
        None => raw,
    };
    shaped.clamp(0.0, 1.0)
}

fn generate_agents(rng: &mut StdRng, scenario: &ScenarioConfig, count: usize) -> Vec<Agent> {
    let philosophy = scenario.philosophy();
    let mut agents: Vec<Agent> = (0..count)
        .map(|i| {
            let id = format!("agent-{}", i + 1);
            let agent_type = if rng.gen::<f64>() < COMMUNITY_AGENT_CHANCE {
                AgentType::Community
            } else {
                AgentType::Individual
            };
            let position = Position {
                x: rng.gen::<f64>() * 800.0 + 100.0,
                y: rng.gen::<f64>() * 600.0 + 100.0,
            };
            let updm = Updm::generate(id.as_str(), || influence(philosophy, rng.gen::<f64>()));
            let philosophical_alignment = if rng.gen::<f64>() < DOMINANT_ALIGNMENT_CHANCE {
                scenario.dominant_philosophy.clone()
            } else {
                Philosophy::ALL[rng.gen_range(0..Philosophy::ALL.len())]
                    .variable_id()
                    .to_string()
            };
            let resources = BASE_RESOURCES
                .iter()
                .map(|name| (name.to_string(), rng.gen::<f64>() * 100.0))
                .collect();
            Agent {
                id,
                agent_type,
                position,
                updm,
                philosophical_alignment,
                resources,
                connections: Default::default(),
                status: AgentStatus::Active,
                life_log: Vec::new(),
                satisfaction_level: rng.gen::<f64>(),
                influence_network: BTreeMap::new(),
            }
        })
        .collect();

    generate_connections(&mut agents, rng);
    agents
}

/// Each agent links to 1-4 agents it is not yet connected to.
fn generate_connections(agents: &mut [Agent], rng: &mut StdRng) {
    for i in 0..agents.len() {
        let wanted = rng.gen_range(1..=4);
        let candidates: Vec<usize> = (0..agents.len())
            .filter(|&j| j != i && !agents[i].is_connected_to(&agents[j].id))
            .collect();
        let picks: Vec<usize> = candidates.choose_multiple(rng, wanted).copied().collect();
        for j in picks {
            connect(agents, i, j);
        }
    }
}

fn connect(agents: &mut [Agent], i: usize, j: usize) {
    let a = agents[i].id.clone();
    let b = agents[j].id.clone();
    agents[i].connections.insert(b);
    agents[j].connections.insert(a);
}

fn life_log_entry(agent: &Agent, event: &SimulationEvent) -> AgentEvent {
    let mut impact_metrics = BTreeMap::new();
    if let Some(m) = event.magnitude {
        impact_metrics.insert("magnitude".to_string(), m);
    }
    AgentEvent {
        id: event.event_id.clone(),
        agent_id: agent.id.clone(),
        action: event.event_type.as_str().to_string(),
        context: event.details.clone(),
        impact_metrics,
        philosophical_reasoning: format!("Acting under {}", agent.philosophical_alignment),
        timestamp: event.timestamp,
        affected_agents: event.participants.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PsychologyMetrics, ResourceDependency, TechnologyMetrics};
    use crate::events::{EventOutcome, EventType};
    use crate::persona::{PersonalityTrait, SchwartzValue};
    use std::collections::HashSet;

    fn assert_unit(v: f64) {
        assert!((0.0..=1.0).contains(&v), "{v} not in [0, 1]");
    }

    #[test]
    fn test_initial_state() {
        let engine = SimulationEngine::with_seed("empathic", 1);
        let state = engine.get_state();
        assert_eq!(state.agents.len(), 24);
        assert_eq!(state.current_step, 0);
        assert_eq!(state.total_steps, 100);
        assert!(!state.is_running);
        assert_eq!(state.selected_scenario, "empathic");
        assert_eq!(state.global_metrics, GlobalMetrics::default());

        let ids: HashSet<_> = state.agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 24);
        assert!(state.variable_state.contains_key("tech-ai"));
    }

    #[test]
    fn test_unknown_scenario_falls_back() {
        let engine = SimulationEngine::with_seed("no-such-world", 2);
        assert_eq!(engine.scenario().id, DEFAULT_SCENARIO_ID);
        assert_eq!(engine.state().selected_scenario, DEFAULT_SCENARIO_ID);
    }

    #[test]
    fn test_agents_are_well_formed() {
        let engine = SimulationEngine::with_seed("duty", 3);
        let state = engine.state();
        for agent in &state.agents {
            assert!(!agent.connections.is_empty());
            assert!(!agent.connections.contains(&agent.id));
            for other in &agent.connections {
                let peer = state.agent(other).unwrap();
                assert!(peer.is_connected_to(&agent.id), "asymmetric link {} -> {}", agent.id, other);
            }
            for score in agent.updm.all_scores() {
                assert_unit(score);
            }
            assert_eq!(agent.resources.len(), BASE_RESOURCES.len());
            for amount in agent.resources.values() {
                assert!((0.0..=100.0).contains(amount));
            }
            assert!((100.0..900.0).contains(&agent.position.x));
            assert!((100.0..700.0).contains(&agent.position.y));
            assert_unit(agent.satisfaction_level);
        }
    }

    #[test]
    fn test_influenced_random_ranges() {
        let cases = [
            ("sovereign", 0.3, 1.0),
            ("duty", 0.4, 0.8),
            ("optimized", 0.3, 0.8),
            ("empathic", 0.2, 1.0),
        ];
        for (scenario, lo, hi) in cases {
            let mut engine = SimulationEngine::with_seed(scenario, 4);
            for _ in 0..1000 {
                let v = engine.influenced_random();
                assert!(v >= lo && v <= hi, "{scenario}: {v}");
            }
        }
    }

    #[test]
    fn test_ten_steps_keep_invariants() {
        let mut engine = SimulationEngine::with_seed("optimized", 5);
        assert_eq!(engine.step_n(10), 10);
        let state = engine.get_state();
        assert_eq!(state.current_step, 10);
        for (_, value) in state.global_metrics.iter() {
            assert!((0.0..=100.0).contains(&value));
        }
        for agent in &state.agents {
            assert_unit(agent.satisfaction_level);
            for other in &agent.connections {
                assert!(state.agent(other).unwrap().is_connected_to(&agent.id));
            }
            for amount in agent.resources.values() {
                assert!((0.0..=100.0).contains(amount));
            }
        }
    }

    #[test]
    fn test_step_is_noop_when_complete() {
        let config = SimulationConfig {
            total_steps: 3,
            seed: Some(6),
            ..SimulationConfig::default()
        };
        let mut engine = SimulationEngine::with_config("empathic", config, Catalog::builtin());
        assert_eq!(engine.step_n(10), 3);
        assert!(engine.is_complete());
        let before = engine.get_state();
        assert!(!engine.step());
        assert_eq!(engine.get_state(), before);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut engine = SimulationEngine::with_seed("empathic", 7);
        let snapshot = engine.get_state();
        engine.step();
        assert_eq!(snapshot.current_step, 0);
        assert_eq!(engine.state().current_step, 1);
    }

    #[test]
    fn test_set_state_patches_only_given_fields() {
        let mut engine = SimulationEngine::with_seed("empathic", 8);
        let before = engine.get_state();
        engine.set_state(StatePatch::running(true));
        let after = engine.get_state();
        assert!(after.is_running);
        assert_eq!(after.agents, before.agents);
        assert_eq!(after.current_step, before.current_step);
    }

    #[test]
    fn test_change_scenario() {
        let mut engine = SimulationEngine::with_seed("empathic", 9);
        engine.step_n(4);
        assert!(engine.change_scenario("sovereign"));
        let state = engine.get_state();
        assert_eq!(state.selected_scenario, "sovereign");
        assert_eq!(state.current_step, 0);
        assert_eq!(state.agents.len(), 24);
        assert_eq!(state.global_metrics, GlobalMetrics::default());

        assert!(!engine.change_scenario("atlantis"));
        assert_eq!(engine.get_state(), state);
    }

    #[test]
    fn test_seeded_runs_match() {
        let mut a = SimulationEngine::with_seed("duty", 42);
        let mut b = SimulationEngine::with_seed("duty", 42);
        a.step_n(5);
        b.step_n(5);
        let (sa, sb) = (a.get_state(), b.get_state());
        assert_eq!(sa.global_metrics, sb.global_metrics);
        for (x, y) in sa.agents.iter().zip(&sb.agents) {
            assert_eq!(x.connections, y.connections);
            assert_eq!(x.resources, y.resources);
            assert_eq!(x.satisfaction_level, y.satisfaction_level);
            assert_eq!(x.philosophical_alignment, y.philosophical_alignment);
        }
    }

    #[test]
    fn test_satisfaction_is_personality_term_without_value_parameters() {
        let engine = SimulationEngine::with_seed("empathic", 10);
        for agent in &engine.state().agents {
            let expected = agent.updm.personality_satisfaction().clamp(0.0, 1.0);
            assert!((engine.calculate_satisfaction(agent) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_satisfaction_uses_variable_state_override() {
        let mut engine = SimulationEngine::with_seed("empathic", 11);
        let mut overrides = engine.state().variable_state.clone();
        overrides.insert(
            "phil-benevolence".to_string(),
            ParameterMetrics::Psychology(PsychologyMetrics {
                base_value: 1.0,
                satisfaction_level: 1.0,
                tech_stimulus_map: BTreeMap::new(),
            }),
        );
        engine.set_state(StatePatch {
            variable_state: Some(overrides),
            ..StatePatch::default()
        });

        let agent = engine.state().agents[0].clone();
        let w = agent.updm.value_system.get(SchwartzValue::Benevolence);
        let p = agent.updm.personality_satisfaction();
        let expected = (w + p * 0.3) / (w + 0.3);
        assert!((engine.calculate_satisfaction(&agent) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_accessible_technology_raises_efficiency() {
        let mut engine = SimulationEngine::with_seed("sovereign", 12);
        let mut overrides = engine.state().variable_state.clone();
        let Some(ParameterMetrics::Technology(bci)) = overrides.get_mut("tech-bci") else {
            panic!("tech-bci should carry technology metrics");
        };
        bci.accessibility = 0.9;
        bci.social_impact = 0.5;
        engine.set_state(StatePatch {
            variable_state: Some(overrides),
            ..StatePatch::default()
        });

        engine.step();
        let metrics = engine.state().global_metrics;
        assert_eq!(metrics.resource_efficiency, 70.5);
        assert_eq!(metrics.social_trust, 65.0);
    }

    #[test]
    fn test_hook_events_reach_life_log_and_personas() {
        let bus = Arc::new(EventBus::new());
        let service = PersonaUpdateService::new(bus.clone());
        let mut engine = SimulationEngine::with_seed("empathic", 13);
        engine.attach_event_bus(bus.clone());
        engine.attach_persona_service(service.clone());
        assert!(service.is_active());
        engine.set_event_hook(|_: &AgentStepContext<'_>, _: &mut StdRng| {
            Some(
                SimulationEvent::new(EventType::CommunityParticipation, "town hall")
                    .with_outcome(EventOutcome::Positive)
                    .with_magnitude(1.0),
            )
        });

        let before = engine.get_state();
        engine.step();
        let after = engine.get_state();

        assert_eq!(service.statistics().total_updates, 24);
        assert!(service.take_pending_updates().is_empty());
        assert_eq!(bus.topic_messages(SIMULATION_EVENTS_TOPIC, 100).len(), 24);

        for (old, new) in before.agents.iter().zip(&after.agents) {
            assert_eq!(new.life_log.len(), old.life_log.len() + 1);
            assert_eq!(new.life_log[0].action, "community_participation");
            let old_a = old.updm.personality_traits.get(PersonalityTrait::Agreeableness);
            let new_a = new.updm.personality_traits.get(PersonalityTrait::Agreeableness);
            assert!(new_a.score >= old_a.score);
            assert_eq!(new_a.evidence_snippets.len(), old_a.evidence_snippets.len() + 1);
        }
    }

    #[test]
    fn test_hook_without_bus_is_idle() {
        let mut engine = SimulationEngine::with_seed("empathic", 14);
        engine.set_event_hook(|_: &AgentStepContext<'_>, _: &mut StdRng| {
            Some(SimulationEvent::new(EventType::SocialInteraction, "chat"))
        });
        engine.step();
        assert!(engine.state().agents.iter().all(|a| a.life_log.is_empty()));
    }

    #[test]
    fn test_persona_update_for_unknown_agent() {
        let mut engine = SimulationEngine::with_seed("empathic", 15);
        let update = PersonaUpdateResult {
            agent_id: "agent-999".to_string(),
            updated_traits: BTreeMap::from([(PersonalityTrait::Openness, 0.5)]),
            updated_values: BTreeMap::new(),
            changes_summary: "openness: +50.0%".to_string(),
            confidence_score: 1.0,
            source_event_id: "evt-x".to_string(),
            timestamp: chrono::Utc::now(),
        };
        assert!(!engine.apply_persona_update(&update));

        let update = PersonaUpdateResult {
            agent_id: "agent-1".to_string(),
            updated_traits: BTreeMap::from([(PersonalityTrait::Openness, 5.0)]),
            updated_values: BTreeMap::from([(SchwartzValue::Power, -5.0)]),
            ..update
        };
        assert!(engine.apply_persona_update(&update));
        let agent = engine.state().agent("agent-1").unwrap();
        assert_eq!(agent.updm.personality_traits.score(PersonalityTrait::Openness), 1.0);
        assert_eq!(agent.updm.value_system.get(SchwartzValue::Power), 0.0);
    }

    fn inert_technology() -> ParameterMetrics {
        ParameterMetrics::Technology(TechnologyMetrics {
            trl: 1,
            accessibility: 0.0,
            social_impact: 0.0,
            resource_dependency: ResourceDependency::default(),
        })
    }

    /// Override every technology with a parameter so phase 3 does nothing.
    fn disable_technology_effects(engine: &mut SimulationEngine) {
        let mut overrides = engine.state().variable_state.clone();
        overrides.insert("tech-ai".to_string(), inert_technology());
        overrides.insert("tech-bci".to_string(), inert_technology());
        engine.set_state(StatePatch {
            variable_state: Some(overrides),
            ..StatePatch::default()
        });
    }

    /// Satisfaction is 1.0 for `score` 1.0 and 0.0 for `score` 0.0.
    fn set_personality(agent: &mut Agent, score: f64) {
        let t = &mut agent.updm.personality_traits;
        t.openness.score = score;
        t.conscientiousness.score = score;
        t.extraversion.score = score;
        t.agreeableness.score = score;
        t.neuroticism.score = 1.0 - score;
    }

    /// Runs one step and returns the pre-step average satisfaction with the
    /// resulting metrics.
    fn first_step_metrics(scenario: &str) -> (f64, GlobalMetrics) {
        let mut engine = SimulationEngine::with_seed(scenario, 21);
        disable_technology_effects(&mut engine);
        let agents = &engine.state().agents;
        let average = agents
            .iter()
            .map(|a| engine.calculate_satisfaction(a))
            .sum::<f64>()
            / agents.len() as f64;
        engine.step();
        (average, engine.state().global_metrics)
    }

    fn assert_metrics_close(actual: GlobalMetrics, expected: GlobalMetrics) {
        for ((metric, a), (_, e)) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-9, "{}: {a} != {e}", metric.name());
        }
    }

    #[test]
    fn test_communitarian_metric_update() {
        let (avg, metrics) = first_step_metrics("empathic");
        let expected = GlobalMetrics {
            social_trust: 65.0 + (avg - 0.5) * 3.0,
            community_wellbeing: 68.0 + (avg - 0.5) * 4.0,
            individual_autonomy: 60.0 + (avg - 0.6) * 2.0,
            ..GlobalMetrics::default()
        };
        assert_metrics_close(metrics, expected);
    }

    #[test]
    fn test_utilitarian_metric_update() {
        let (avg, metrics) = first_step_metrics("optimized");
        let expected = GlobalMetrics {
            total_happiness: 66.0 + (avg - 0.5) * 4.0,
            resource_efficiency: 70.0 + (avg - 0.5) * 3.0,
            privacy_score: 75.0 + (avg - 0.7) * 2.0,
            ..GlobalMetrics::default()
        };
        assert_metrics_close(metrics, expected);
    }

    #[test]
    fn test_existentialist_metric_update() {
        let (avg, metrics) = first_step_metrics("sovereign");
        let expected = GlobalMetrics {
            individual_autonomy: 60.0 + (avg - 0.5) * 4.0,
            freedom_index: 70.0 + (avg - 0.5) * 3.0,
            community_wellbeing: 68.0 + (avg - 0.6) * 1.5,
            ..GlobalMetrics::default()
        };
        assert_metrics_close(metrics, expected);
    }

    #[test]
    fn test_deontological_metric_update() {
        let (avg, metrics) = first_step_metrics("duty");
        let expected = GlobalMetrics {
            privacy_score: 75.0 + (avg - 0.5) * 3.0,
            freedom_index: 70.0 + (avg - 0.5) * 3.0,
            social_trust: 65.0 + (avg - 0.5) * 2.5,
            ..GlobalMetrics::default()
        };
        assert_metrics_close(metrics, expected);
    }

    #[test]
    fn test_resource_drift_includes_connection_bonus() {
        let mut engine = SimulationEngine::with_seed("empathic", 22);
        let mut agents = engine.get_state().agents;
        for agent in &mut agents {
            agent.connections.clear();
            set_personality(agent, 1.0);
            for amount in agent.resources.values_mut() {
                *amount = 50.0;
            }
        }
        // Star topology: agent-1 linked to all 23 others.
        let hub = agents[0].id.clone();
        for i in 1..agents.len() {
            let spoke = agents[i].id.clone();
            agents[0].connections.insert(spoke);
            agents[i].connections.insert(hub.clone());
        }
        engine.set_state(StatePatch {
            agents: Some(agents),
            ..StatePatch::default()
        });

        engine.step();

        let state = engine.state();
        // drift = (r - 0.45) * 2 + 0.1 * connections, r in [0, 1)
        for amount in state.agents[0].resources.values() {
            assert!(*amount >= 50.0 - 0.9 + 2.3 - 1e-9 && *amount < 50.0 + 1.1 + 2.3, "{amount}");
        }
        for agent in &state.agents[1..] {
            assert_eq!(agent.connection_count(), 1);
            for amount in agent.resources.values() {
                assert!(*amount >= 50.0 - 0.8 - 1e-9 && *amount < 50.0 + 1.2, "{amount}");
            }
        }
    }

    #[test]
    fn test_unhappy_agents_form_symmetric_links() {
        let mut engine = SimulationEngine::with_seed("empathic", 23);
        let mut agents = engine.get_state().agents;
        for agent in &mut agents {
            agent.connections.clear();
            set_personality(agent, 0.0);
        }
        engine.set_state(StatePatch {
            agents: Some(agents),
            ..StatePatch::default()
        });

        engine.step_n(3);

        let state = engine.state();
        let links: usize = state.agents.iter().map(|a| a.connection_count()).sum();
        // At most one new link per agent per step, counted on both ends.
        assert!(links > 0 && links <= 2 * state.agents.len() * 3);
        for agent in &state.agents {
            assert_eq!(agent.satisfaction_level, 0.0);
            assert!(!agent.connections.contains(&agent.id));
            for other in &agent.connections {
                assert!(state.agent(other).unwrap().is_connected_to(&agent.id));
            }
        }
    }

    #[test]
    fn test_content_agents_do_not_seek_links() {
        let mut engine = SimulationEngine::with_seed("empathic", 24);
        let mut agents = engine.get_state().agents;
        for agent in &mut agents {
            agent.connections.clear();
            set_personality(agent, 1.0);
        }
        engine.set_state(StatePatch {
            agents: Some(agents),
            ..StatePatch::default()
        });

        engine.step_n(3);
        assert!(engine.state().agents.iter().all(|a| a.connections.is_empty()));
    }

    #[test]
    fn test_change_scenario_drops_queued_persona_updates() {
        let bus = Arc::new(EventBus::new());
        let service = PersonaUpdateService::new(bus.clone());
        let mut engine = SimulationEngine::with_seed("empathic", 25);
        engine.attach_event_bus(bus.clone());
        engine.attach_persona_service(service.clone());

        for _ in 0..50 {
            let event = SimulationEvent::new(EventType::ConflictResolution, "mediation")
                .with_outcome(EventOutcome::Positive)
                .with_magnitude(1.0);
            bus.publish(SIMULATION_EVENTS_TOPIC, "agent-3", event, None);
        }
        assert_eq!(service.pending_len(), 50);

        assert!(engine.change_scenario("duty"));
        assert_eq!(service.pending_len(), 0);

        let fresh = engine.state().agent("agent-3").unwrap().updm.clone();
        engine.step();
        let after = &engine.state().agent("agent-3").unwrap().updm;
        assert_eq!(after.personality_traits, fresh.personality_traits);
        assert_eq!(after.value_system, fresh.value_system);
    }
}

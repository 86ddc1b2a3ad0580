//! Headless simulation runner.
//!
//! Steps the engine on a timer until the step budget is used up or Ctrl-C
//! arrives, then prints a JSON summary of the final state.
//!
//! # Environment Variables
//!
//! - `DEEP_DIVE_AGENTS`, `DEEP_DIVE_STEPS`, `DEEP_DIVE_SEED`,
//!   `DEEP_DIVE_TICK_MS`, `DEEP_DIVE_SCENARIO`, `DEEP_DIVE_EVENT_RATE`
//! - `RUST_LOG`: log filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin simulate -- optimized
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use deep_dive::catalog::Catalog;
use deep_dive::events::EventBus;
use deep_dive::persona::PersonaUpdateService;
use deep_dive::simulation::{SatisfactionEventPolicy, SimulationEngine, StatePatch};
use deep_dive::utilities::SimulationConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SimulationConfig::from_env().context("invalid simulation configuration")?;
    let scenario_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.default_scenario.clone());
    let tick = Duration::from_millis(config.tick_interval_ms.max(1));
    let event_rate = config.event_rate;

    let bus = Arc::new(EventBus::with_capacity(
        config.history_capacity,
        config.eviction_batch,
    ));
    let persona = PersonaUpdateService::with_limits(
        bus.clone(),
        config.confidence_threshold,
        config.history_capacity,
        config.eviction_batch,
    );

    let mut engine = SimulationEngine::with_config(&scenario_id, config, Catalog::builtin());
    engine.attach_event_bus(bus.clone());
    engine.attach_persona_service(persona.clone());
    engine.set_event_hook(SatisfactionEventPolicy::new(event_rate));
    engine.set_state(StatePatch::running(true));

    log::info!(
        "Running '{}' for {} steps every {:?}",
        engine.scenario().name,
        engine.state().total_steps,
        tick
    );

    let mut interval = tokio::time::interval(tick);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !engine.step() {
                    break;
                }
                let step = engine.state().current_step;
                if step % 10 == 0 {
                    let metrics = &engine.state().global_metrics;
                    let bus_stats = bus.statistics();
                    let persona_stats = persona.statistics();
                    log::info!(
                        "step {}: trust={:.1} efficiency={:.1} autonomy={:.1} wellbeing={:.1} messages={} persona_updates={}",
                        step,
                        metrics.social_trust,
                        metrics.resource_efficiency,
                        metrics.individual_autonomy,
                        metrics.community_wellbeing,
                        bus_stats.total_messages,
                        persona_stats.total_updates,
                    );
                }
            }
            _ = &mut ctrl_c => {
                log::warn!("Interrupted at step {}", engine.state().current_step);
                break;
            }
        }
    }

    engine.set_state(StatePatch::running(false));

    let state = engine.state();
    let summary = serde_json::json!({
        "scenario": state.selected_scenario,
        "currentStep": state.current_step,
        "totalSteps": state.total_steps,
        "globalMetrics": state.global_metrics,
        "successScore": engine.success_score(),
        "averageSatisfaction": average_satisfaction(&engine),
        "bus": bus.statistics(),
        "persona": persona.statistics(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    persona.destroy();
    Ok(())
}

fn average_satisfaction(engine: &SimulationEngine) -> f64 {
    let agents = &engine.state().agents;
    if agents.is_empty() {
        return 0.0;
    }
    agents.iter().map(|a| a.satisfaction_level).sum::<f64>() / agents.len() as f64
}

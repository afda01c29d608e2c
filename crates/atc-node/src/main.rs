//! ATC Node - drives one engine replica on tick timers.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atc_core::EngineConfig;
use atc_node::layout::{load_engine_config, SectorLayout};
use atc_node::loops;
use atc_node::{Config, NodeState, TrafficGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_json)?;

    tracing::info!("Starting ATC Node...");

    let layout = match &config.sectors_file {
        Some(path) => SectorLayout::load(path)?,
        None => SectorLayout::default_grid(),
    };
    let sectors = layout.to_sectors().context("invalid sector layout")?;
    let engine_config = match &config.engine_config_file {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    };

    let state = Arc::new(NodeState::new(engine_config, sectors, config.event_buffer)?);
    tracing::info!(
        sectors = layout.sectors.len(),
        conflict_ms = config.conflict_tick.as_millis() as u64,
        rebalance_ms = config.rebalance_tick.as_millis() as u64,
        health_ms = config.health_tick.as_millis() as u64,
        "Engine ready"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = vec![
        tokio::spawn(loops::event_log_loop::run_event_log_loop(
            state.subscribe(),
            shutdown_tx.subscribe(),
            config.log_json,
        )),
        tokio::spawn(loops::conflict_loop::run_conflict_loop(
            state.clone(),
            config.conflict_tick,
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(loops::rebalance_loop::run_rebalance_loop(
            state.clone(),
            config.rebalance_tick,
            shutdown_tx.subscribe(),
        )),
        tokio::spawn(loops::health_loop::run_health_loop(
            state.clone(),
            config.health_tick,
            shutdown_tx.subscribe(),
        )),
    ];

    if config.sim_flights > 0 {
        let extent = layout
            .extent_m()
            .context("sector layout has no sectors")?;
        let generator = TrafficGenerator::new(config.sim_seed, extent)?;
        tracing::info!(
            flights = config.sim_flights,
            seed = config.sim_seed,
            "Simulated traffic enabled"
        );
        tasks.push(tokio::spawn(loops::traffic_loop::run_traffic_loop(
            state.clone(),
            generator,
            config.sim_flights,
            config.sim_step,
            shutdown_tx.subscribe(),
        )));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(());
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Loop task failed: {}", e);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("atc_node=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

//! # washhubd — washhub daemon
//!
//! Composition root that wires all adapters together and runs the laundry
//! controller.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize logging
//! - Connect the FHEM power mediator (or run dry)
//! - Construct the in-memory data collaborator seeded from `[demo]`
//! - Construct the execution manager and feed it power samples
//! - Resume interrupted executions, start the optional demo execution and
//!   the safety sweep
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use washhub_adapter_fhem::FhemPowerSwitch;
use washhub_adapter_memory::{LogNotifier, MemoryStore};
use washhub_app::services::ExecutionManager;
use washhub_domain::event::{ExecutionEvent, ExecutionEventKind};
use washhub_domain::execution::Execution;
use washhub_domain::user::User;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Power mediator
    let (samples_tx, samples_rx) = mpsc::unbounded_channel();
    let power = Arc::new(
        FhemPowerSwitch::connect(config.fhem.clone(), samples_tx)
            .await
            .with_context(|| format!("failed to connect to {}", config.fhem.address()))?,
    );

    // Data collaborator
    let devices = config
        .demo_devices()
        .context("invalid [demo] device")?;
    tracing::info!(count = devices.len(), "managing devices");
    let store = Arc::new(MemoryStore::with_devices(devices));

    // Lifecycle
    let manager = ExecutionManager::new(Arc::clone(&power), Arc::clone(&store), LogNotifier);
    let events = tokio::spawn(log_events(manager.subscribe()));
    let listener = manager.spawn_power_listener(samples_rx);

    let resumed = manager
        .resume_interrupted()
        .await
        .context("failed to resume interrupted executions")?;
    if !resumed.is_empty() {
        tracing::info!(count = resumed.len(), "resumed interrupted executions");
    }
    if let Some(demo) = &config.demo.execution {
        let device = store
            .device(&demo.device)
            .with_context(|| format!("unknown demo device {}", demo.device))?;
        let program = demo
            .to_program()
            .context("invalid [demo.execution] program")?;
        if manager.tracked_execution(device.id).is_some() {
            tracing::info!(device = %device.name, "device busy, demo execution skipped");
        } else {
            match manager
                .start_execution(Execution::new(device, program, User::new(&demo.user)))
                .await
            {
                Ok(execution) => {
                    tracing::info!(execution_id = %execution.id, "demo execution started");
                }
                Err(err) => tracing::error!(error = %err, "failed to start demo execution"),
            }
        }
    }
    manager.start_safety_sweep(config.safety_sweep_interval());

    tracing::info!(dry_run = power.is_dry_run(), "washhubd running");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    manager.shutdown();
    listener.abort();
    power.shutdown().await;
    events.abort();

    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<ExecutionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let execution = &event.execution;
                match &event.kind {
                    ExecutionEventKind::Started => {
                        tracing::info!(execution_id = %execution.id, device = %execution.device.name, "execution started");
                    }
                    ExecutionEventKind::Finished { aborted } => {
                        tracing::info!(execution_id = %execution.id, device = %execution.device.name, aborted, "execution finished");
                    }
                    ExecutionEventKind::Failed { error } => {
                        tracing::warn!(execution_id = %execution.id, device = %execution.device.name, %error, "execution step failed");
                    }
                }
                if let Ok(json) = serde_json::to_string(&event) {
                    tracing::debug!(event = %json, "lifecycle event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagging behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chorus serve` command implementation.
//!
//! Opens the SQLite store, wires the OpenAI-compatible generator and the
//! sidecar connector into a `SessionManager`, starts every enabled account,
//! and serves the admin surface until SIGINT/SIGTERM.

use std::sync::Arc;

use chorus_agent::{SessionDeps, SessionManager, SessionRegistry, SessionSettings};
use chorus_bridge::BridgeConnector;
use chorus_config::ChorusConfig;
use chorus_core::{AdminStore, ChorusError};
use chorus_openai::OpenAiGenerator;
use chorus_storage::SqliteStore;
use tracing::{error, info};

use crate::admin::{self, AdminState};

pub async fn run_serve(config: ChorusConfig) -> Result<(), ChorusError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, "starting chorus serve");

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;

    let generator = Arc::new(OpenAiGenerator::new(&config.generation)?);
    let connector = Arc::new(BridgeConnector::new(config.bridge.clone()));
    let deps = SessionDeps::new(
        Arc::clone(&store) as Arc<dyn AdminStore>,
        connector,
        generator,
        SessionSettings::from_config(&config),
    );
    let manager = Arc::new(SessionManager::new(deps));

    let cancel = chorus_agent::install_signal_handler();

    let admin_task = if config.admin.enabled {
        let state = AdminState {
            registry: Arc::clone(&manager) as Arc<dyn SessionRegistry>,
            store: Arc::clone(&store) as Arc<dyn AdminStore>,
        };
        let admin_config = config.admin.clone();
        let shutdown = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(&admin_config, state, shutdown).await {
                error!(error = %e, "admin server failed");
            }
        }))
    } else {
        info!("admin surface disabled");
        None
    };

    match manager.start_enabled().await {
        Ok(started) => info!(started, "chorus is running"),
        Err(e) => {
            error!(error = %e, "failed to load enabled accounts");
            cancel.cancel();
        }
    }

    cancel.cancelled().await;
    info!("shutdown requested");

    manager.shutdown().await;
    if let Some(task) = admin_task {
        let _ = task.await;
    }
    store.close().await?;

    info!("chorus stopped");
    Ok(())
}

/// Initialize the tracing subscriber; `RUST_LOG` overrides `service.log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chorus={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

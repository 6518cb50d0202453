//! Gateway wiring: driver client, supervisor task, and HTTP listener.

pub mod cli;
pub mod config;
pub mod driver;
pub mod http;
pub mod logging;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use wweb::{BackendClient, Supervisor, SupervisorConfig};

use crate::config::GatewayConfig;
use crate::driver::DriverClient;
use crate::http::{AppState, router};

/// Starts the driver, the supervisor, and the HTTP API, then serves until the
/// listener fails. Backend instability after startup is the supervisor's
/// problem; it never takes the listener down.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let client: Arc<dyn BackendClient> =
        DriverClient::spawn(&config.driver, event_tx).context("starting driver process")?;

    let supervisor_config = SupervisorConfig {
        policy: config.policy.clone(),
        classifier: Default::default(),
        session_dirs: config.session_dirs.clone(),
    };
    let (supervisor, handle) = Supervisor::new(Arc::clone(&client), event_rx, supervisor_config);
    tokio::spawn(supervisor.run());

    // First connection attempt. Failures route through the classifier like
    // any other failure signal rather than aborting startup.
    tokio::spawn({
        let client = Arc::clone(&client);
        let handle = handle.clone();
        async move {
            if let Err(err) = client.initialize().await {
                handle.report_failure(err.to_string());
            }
        }
    });

    let app = router(AppState {
        supervisor: handle,
        client,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    info!(target = "wweb", port = config.port, "HTTP API listening");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

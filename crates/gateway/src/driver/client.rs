//! Driver-backed implementation of the backend client boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wweb::{BackendClient, ChatId, ClientEvent, Result, SendOptions, WwebError};

use super::process::{self, DriverConfig};
use super::transport::{self, Transport};

/// Backend client speaking to a spawned whatsapp-web.js driver process.
///
/// Lifecycle events and stray automation-layer errors from the driver are
/// forwarded to the supervisor's event channel; stderr lines become
/// [`ClientEvent::Failure`] signals so they pass through the failure
/// classifier instead of disappearing.
pub struct DriverClient {
    transport: Arc<Transport>,
}

impl DriverClient {
    /// Spawns the driver process and the tasks that read from it.
    pub fn spawn(config: &DriverConfig, events: mpsc::UnboundedSender<ClientEvent>) -> Result<Arc<Self>> {
        let mut child = process::spawn(config)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WwebError::Driver("driver stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WwebError::Driver("driver stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| WwebError::Driver("driver stderr not captured".to_string()))?;

        let transport = Transport::new(stdin);
        tokio::spawn(transport::read_messages(stdout, Arc::clone(&transport), events.clone()));
        tokio::spawn(read_stderr(stderr, events));
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(target = "wweb.driver", %status, "driver process exited"),
                Err(err) => warn!(target = "wweb.driver", error = %err, "failed to reap driver process"),
            }
        });

        Ok(Arc::new(Self { transport }))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.transport.request(method, params).await
    }
}

#[async_trait]
impl BackendClient for DriverClient {
    async fn initialize(&self) -> Result<()> {
        self.call("initialize", json!({})).await.map(|_| ())
    }

    async fn destroy(&self) -> Result<()> {
        self.call("destroy", json!({})).await.map(|_| ())
    }

    async fn is_registered_user(&self, chat_id: &ChatId) -> Result<bool> {
        let result = self.call("isRegisteredUser", json!({ "chatId": chat_id.as_str() })).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str, options: SendOptions) -> Result<()> {
        self.call(
            "sendMessage",
            json!({
                "chatId": chat_id.as_str(),
                "message": text,
                "sendSeen": !options.suppress_read_receipt,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn get_state(&self) -> Result<String> {
        let result = self.call("getState", json!({})).await?;
        Ok(result.as_str().unwrap_or("UNKNOWN").to_string())
    }
}

/// Driver stderr is where the automation layer's uncaught errors surface;
/// each line is routed through the classifier as a failure signal.
async fn read_stderr(stderr: ChildStderr, events: mpsc::UnboundedSender<ClientEvent>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let _ = events.send(ClientEvent::Failure(line));
    }
}

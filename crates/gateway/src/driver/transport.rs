//! Line-delimited JSON wire protocol to the driver process.
//!
//! Requests carry an `id`, a `method`, and `params`; the driver answers with
//! a message bearing the same `id` and either `result` or `error`. Messages
//! without an `id` are lifecycle events. Correlation uses a pending-request
//! map of oneshot senders keyed by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use wweb::{ClientEvent, Result, WwebError};

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u32,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u32,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DriverEvent {
    event: String,
    #[serde(default)]
    params: Value,
}

/// Distinguished by the presence of `id`: responses have one, events don't.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Message {
    Response(Response),
    Event(DriverEvent),
}

pub(super) struct Transport {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: parking_lot::Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>,
    next_id: AtomicU32,
}

impl Transport {
    pub(super) fn new(stdin: ChildStdin) -> Arc<Self> {
        Arc::new(Self {
            stdin: tokio::sync::Mutex::new(stdin),
            pending: parking_lot::Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(0),
        })
    }

    /// Sends one request and awaits its correlated response.
    pub(super) async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let payload = serde_json::to_string(&Request { id, method, params })?;
        let write_result = async {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(payload.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(err) = write_result {
            self.pending.lock().remove(&id);
            return Err(WwebError::Driver(format!("failed writing {method} request: {err}")));
        }

        rx.await
            .map_err(|_| WwebError::Driver(format!("driver closed before answering {method}")))?
    }

    fn resolve(&self, response: Response) {
        let Some(tx) = self.pending.lock().remove(&response.id) else {
            warn!(target = "wweb.driver", id = response.id, "response for unknown request id");
            return;
        };
        let result = match response.error {
            Some(error) => Err(WwebError::Backend(error.message)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        let _ = tx.send(result);
    }

    /// Fails all in-flight requests, used when the driver goes away.
    fn abort_pending(&self, reason: &str) {
        for (_, tx) in self.pending.lock().drain() {
            let _ = tx.send(Err(WwebError::Driver(reason.to_string())));
        }
    }
}

/// Reads driver stdout until EOF, correlating responses and forwarding
/// lifecycle events to the supervisor's channel.
pub(super) async fn read_messages(
    stdout: ChildStdout,
    transport: Arc<Transport>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Message>(&line) {
                    Ok(Message::Response(response)) => transport.resolve(response),
                    Ok(Message::Event(event)) => {
                        if let Some(event) = translate_event(event) {
                            let _ = events.send(event);
                        }
                    }
                    Err(err) => {
                        warn!(target = "wweb.driver", error = %err, "malformed driver message");
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(target = "wweb.driver", error = %err, "driver stdout read failed");
                break;
            }
        }
    }
    transport.abort_pending("driver stdout closed");
    let _ = events.send(ClientEvent::Failure("driver process closed its stdout".to_string()));
    debug!(target = "wweb.driver", "driver message loop ended");
}

fn translate_event(event: DriverEvent) -> Option<ClientEvent> {
    match event.event.as_str() {
        "qr" => {
            let code = event.params.get("qr").and_then(Value::as_str)?;
            Some(ClientEvent::PairingCode(code.to_string()))
        }
        "authenticated" => Some(ClientEvent::Authenticated),
        "ready" => Some(ClientEvent::Ready),
        "auth_failure" => Some(ClientEvent::AuthFailure),
        "disconnected" => {
            let reason = event
                .params
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            Some(ClientEvent::Disconnected(reason))
        }
        "error" => {
            let message = event
                .params
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or("driver reported an error with no message")
                .to_string();
            Some(ClientEvent::Failure(message))
        }
        other => {
            debug!(target = "wweb.driver", event = %other, "ignoring unknown driver event");
            None
        }
    }
}

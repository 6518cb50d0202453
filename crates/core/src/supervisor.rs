//! Session lifecycle supervision.
//!
//! One supervisor task owns the session state, the pairing credential, and
//! the reinitialization timer. It consumes backend lifecycle events and
//! commands from the HTTP surface on two channels and selects over them
//! together with the armed timer, so there is a single logical thread of
//! control: destroy/initialize pairs never interleave, and at most one reinit
//! timer and one in-flight reinit sequence exist at any time.
//!
//! Everything outside the task reads state through [`SupervisorHandle`]
//! accessors and mutates it only via the handle's documented entry points.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::classify::{Classification, ClassifierTable};
use crate::client::BackendClient;
use crate::error::{Result, WwebError};
use crate::event::ClientEvent;
use crate::qr::PairingCredential;
use crate::types::SessionState;

/// Timing knobs for the reinitialization cycle.
///
/// A failed attempt usually means the browser process is in a worse state and
/// needs longer to settle before the next try, so `failed_delay` is well
/// above `base_delay` to avoid a hot retry loop against a backend that is
/// still tearing down.
#[derive(Debug, Clone)]
pub struct ReinitPolicy {
    /// Delay before a reinit attempt when the previous attempt succeeded.
    pub base_delay: Duration,
    /// Delay when the previous attempt failed.
    pub failed_delay: Duration,
    /// Bound on the best-effort `destroy()` preceding `initialize()`.
    pub destroy_timeout: Duration,
}

impl Default for ReinitPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(18),
            failed_delay: Duration::from_secs(45),
            destroy_timeout: Duration::from_secs(10),
        }
    }
}

/// Supervisor configuration.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub policy: ReinitPolicy,
    pub classifier: ClassifierTable,
    /// On-disk session/credential directories removed by `clear_session`.
    pub session_dirs: Vec<PathBuf>,
}

/// The single scheduled-reconnection slot.
///
/// `in_progress` is true from the moment a reinit is scheduled until the
/// destroy+initialize sequence settles; it suppresses duplicate scheduling.
/// Arming a new deadline replaces any unfired one, never stacks.
#[derive(Debug, Default)]
struct ReinitJob {
    deadline: Option<Instant>,
    in_progress: bool,
    last_attempt_failed: bool,
}

/// State readable by the HTTP surface; written only by the supervisor task.
struct Shared {
    state: RwLock<SessionState>,
    credential: RwLock<Option<Arc<PairingCredential>>>,
}

enum Command {
    ScheduleReinit,
    Failure(String),
    SessionInvalidated(String),
    ClearSession(oneshot::Sender<Result<()>>),
}

/// Cheap handle for reading supervisor state and invoking its entry points.
#[derive(Clone)]
pub struct SupervisorHandle {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SupervisorHandle {
    /// Current session state snapshot.
    pub fn state(&self) -> SessionState {
        *self.shared.state.read()
    }

    /// Whether outbound sends are admissible right now.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// The live pairing credential, if one is awaiting a scan.
    pub fn credential(&self) -> Option<Arc<PairingCredential>> {
        self.shared.credential.read().clone()
    }

    /// Requests a debounced reinitialization cycle.
    pub fn schedule_reinit(&self) {
        let _ = self.commands.send(Command::ScheduleReinit);
    }

    /// Routes an out-of-band failure signal through the classifier.
    pub fn report_failure(&self, message: impl Into<String>) {
        let _ = self.commands.send(Command::Failure(message.into()));
    }

    /// Marks the session invalidated mid-request and schedules recovery.
    pub fn session_invalidated(&self, message: impl Into<String>) {
        let _ = self.commands.send(Command::SessionInvalidated(message.into()));
    }

    /// Wipes on-disk session storage and forces a fresh pairing cycle.
    pub async fn clear_session(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::ClearSession(tx))
            .map_err(|_| WwebError::SupervisorGone)?;
        rx.await.map_err(|_| WwebError::SupervisorGone)?
    }
}

/// The supervisor task. Construct with [`Supervisor::new`] and drive it with
/// [`Supervisor::run`] on its own task.
pub struct Supervisor {
    client: Arc<dyn BackendClient>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    config: SupervisorConfig,
    reinit: ReinitJob,
}

enum Tick {
    Event(ClientEvent),
    Command(Command),
    TimerFired,
    Closed,
}

impl Supervisor {
    pub fn new(
        client: Arc<dyn BackendClient>,
        events: mpsc::UnboundedReceiver<ClientEvent>,
        config: SupervisorConfig,
    ) -> (Self, SupervisorHandle) {
        let shared = Arc::new(Shared {
            state: RwLock::new(SessionState::Uninitialized),
            credential: RwLock::new(None),
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = SupervisorHandle {
            shared: Arc::clone(&shared),
            commands: command_tx,
        };
        let supervisor = Self {
            client,
            events,
            commands: command_rx,
            shared,
            config,
            reinit: ReinitJob::default(),
        };
        (supervisor, handle)
    }

    /// Event loop. Runs until both inbound channels close.
    pub async fn run(mut self) {
        loop {
            let deadline = self.reinit.deadline;
            let tick = tokio::select! {
                maybe_event = self.events.recv() => match maybe_event {
                    Some(event) => Tick::Event(event),
                    None => Tick::Closed,
                },
                maybe_command = self.commands.recv() => match maybe_command {
                    Some(command) => Tick::Command(command),
                    None => Tick::Closed,
                },
                _ = wait_deadline(deadline) => Tick::TimerFired,
            };

            match tick {
                Tick::Event(event) => self.on_event(event),
                Tick::Command(command) => self.on_command(command).await,
                Tick::TimerFired => {
                    self.reinit.deadline = None;
                    self.run_reinit().await;
                }
                Tick::Closed => break,
            }
        }
        debug!(target = "wweb.session", "supervisor loop ended");
    }

    fn on_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::PairingCode(raw) => match PairingCredential::render(&raw) {
                Ok(credential) => {
                    info!(target = "wweb.session", "pairing credential issued; open /qr to scan");
                    *self.shared.credential.write() = Some(Arc::new(credential));
                    self.set_state(SessionState::AwaitingPairing);
                }
                Err(err) => {
                    warn!(target = "wweb.session", error = %err, "failed to render pairing credential");
                    *self.shared.credential.write() = None;
                }
            },
            ClientEvent::Authenticated => {
                info!(target = "wweb.session", "backend authenticated; session loading");
                self.set_state(SessionState::Authenticated);
            }
            ClientEvent::Ready => {
                *self.shared.credential.write() = None;
                self.set_state(SessionState::Ready);
                info!(target = "wweb.session", "backend session ready");
            }
            ClientEvent::AuthFailure => {
                warn!(target = "wweb.session", "backend authentication failed");
            }
            ClientEvent::Disconnected(reason) => {
                warn!(target = "wweb.session", %reason, "backend disconnected");
                self.set_state(SessionState::Disconnected);
                self.schedule_reinit();
            }
            ClientEvent::Failure(message) => self.on_failure(&message),
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::ScheduleReinit => self.schedule_reinit(),
            Command::Failure(message) => self.on_failure(&message),
            Command::SessionInvalidated(message) => {
                warn!(
                    target = "wweb.session",
                    message = %excerpt(&message),
                    "session invalidated mid-request"
                );
                self.set_state(SessionState::Disconnected);
                self.schedule_reinit();
            }
            Command::ClearSession(reply) => {
                let result = self.clear_session().await;
                let _ = reply.send(result);
            }
        }
    }

    fn on_failure(&mut self, message: &str) {
        match self.config.classifier.classify(message) {
            Classification::Retryable => {
                warn!(
                    target = "wweb.session",
                    message = %excerpt(message),
                    "transient backend failure; scheduling reinit"
                );
                self.schedule_reinit();
            }
            Classification::AuthTimeout => {
                warn!(
                    target = "wweb.session",
                    "pairing timed out before the backend settled; scheduling reinit"
                );
                self.schedule_reinit();
            }
            Classification::Fatal => {
                error!(
                    target = "wweb.session",
                    message = %message,
                    "unrecognized backend failure; not retrying"
                );
            }
        }
    }

    /// Arms the reinit timer. No-op while a job is pending or in progress.
    fn schedule_reinit(&mut self) {
        if self.reinit.in_progress {
            debug!(target = "wweb.session", "reinit already pending; ignoring");
            return;
        }
        self.reinit.in_progress = true;
        self.set_state(SessionState::Reinitializing);

        let delay = if self.reinit.last_attempt_failed {
            self.config.policy.failed_delay
        } else {
            self.config.policy.base_delay
        };
        info!(
            target = "wweb.session",
            delay_secs = delay.as_secs(),
            "reinitializing backend client after delay"
        );
        self.reinit.deadline = Some(Instant::now() + delay);
    }

    /// The destroy+initialize sequence, entered only from the timer arm.
    async fn run_reinit(&mut self) {
        if let Err(err) = self.destroy_with_timeout().await {
            debug!(target = "wweb.session", error = %err, "best-effort destroy failed before reinit");
        }
        match self.client.initialize().await {
            Ok(()) => {
                self.reinit.last_attempt_failed = false;
            }
            Err(err) => {
                self.reinit.last_attempt_failed = true;
                warn!(target = "wweb.session", error = %err, "backend reinitialization failed");
            }
        }
        self.reinit.in_progress = false;
    }

    async fn clear_session(&mut self) -> Result<()> {
        self.reinit.deadline = None;
        self.reinit.in_progress = false;
        self.reinit.last_attempt_failed = false;
        *self.shared.credential.write() = None;
        self.set_state(SessionState::Uninitialized);

        if let Err(err) = self.destroy_with_timeout().await {
            debug!(target = "wweb.session", error = %err, "best-effort destroy failed during clear");
        }

        for dir in &self.config.session_dirs {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {
                    info!(target = "wweb.session", path = %dir.display(), "removed session directory");
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        target = "wweb.session",
                        path = %dir.display(),
                        error = %err,
                        "failed to remove session directory"
                    );
                }
            }
        }

        self.client.initialize().await
    }

    async fn destroy_with_timeout(&self) -> Result<()> {
        match tokio::time::timeout(self.config.policy.destroy_timeout, self.client.destroy()).await {
            Ok(result) => result,
            Err(_) => Err(WwebError::Timeout("backend destroy")),
        }
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.shared.state.write();
        if *state != next {
            debug!(target = "wweb.session", from = %*state, to = %next, "session state changed");
            *state = next;
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Failure messages from the automation layer can embed whole stack traces;
/// log lines keep only the head.
fn excerpt(message: &str) -> &str {
    match message.char_indices().nth(120) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;

    fn start(
        client: Arc<FakeBackend>,
        config: SupervisorConfig,
    ) -> (SupervisorHandle, mpsc::UnboundedSender<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (supervisor, handle) = Supervisor::new(client, event_rx, config);
        tokio::spawn(supervisor.run());
        (handle, event_tx)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..2000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_schedule_requests_run_one_reinit() {
        let client = FakeBackend::new();
        let (handle, _events) = start(Arc::clone(&client), SupervisorConfig::default());

        for _ in 0..5 {
            handle.schedule_reinit();
        }
        wait_for(|| client.calls().initialize == 1).await;

        // Nothing further is armed once the sequence settles.
        tokio::time::sleep(ReinitPolicy::default().failed_delay * 2).await;
        let calls = client.calls();
        assert_eq!(calls.initialize, 1);
        assert_eq!(calls.destroy, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reinit_clears_readiness_while_pending() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        events.send(ClientEvent::Ready).unwrap();
        wait_for(|| handle.is_ready()).await;

        handle.schedule_reinit();
        wait_for(|| handle.state() == SessionState::Reinitializing).await;
        assert!(!handle.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_extends_next_delay() {
        let client = FakeBackend::new();
        client.fail_initialize(true);
        let policy = ReinitPolicy::default();
        let (handle, _events) = start(Arc::clone(&client), SupervisorConfig::default());

        let started = Instant::now();
        handle.schedule_reinit();
        wait_for(|| client.calls().initialize == 1).await;
        let first = started.elapsed();
        assert!(first >= policy.base_delay);
        assert!(first < policy.failed_delay);

        client.fail_initialize(false);
        let restarted = Instant::now();
        handle.schedule_reinit();
        wait_for(|| client.calls().initialize == 2).await;
        let second = restarted.elapsed();
        assert!(second >= policy.failed_delay);
        assert!(second > first);

        // A successful attempt drops back to the base delay.
        let again = Instant::now();
        handle.schedule_reinit();
        wait_for(|| client.calls().initialize == 3).await;
        assert!(again.elapsed() < policy.failed_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_schedules_exactly_one_reinit() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        // Already not ready; a second disconnect must not stack another timer.
        events.send(ClientEvent::Disconnected("NAVIGATION".to_string())).unwrap();
        events.send(ClientEvent::Disconnected("NAVIGATION".to_string())).unwrap();
        wait_for(|| handle.state() == SessionState::Reinitializing).await;

        wait_for(|| client.calls().initialize == 1).await;
        tokio::time::sleep(ReinitPolicy::default().failed_delay * 2).await;
        assert_eq!(client.calls().initialize, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failure_signal_triggers_reinit() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        events
            .send(ClientEvent::Failure(
                "Protocol error (Network.getResponseBody): No resource".to_string(),
            ))
            .unwrap();
        wait_for(|| handle.state() == SessionState::Reinitializing).await;
        wait_for(|| client.calls().initialize == 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_signal_does_not_schedule_reinit() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        events.send(ClientEvent::Failure("segmentation fault".to_string())).unwrap();
        tokio::time::sleep(ReinitPolicy::default().failed_delay * 2).await;

        assert_eq!(handle.state(), SessionState::Uninitialized);
        assert_eq!(client.calls().initialize, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_credential_replaces_live_one() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        events.send(ClientEvent::PairingCode("1@first".to_string())).unwrap();
        wait_for(|| handle.credential().is_some()).await;
        assert_eq!(handle.credential().unwrap().raw(), "1@first");
        assert_eq!(handle.state(), SessionState::AwaitingPairing);

        events.send(ClientEvent::PairingCode("1@second".to_string())).unwrap();
        wait_for(|| handle.credential().is_some_and(|c| c.raw() == "1@second")).await;
    }

    #[tokio::test(start_paused = true)]
    async fn entering_ready_clears_credential() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        events.send(ClientEvent::PairingCode("1@code".to_string())).unwrap();
        wait_for(|| handle.credential().is_some()).await;

        events.send(ClientEvent::Ready).unwrap();
        wait_for(|| handle.is_ready()).await;
        assert!(handle.credential().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_session_releases_pending_job() {
        let client = FakeBackend::new();
        let (handle, events) = start(Arc::clone(&client), SupervisorConfig::default());

        // Leave a job pending, then clear under it.
        handle.schedule_reinit();
        wait_for(|| handle.state() == SessionState::Reinitializing).await;

        handle.clear_session().await.unwrap();
        assert_eq!(handle.state(), SessionState::Uninitialized);
        assert_eq!(client.calls().initialize, 1);

        // No residual lock: a fresh credential and a fresh reinit both work.
        events.send(ClientEvent::PairingCode("1@fresh".to_string())).unwrap();
        wait_for(|| handle.credential().is_some()).await;

        handle.schedule_reinit();
        wait_for(|| client.calls().initialize == 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn clear_session_removes_session_directories() {
        let data_dir = tempfile::tempdir().unwrap();
        let session_dir = data_dir.path().join("session");
        let auth_dir = data_dir.path().join(".wwebjs_auth");
        std::fs::create_dir_all(&session_dir).unwrap();
        std::fs::create_dir_all(&auth_dir).unwrap();

        let client = FakeBackend::new();
        let config = SupervisorConfig {
            session_dirs: vec![session_dir.clone(), auth_dir.clone()],
            ..SupervisorConfig::default()
        };
        let (handle, _events) = start(Arc::clone(&client), config);

        handle.clear_session().await.unwrap();
        assert!(!session_dir.exists());
        assert!(!auth_dir.exists());

        // Missing directories are not an error on a second clear.
        handle.clear_session().await.unwrap();
        assert_eq!(client.calls().initialize, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wedged_destroy_does_not_block_reinit() {
        let client = FakeBackend::new();
        client.hang_destroy(true);
        let (handle, _events) = start(Arc::clone(&client), SupervisorConfig::default());

        handle.schedule_reinit();
        wait_for(|| client.calls().initialize == 1).await;
        assert_eq!(client.calls().destroy, 1);
        assert!(handle.state() != SessionState::Ready);
    }
}

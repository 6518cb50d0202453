//! Driver process lifecycle.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use wweb::{Result, WwebError};

/// How the gateway launches the whatsapp-web.js driver script.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Interpreter for the driver script, normally `node`.
    pub command: String,
    pub script: PathBuf,
    /// Browser executable handed to the automation layer.
    pub browser_path: Option<PathBuf>,
    /// Root under which the driver keeps its session storage.
    pub data_dir: PathBuf,
    /// How long the driver waits for pairing before reporting auth timeout.
    pub auth_timeout: Duration,
}

pub(super) fn spawn(config: &DriverConfig) -> Result<Child> {
    let mut command = Command::new(&config.command);
    command
        .arg(&config.script)
        .env("WWEB_DATA_DIR", &config.data_dir)
        .env("WWEB_AUTH_TIMEOUT_MS", config.auth_timeout.as_millis().to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(path) = &config.browser_path {
        command.env("PUPPETEER_EXECUTABLE_PATH", path);
    }

    command.spawn().map_err(|err| {
        WwebError::Driver(format!(
            "failed to spawn driver `{} {}`: {err}",
            config.command,
            config.script.display()
        ))
    })
}

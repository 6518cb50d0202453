//! Gateway configuration assembled from CLI flags and environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use wweb::ReinitPolicy;

use crate::cli::Cli;
use crate::driver::DriverConfig;

const DEFAULT_PORT: u16 = 3000;

/// Pairing can take minutes on slow hosts; give the page plenty of time to
/// load before the driver reports an auth timeout.
const AUTH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub driver: DriverConfig,
    pub policy: ReinitPolicy,
    /// Directories deleted by `POST /session/clear`.
    pub session_dirs: Vec<PathBuf>,
}

impl GatewayConfig {
    pub fn from_cli(cli: Cli) -> Self {
        let port = cli
            .port
            .or_else(|| std::env::var("PORT").ok().and_then(|raw| raw.parse().ok()))
            .unwrap_or(DEFAULT_PORT);

        let browser_path = cli
            .browser_path
            .or_else(|| env_path("WWEB_BROWSER_PATH"))
            .or_else(|| env_path("PUPPETEER_EXECUTABLE_PATH"));

        let session_dirs = vec![cli.data_dir.join("session"), cli.data_dir.join(".wwebjs_auth")];

        Self {
            port,
            driver: DriverConfig {
                command: cli.driver_command,
                script: cli.driver_script,
                browser_path,
                data_dir: cli.data_dir,
                auth_timeout: AUTH_TIMEOUT,
            },
            policy: ReinitPolicy {
                base_delay: Duration::from_secs(cli.reinit_delay_secs),
                failed_delay: Duration::from_secs(cli.reinit_failed_delay_secs),
                ..ReinitPolicy::default()
            },
            session_dirs,
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).filter(|value| !value.is_empty()).map(PathBuf::from)
}

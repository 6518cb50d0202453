use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "wwebd", version, about = "HTTP gateway supervising a single WhatsApp Web session")]
pub struct Cli {
    /// Port for the HTTP API (falls back to $PORT, then 3000)
    #[arg(long)]
    pub port: Option<u16>,

    /// Command used to run the driver script
    #[arg(long, default_value = "node")]
    pub driver_command: String,

    /// Path to the whatsapp-web.js driver script
    #[arg(long, default_value = "wweb-driver.js")]
    pub driver_script: PathBuf,

    /// Browser executable handed to the automation layer
    /// (falls back to $WWEB_BROWSER_PATH, then $PUPPETEER_EXECUTABLE_PATH)
    #[arg(long)]
    pub browser_path: Option<PathBuf>,

    /// Directory holding the backend's on-disk session storage
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Delay before a reinitialization attempt, in seconds
    #[arg(long, default_value_t = 18)]
    pub reinit_delay_secs: u64,

    /// Delay after a failed reinitialization attempt, in seconds
    #[arg(long, default_value_t = 45)]
    pub reinit_failed_delay_secs: u64,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

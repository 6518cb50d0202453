use clap::Parser;
use tracing::error;
use wweb_gateway::{cli::Cli, config::GatewayConfig, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = GatewayConfig::from_cli(cli);
    if let Err(err) = wweb_gateway::run(config).await {
        error!(target = "wweb", error = %err, "gateway failed");
        std::process::exit(1);
    }
}

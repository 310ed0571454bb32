use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;

use telemetry_relay::config::{Config, ConfigError};
use telemetry_relay::{Relay, RelayError};

#[derive(Parser)]
#[command(name = "telemetry-relay")]
#[command(about = "Broadcast simulated vehicle telemetry to WebSocket clients on every UDP tick")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<String>,
    /// UDP bind address, e.g. 0.0.0.0:14551
    #[arg(long)]
    udp_bind: Option<String>,
    /// WebSocket bind address, e.g. 0.0.0.0:5000
    #[arg(long)]
    ws_bind: Option<String>,
    /// Per-subscriber send deadline, e.g. 250ms
    #[arg(long, value_parser = humantime::parse_duration)]
    send_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", RelayError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(bind) = &cli.udp_bind {
        config.udp.bind = bind.clone();
    }
    if let Some(bind) = &cli.ws_bind {
        config.web.bind = bind.clone();
    }
    if let Some(timeout) = cli.send_timeout {
        config.hub.send_timeout = timeout;
    }
    Ok(config)
}

async fn run(config: Config) -> Result<(), RelayError> {
    log::info!("Telemetry relay starting");
    let relay = Relay::bind(&config).await?;
    relay.run().await
}

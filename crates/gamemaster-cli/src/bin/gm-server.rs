use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use gamemaster_runner::Server;
use gamemaster_runner::config::{ConfigLoadError, GamemasterConfig};
use gamemaster_runner::logging::init_logging;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "gm-server")]
#[command(version = env!("VERSION_STRING"), about = "Keeps attached games moving through their phases")]
pub struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/gamemaster/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write an example config to the config path and exit
    #[arg(long)]
    init_config: bool,

    /// Interface to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Control-plane port
    #[arg(short, long)]
    port: Option<u16>,

    /// Operate games on an in-memory chain; no operator account needed
    #[arg(short, long)]
    debug: bool,

    /// JSON-RPC endpoint of the signing node
    #[arg(long)]
    rpc_endpoint: Option<String>,

    /// Account forcing transactions are sent from
    #[arg(long)]
    operator_account: Option<String>,

    /// Milliseconds between two ticks of an operator
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Milliseconds to wait for an operator to acknowledge a stop
    #[arg(long)]
    cancel_timeout_ms: Option<u64>,

    /// Also log to the data directory
    #[arg(long)]
    log_file: bool,
}

impl Args {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(GamemasterConfig::config_path)
    }

    /// File (or defaults when there is none) with flags layered on top
    fn resolve(&self) -> Result<GamemasterConfig, ConfigLoadError> {
        let mut config = match GamemasterConfig::load_from(&self.config_path()) {
            Ok(config) => config,
            Err(ConfigLoadError::NotFound(path)) => {
                info!("No config at {}, using defaults", path.display());
                GamemasterConfig::default()
            }
            Err(e) => return Err(e),
        };

        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.debug {
            config.server.debug = true;
        }
        if let Some(endpoint) = &self.rpc_endpoint {
            config.chain.rpc_endpoint = endpoint.clone();
        }
        if let Some(account) = &self.operator_account {
            config.chain.operator_account = Some(account.clone());
        }
        if let Some(interval) = self.tick_interval_ms {
            config.chain.tick_interval_ms = interval;
        }
        if let Some(timeout) = self.cancel_timeout_ms {
            config.server.cancel_timeout_ms = Some(timeout);
        }
        Ok(config)
    }
}

fn create_example_config(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut example = GamemasterConfig::default();
    example.chain.operator_account = Some("0x0000000000000000000000000000000000000000".to_string());
    example.save_to(path)?;
    eprintln!("Config file created at: {}", path.display());
    eprintln!("Set chain.operator_account, then run gm-server again.");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match init_logging("server", args.log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.init_config {
        return match create_example_config(&args.config_path()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Failed to write example config: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting gamemaster on {}", config.server);
    let server = match Server::start(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }

    info!("Shutting down");
    server.shutdown().await;
    ExitCode::SUCCESS
}

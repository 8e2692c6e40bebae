//! dialflow server binary
//!
//! Configuration comes from the environment (see `config.rs`); the few
//! flags here exist for local overrides. Exits 0 on graceful shutdown and
//! 1 when initialization fails.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dialflow_campaign_engine::config::AppConfig;
use dialflow_campaign_engine::server::DialerServer;

#[derive(Parser, Debug)]
#[command(name = "dialflow-server", about = "Outbound voice-campaign dialer")]
struct Args {
    /// HTTP listen port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Store connection, e.g. sqlite:dialflow.db
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Telephony fabric endpoint
    #[arg(long, env = "LIVEKIT_URL")]
    livekit_url: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(mut config) => {
            if let Some(port) = args.port {
                config.port = port;
            }
            if let Some(database_url) = args.database_url {
                config.database_url = database_url;
            }
            if let Some(livekit_url) = args.livekit_url {
                config.livekit_url = livekit_url;
            }
            config
        }
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    info!("🚀 Starting dialflow server on port {}", config.port);

    let server = match DialerServer::new(config).await {
        Ok(server) => server,
        Err(err) => {
            error!("Failed to initialize dialer server: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = server.run().await {
        error!("Server error: {}", err);
        std::process::exit(1);
    }
}

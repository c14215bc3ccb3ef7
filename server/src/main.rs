use clap::Parser;
use log::{error, info};
use server::{Server, ServerConfig, SessionPolicy};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Maximum number of simultaneous connections
    #[clap(short, long, default_value = "256")]
    max_connections: usize,
    /// Seconds a session may go without any connected player before it is abandoned
    #[clap(long, default_value = "60")]
    grace_secs: u64,
    /// Seconds a finished game stays rejoinable before it is retired
    #[clap(long, default_value = "30")]
    retention_secs: u64,
    /// Milliseconds between session reaper passes
    #[clap(long, default_value = "1000")]
    reap_interval_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_connections: self.max_connections,
            reap_interval: Duration::from_millis(self.reap_interval_ms),
            policy: SessionPolicy {
                grace_period: Duration::from_secs(self.grace_secs),
                finished_retention: Duration::from_secs(self.retention_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Args::parse().into_config();
    info!(
        "Starting server on {} (max {} connections, {:?} grace)",
        config.bind_addr, config.max_connections, config.policy.grace_period
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Seconds a player may take to answer before being kicked (0 = never)
    #[arg(short = 't', long, default_value = "300")]
    request_timeout_secs: u64,

    /// How often to look for players who took too long, in milliseconds
    #[arg(long, default_value = "1000")]
    sweep_interval_ms: u64,

    /// Open a game with code "ffff" at startup
    #[arg(short, long)]
    dev_mode: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            request_timeout: (args.request_timeout_secs > 0)
                .then(|| Duration::from_secs(args.request_timeout_secs)),
            sweep_interval: Duration::from_millis(args.sweep_interval_ms.max(1)),
            dev_mode: args.dev_mode,
            max_clients: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    match config.request_timeout {
        Some(timeout) => info!("Players are kicked after {:?} without answering", timeout),
        None => info!("Request timeout disabled"),
    }

    let mut server = Server::bind(config).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            handle.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}

use clap::Parser;
use client::bot::BotConfig;
use client::network::{Client, ClientError};
use log::info;
use rand::Rng;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name (random if omitted)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Game code to join; creates a new game if omitted
    #[arg(short = 'c', long)]
    code: Option<String>,

    /// Start the round once this many players are present (admin only)
    #[arg(short = 'm', long, default_value = "3")]
    min_players: usize,

    /// Rounds to play before leaving
    #[arg(short = 'r', long, default_value = "1")]
    rounds: u32,

    /// Milliseconds to wait before each contribution
    #[arg(short = 't', long, default_value = "0")]
    think_ms: u64,

    /// Take over a disconnected player's slot if the game is mid-round
    #[arg(long)]
    replace: bool,
}

impl From<Args> for BotConfig {
    fn from(args: Args) -> Self {
        let name = args
            .name
            .unwrap_or_else(|| format!("bot-{}", rand::thread_rng().gen_range(100..1000)));
        BotConfig {
            server: args.server,
            name,
            code: args.code,
            min_players: args.min_players,
            rounds: args.rounds,
            think: Duration::from_millis(args.think_ms),
            replace: args.replace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = BotConfig::from(Args::parse());
    info!("Starting client {}...", config.name);
    match &config.code {
        Some(code) => info!("Joining game {}", code),
        None => info!("Creating a new game"),
    }

    let report = Client::connect(config).await?.run().await?;

    info!(
        "Played {} round(s), saw {} chain(s)",
        report.rounds_played, report.chains_seen
    );

    Ok(())
}

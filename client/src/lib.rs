//! # Game Client Library
//!
//! A headless client for the drawing game server. It connects over TCP,
//! joins or creates a game, and plays it automatically: it "draws" every
//! word it is handed, guesses every drawing, acknowledges the results and
//! leaves after a configured number of rounds.
//!
//! ## Core Features
//!
//! ### Automatic Play
//! Every request from the server gets an immediate, deterministic answer.
//! A drawing of a word is a textual sketch of it, and a guess recovers the
//! word from the sketch, so chains stay readable in logs and tests.
//!
//! ### Lobby Control
//! When the bot is (or becomes) the game's admin it starts the round as
//! soon as enough players are present.
//!
//! ### Slot Replacement
//! Joining a game mid-round offers the slots of disconnected players. With
//! replacement enabled the bot takes over the first one and continues its
//! chains from where they were left.
//!
//! ## Module Organization
//!
//! ### Bot Module (`bot`)
//! Pure decision logic: one server packet in, one action out. Holds no
//! socket, so it is tested directly.
//!
//! ### Network Module (`network`)
//! Owns the TCP stream, frames packets with `shared::framing` and feeds the
//! bot until it is done.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::bot::BotConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = BotConfig {
//!         name: "Robin".to_string(),
//!         code: Some("ffff".to_string()),
//!         ..BotConfig::default()
//!     };
//!     let report = Client::connect(config).await?.run().await?;
//!     println!("played {} rounds", report.rounds_played);
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod network;

//! # Game Server Library
//!
//! This library provides the authoritative server for a telephone-style
//! drawing game. Players gather in a game identified by a short code, each
//! gets a secret word, and chains of alternating drawings and guesses are
//! passed around the table until every player has added to every chain.
//! At the end everyone sees how each word mutated along the way.
//!
//! ## Core Responsibilities
//!
//! ### Turn Rotation
//! Each round seeds one chain per player. Every cycle hands each chain to a
//! different player, waits for all of them to contribute, and only then
//! rotates. Nobody meets the same chain twice in a round.
//!
//! ### Session Management
//! Tracks the roster of each game, who the admin is, and what phase the game
//! is in. Handles the complete lifecycle of a player:
//! - Joining the lobby (the first player becomes admin)
//! - Disconnecting (slots are held open mid-round for a replacement)
//! - Being replaced by a newcomer who inherits the slot and its chains
//! - Being kicked after sitting on a request too long
//!
//! ### Request Correlation
//! Two server messages expect a reply: the next-link request and the results
//! screen. Each player keeps at most one pending continuation per reply
//! name. A reply resumes it exactly once; duplicates and strays are ignored.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! The server processes all network events and game updates sequentially on
//! one loop that owns every game. Reader tasks only decode frames and
//! forward them, so no game state is ever shared or locked.
//!
//! ### TCP-Based Communication
//! Each connection carries length-prefixed bincode frames (see
//! `shared::framing`). Drawings can be large and every message matters, so a
//! reliable ordered stream is used rather than datagrams.
//!
//! ## Module Organization
//!
//! ### Engine (`player`, `chain`, `round`, `session`)
//! The in-memory game model. Nothing in these modules does I/O: outbound
//! packets are queued on a channel per connection.
//!
//! ### Registry Module (`registry`)
//! Live games by code, with random code generation.
//!
//! ### Client Manager Module (`client_manager`)
//! Live TCP connections and which game slot each one plays as.
//!
//! ### Network Module (`network`)
//! Listener, per-connection tasks and the event loop itself.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 8080,
//!         dev_mode: true,
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::bind(config).await?;
//!
//!     // Accepts connections, runs every game and kicks unresponsive
//!     // players until shut down through a `ServerHandle`.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod client_manager;
pub mod error;
pub mod network;
pub mod player;
pub mod registry;
pub mod round;
pub mod session;
pub mod words;

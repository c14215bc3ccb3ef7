//! # Game Client Library
//!
//! This library provides a typed client for the game server's WebSocket
//! protocol, plus a small scripted player built on top of it.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! [`GameClient`] wraps one WebSocket connection:
//! - Encoding `ClientMessage` values into binary frames
//! - Decoding binary frames into `ServerMessage` values
//! - Timed receives for tests and tools
//!
//! ### Strategy Module (`strategy`)
//! Move selection: complete a line, block the opponent's line, or play a
//! random empty cell.
//!
//! ### Bot Module (`bot`)
//! Turns server events into the next message to send. Used by the `client`
//! binary to play complete games unattended.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::GameClient;
//!
//! # async fn demo() -> Result<(), client::ClientError> {
//! let mut client = GameClient::connect("ws://127.0.0.1:8080").await?;
//! client.matchmake("alice").await?;
//! while let Some(message) = client.recv().await? {
//!     println!("{:?}", message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod network;
pub mod strategy;

pub use network::{ClientError, GameClient};

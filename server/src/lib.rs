//! # Game Server Library
//!
//! This library provides the authoritative server for two-player, turn-based
//! games played over WebSocket connections. Players pair up either by creating
//! and joining named sessions or through anonymous matchmaking, play a game to
//! completion, and may drop and rejoin under their original name without
//! losing the game.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! Every move is validated and applied on the server. Clients only ever see
//! the results, as full board snapshots broadcast after each accepted move.
//!
//! ### Pairing
//! Named sessions are looked up by name and may be gated by a shared password.
//! Anonymous players wait in a strict FIFO queue and are paired in arrival
//! order.
//!
//! ### Disconnection Tolerance
//! A dropped connection marks its slot disconnected and leaves the game
//! untouched. Rejoining with the same player name reclaims the slot and
//! resynchronises the client from the current snapshot. Sessions nobody
//! returns to are abandoned after a grace period and retired.
//!
//! ## Architecture Design
//!
//! ### Task per Connection
//! Each connection runs a reader task, a writer task and a dispatcher task.
//! The dispatcher resolves the first intent against the registry and then
//! relays moves into the session it was seated in.
//!
//! ### Per-Session Locking
//! Each session sits behind its own mutex. All mutations, and the broadcasts
//! they cause, happen inside that critical section, so both players observe
//! every event in the same order while unrelated sessions proceed in
//! parallel.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The [`game::Game`] trait and the built-in tic-tac-toe implementation.
//!
//! ### Session Module (`session`)
//! Two player slots bound to one game, with the connect / disconnect /
//! reclaim / leave lifecycle.
//!
//! ### Registry Module (`registry`)
//! Named sessions, the matchmaking queue and session retirement.
//!
//! ### Dispatcher Module (`dispatcher`)
//! Per-connection protocol state: lobby, queued, seated.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection ids, capacity limits and per-connection outbound queues.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop, frame codec and the periodic session reaper.

pub mod client_manager;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod session;

pub use config::{ServerConfig, SessionPolicy};
pub use error::{ServerError, SessionError};
pub use network::Server;
pub use registry::SessionRegistry;

//! Connection table for the server
//!
//! This module tracks every open client connection, including:
//! - Connection lifecycle (accept, close)
//! - Server capacity enforcement
//! - The outbound message queue each connection is written from
//!
//! Sessions never own a connection. They hold a [`ConnectionHandle`], an
//! id-tagged token into the connection's outbound queue, and only while the
//! slot is marked connected.

use log::{debug, info};
use shared::ServerMessage;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Unique connection identifier assigned by the server
pub type ConnectionId = u32;

/// Items on a connection's outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Flush what is queued, then close the channel
    Close,
}

/// Sending half of one connection's outbound queue
///
/// Cloning is cheap. Sends never block: the queue is drained in order by the
/// connection's writer task, so every message enqueued inside a session's
/// critical section reaches the client in that same order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiving end its writer drains
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a message. Returns false if the connection is already gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(Outbound::Message(message)).is_ok()
    }

    /// Asks the writer to close the channel after draining the queue
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Represents one open connection
#[derive(Debug)]
pub struct Connection {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Peer address
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
}

/// Manages all open connections
///
/// Assigns ids and enforces the server's connection cap. Session and
/// matchmaking state live in the registry; this table only knows who is
/// connected.
pub struct ClientManager {
    /// Open connections indexed by their id
    connections: HashMap<ConnectionId, Connection>,
    /// Next id handed out
    next_connection_id: ConnectionId,
    /// Maximum number of concurrent connections allowed
    max_connections: usize,
}

impl ClientManager {
    /// Creates an empty table with the given capacity. Ids start from 1.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a new connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_connection(&mut self, addr: SocketAddr) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        info!("Connection {} opened from {}", id, addr);
        self.connections.insert(
            id,
            Connection {
                id,
                addr,
                connected_at: Instant::now(),
            },
        );

        Some(id)
    }

    /// Removes a connection. Returns false if it was already gone.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        if let Some(connection) = self.connections.remove(id) {
            debug!(
                "Connection {} from {} closed after {:?}",
                connection.id,
                connection.addr,
                connection.connected_at.elapsed()
            );
            true
        } else {
            false
        }
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

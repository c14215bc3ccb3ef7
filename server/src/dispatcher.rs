//! Per-connection message dispatch.
//!
//! Every connection runs one dispatcher task. It reads the connection's first
//! intent (create, join or matchmake), resolves it against the
//! [`SessionRegistry`] and then relays moves into the seated session until
//! the player leaves or the channel closes.
//!
//! ```text
//! Lobby --Create/Join--------------------> Seated --Leave--> Lobby
//!   \----Matchmake--> Queued --paired----/
//!                       \--Leave--> Lobby
//! ```

use crate::client_manager::{ConnectionHandle, ConnectionId};
use crate::error::SessionError;
use crate::registry::{Matchmade, Seat, SessionRegistry};
use log::{debug, info, warn};
use shared::{ClientMessage, ErrorKind, ServerMessage};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// One decoded frame from the connection's reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(ClientMessage),
    /// A frame that could not be decoded as a [`ClientMessage`].
    Malformed(String),
}

enum Phase {
    Lobby,
    Queued(oneshot::Receiver<Seat>),
    Seated(Seat),
}

enum Transition {
    To(Phase),
    /// Close the connection after flushing what is queued.
    Close(Phase),
    /// The inbound channel ended.
    Disconnected(Phase),
}

enum QueuedEvent {
    Paired(Result<Seat, oneshot::error::RecvError>),
    Inbound(Option<Inbound>),
}

/// Runs the dispatcher for one connection until it closes.
pub async fn run(
    registry: Arc<SessionRegistry>,
    handle: ConnectionHandle,
    inbound: mpsc::Receiver<Inbound>,
) {
    Dispatcher {
        registry,
        handle,
        inbound,
    }
    .run()
    .await
}

struct Dispatcher {
    registry: Arc<SessionRegistry>,
    handle: ConnectionHandle,
    inbound: mpsc::Receiver<Inbound>,
}

impl Dispatcher {
    fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    async fn run(mut self) {
        let mut phase = Phase::Lobby;
        loop {
            let transition = match phase {
                Phase::Lobby => match self.inbound.recv().await {
                    Some(item) => self.on_lobby(item).await,
                    None => Transition::Disconnected(Phase::Lobby),
                },
                Phase::Queued(mut pairing) => {
                    let event = tokio::select! {
                        biased;
                        seat = &mut pairing => QueuedEvent::Paired(seat),
                        item = self.inbound.recv() => QueuedEvent::Inbound(item),
                    };
                    match event {
                        QueuedEvent::Paired(Ok(seat)) => Transition::To(Phase::Seated(seat)),
                        QueuedEvent::Paired(Err(_)) => {
                            warn!("Connection {} dropped from the matchmaking queue", self.id());
                            Transition::Close(Phase::Lobby)
                        }
                        QueuedEvent::Inbound(Some(item)) => self.on_queued(item, pairing).await,
                        QueuedEvent::Inbound(None) => Transition::Disconnected(Phase::Queued(pairing)),
                    }
                }
                Phase::Seated(seat) => match self.inbound.recv().await {
                    Some(item) => self.on_seated(item, seat).await,
                    None => Transition::Disconnected(Phase::Seated(seat)),
                },
            };

            match transition {
                Transition::To(next) => phase = next,
                Transition::Close(last) => {
                    self.handle.close();
                    self.disconnect(last).await;
                    break;
                }
                Transition::Disconnected(last) => {
                    self.disconnect(last).await;
                    break;
                }
            }
        }
        debug!("Dispatcher for connection {} finished", self.id());
    }

    async fn on_lobby(&mut self, item: Inbound) -> Transition {
        let message = match item {
            Inbound::Message(message) => message,
            Inbound::Malformed(reason) => return self.malformed(reason, Phase::Lobby),
        };

        match message {
            ClientMessage::Create {
                name,
                player_name,
                password,
            } => {
                let result = self
                    .registry
                    .create_session(&name, &player_name, password, self.handle.clone())
                    .await;
                self.seat_or_retry(result)
            }
            ClientMessage::Join {
                name,
                player_name,
                password,
            } => {
                let result = self
                    .registry
                    .join_session(&name, &player_name, password.as_deref(), self.handle.clone())
                    .await;
                self.seat_or_retry(result)
            }
            ClientMessage::Matchmake { player_name } => {
                match self
                    .registry
                    .enqueue_matchmaking(&player_name, self.handle.clone())
                    .await
                {
                    Ok(Matchmade::Paired(seat)) => Transition::To(Phase::Seated(seat)),
                    Ok(Matchmade::Pending(pairing)) => {
                        self.handle.send(ServerMessage::Queued);
                        Transition::To(Phase::Queued(pairing))
                    }
                    Err(err) => self.reject(err, Phase::Lobby),
                }
            }
            ClientMessage::Move { .. } | ClientMessage::Resign => {
                self.protocol_error("not in a game", Phase::Lobby)
            }
            ClientMessage::Leave => {
                debug!("Connection {} left from the lobby", self.id());
                Transition::Close(Phase::Lobby)
            }
        }
    }

    async fn on_queued(&mut self, item: Inbound, pairing: oneshot::Receiver<Seat>) -> Transition {
        let message = match item {
            Inbound::Message(message) => message,
            Inbound::Malformed(reason) => return self.malformed(reason, Phase::Queued(pairing)),
        };

        match message {
            ClientMessage::Leave => {
                self.withdraw(pairing, true).await;
                self.handle.send(ServerMessage::Left);
                Transition::To(Phase::Lobby)
            }
            ClientMessage::Matchmake { player_name } => {
                self.reject(SessionError::AlreadyQueued(player_name), Phase::Queued(pairing))
            }
            message => {
                // The waiter is told about the match before its pairing
                // resolves, so a move may overtake the seat
                if self.registry.cancel_matchmaking(self.id()).await {
                    return self.protocol_error("waiting for a match", Phase::Lobby);
                }
                match pairing.await {
                    Ok(seat) => self.on_seated(Inbound::Message(message), seat).await,
                    Err(_) => {
                        warn!("Connection {} dropped from the matchmaking queue", self.id());
                        Transition::Close(Phase::Lobby)
                    }
                }
            }
        }
    }

    async fn on_seated(&mut self, item: Inbound, seat: Seat) -> Transition {
        let message = match item {
            Inbound::Message(message) => message,
            Inbound::Malformed(reason) => return self.malformed(reason, Phase::Seated(seat)),
        };

        match message {
            ClientMessage::Move { position } => {
                let result = seat
                    .session
                    .lock()
                    .await
                    .apply_move(seat.role, position, Instant::now());
                match result {
                    Ok(()) => Transition::To(Phase::Seated(seat)),
                    Err(err) => self.reject(err, Phase::Seated(seat)),
                }
            }
            ClientMessage::Resign => {
                let result = seat.session.lock().await.resign(seat.role, Instant::now());
                match result {
                    Ok(()) => Transition::To(Phase::Seated(seat)),
                    Err(err) => self.reject(err, Phase::Seated(seat)),
                }
            }
            ClientMessage::Leave => {
                seat.session.lock().await.leave(self.id(), Instant::now());
                self.handle.send(ServerMessage::Left);
                Transition::To(Phase::Lobby)
            }
            ClientMessage::Create { .. } | ClientMessage::Join { .. } | ClientMessage::Matchmake { .. } => {
                self.protocol_error("already in a game", Phase::Seated(seat))
            }
        }
    }

    fn seat_or_retry(&self, result: Result<Seat, SessionError>) -> Transition {
        match result {
            Ok(seat) => {
                debug!(
                    "Connection {} seated as {} in '{}'",
                    self.id(),
                    seat.role,
                    seat.session_id
                );
                Transition::To(Phase::Seated(seat))
            }
            Err(err) => self.reject(err, Phase::Lobby),
        }
    }

    /// Reports an error to this connection only. Contention and game errors
    /// leave the phase as it was.
    fn reject(&self, err: SessionError, phase: Phase) -> Transition {
        let kind = err.kind();
        info!("Connection {}: {}", self.id(), err);
        self.handle.send(ServerMessage::Error {
            kind,
            message: err.to_string(),
        });
        if kind.closes_connection() {
            Transition::Close(phase)
        } else {
            Transition::To(phase)
        }
    }

    fn malformed(&self, reason: String, phase: Phase) -> Transition {
        self.protocol_error(&format!("malformed message: {}", reason), phase)
    }

    fn protocol_error(&self, message: &str, phase: Phase) -> Transition {
        warn!("Protocol error on connection {}: {}", self.id(), message);
        self.handle.send(ServerMessage::Error {
            kind: ErrorKind::Protocol,
            message: message.to_string(),
        });
        Transition::Close(phase)
    }

    /// Leaves the matchmaking queue. If a pairing raced the withdrawal, the
    /// freshly assigned slot is left (or detached) instead.
    async fn withdraw(&self, pairing: oneshot::Receiver<Seat>, leave: bool) {
        if self.registry.cancel_matchmaking(self.id()).await {
            return;
        }
        if let Ok(seat) = pairing.await {
            let mut session = seat.session.lock().await;
            if leave {
                session.leave(self.id(), Instant::now());
            } else {
                session.detach(self.id(), Instant::now());
            }
        }
    }

    async fn disconnect(&self, phase: Phase) {
        match phase {
            Phase::Lobby => {}
            Phase::Queued(pairing) => self.withdraw(pairing, false).await,
            Phase::Seated(seat) => {
                seat.session.lock().await.detach(self.id(), Instant::now());
            }
        }
    }
}

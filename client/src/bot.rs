//! Scripted player that reacts to server events.

use crate::strategy::pick_move;
use log::{info, warn};
use rand::Rng;
use shared::{BoardView, ClientMessage, ErrorKind, Outcome, Role, ServerMessage};

/// What the bot wants to do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(ClientMessage),
    Wait,
    /// The game ended with this outcome.
    Finished(Outcome),
    /// The server refused us.
    Failed(ErrorKind, String),
}

pub struct Bot<R> {
    role: Option<Role>,
    board: Option<BoardView>,
    opponent_present: bool,
    rng: R,
}

impl<R: Rng> Bot<R> {
    pub fn new(rng: R) -> Self {
        Bot {
            role: None,
            board: None,
            opponent_present: false,
            rng,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn board(&self) -> Option<&BoardView> {
        self.board.as_ref()
    }

    pub fn handle(&mut self, message: &ServerMessage) -> Action {
        match message {
            ServerMessage::Joined {
                session,
                role,
                opponent,
                board,
            } => {
                info!("Seated as {} in '{}'", role, session);
                self.role = Some(*role);
                self.board = Some(board.clone());
                self.opponent_present = opponent.is_some();
                self.next_move()
            }
            ServerMessage::Queued => {
                info!("Waiting for an opponent");
                Action::Wait
            }
            ServerMessage::OpponentJoined { player_name } => {
                info!("Opponent '{}' joined", player_name);
                self.opponent_present = true;
                self.next_move()
            }
            ServerMessage::MoveApplied { board, .. } => {
                self.board = Some(board.clone());
                self.next_move()
            }
            ServerMessage::GameOver { outcome, reason } => {
                info!("Game over: {:?} ({:?})", outcome, reason);
                Action::Finished(*outcome)
            }
            ServerMessage::OpponentDisconnected => {
                info!("Opponent disconnected, waiting for them to return");
                Action::Wait
            }
            ServerMessage::OpponentReconnected => Action::Wait,
            ServerMessage::OpponentLeft | ServerMessage::Left => Action::Wait,
            ServerMessage::Error { kind, message } => match kind {
                // A stale view of the board; wait for the next broadcast
                ErrorKind::NotYourTurn | ErrorKind::WaitingForOpponent => {
                    warn!("Move rejected: {}", message);
                    Action::Wait
                }
                _ => Action::Failed(*kind, message.clone()),
            },
        }
    }

    fn next_move(&mut self) -> Action {
        let (Some(role), Some(board)) = (self.role, self.board.as_ref()) else {
            return Action::Wait;
        };
        if !self.opponent_present || board.outcome.is_over() || board.turn != role {
            return Action::Wait;
        }
        match pick_move(board, role, &mut self.rng) {
            Some(position) => Action::Send(ClientMessage::Move { position }),
            None => Action::Wait,
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the default tic-tac-toe grid.
pub const BOARD_SIZE: usize = 3;

/// Messages sent from a client to the server.
///
/// The first message on a fresh connection must be one of the three intents
/// (`Create`, `Join`, `Matchmake`). `Move`, `Resign` and `Leave` are only
/// meaningful once the connection is seated in a session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Create {
        name: String,
        player_name: String,
        password: Option<String>,
    },
    Join {
        name: String,
        player_name: String,
        password: Option<String>,
    },
    Matchmake {
        player_name: String,
    },
    Move {
        position: u32,
    },
    Resign,
    Leave,
}

/// Events pushed from the server to a client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// The connection now occupies `role` in `session`. Also sent on
    /// reconnection, carrying the authoritative snapshot to resync from.
    Joined {
        session: String,
        role: Role,
        opponent: Option<String>,
        board: BoardView,
    },
    /// Matchmaking request accepted, waiting for an opponent.
    Queued,
    OpponentJoined {
        player_name: String,
    },
    MoveApplied {
        role: Role,
        position: u32,
        board: BoardView,
    },
    GameOver {
        outcome: Outcome,
        reason: GameOverReason,
    },
    OpponentDisconnected,
    OpponentReconnected,
    /// The opponent released their slot with an explicit `Leave`.
    OpponentLeft,
    /// Acknowledges a `Leave`; the connection is back in the lobby.
    Left,
    Error {
        kind: ErrorKind,
        message: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    First,
    Second,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Role::First => 0,
            Role::Second => 1,
        }
    }

    /// The outcome in which this role is the winner.
    pub fn winning_outcome(self) -> Outcome {
        match self {
            Role::First => Outcome::FirstWins,
            Role::Second => Outcome::SecondWins,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::First => write!(f, "first"),
            Role::Second => write!(f, "second"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    First,
    Second,
}

impl Cell {
    pub fn owner(self) -> Option<Role> {
        match self {
            Cell::Empty => None,
            Cell::First => Some(Role::First),
            Cell::Second => Some(Role::Second),
        }
    }
}

impl From<Role> for Cell {
    fn from(role: Role) -> Self {
        match role {
            Role::First => Cell::First,
            Role::Second => Cell::Second,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Ongoing,
    FirstWins,
    SecondWins,
    Draw,
}

impl Outcome {
    pub fn is_over(self) -> bool {
        self != Outcome::Ongoing
    }

    pub fn winner(self) -> Option<Role> {
        match self {
            Outcome::FirstWins => Some(Role::First),
            Outcome::SecondWins => Some(Role::Second),
            Outcome::Ongoing | Outcome::Draw => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    /// A win line or a full board.
    Completed,
    Resigned,
    /// The loser released their slot mid-game.
    Forfeit,
}

/// Full board, turn and outcome. Used both for per-move broadcast and for
/// resynchronising a reconnecting client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BoardView {
    /// Side length of the square grid.
    pub size: u32,
    /// Row-major cells, `size * size` long.
    pub cells: Vec<Cell>,
    pub turn: Role,
    pub outcome: Outcome,
}

impl BoardView {
    pub fn cell(&self, position: u32) -> Option<Cell> {
        self.cells.get(position as usize).copied()
    }

    pub fn empty_positions(&self) -> Vec<u32> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Cell::Empty)
            .map(|(i, _)| i as u32)
            .collect()
    }
}

/// Wire-level error classification carried by `ServerMessage::Error`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    ServerFull,
    NotFound,
    WrongPassword,
    NameConflict,
    SessionFull,
    NameTaken,
    AlreadyQueued,
    InvalidName,
    NotYourTurn,
    IllegalMove,
    GameOver,
    WaitingForOpponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or out-of-order traffic. The server closes the channel.
    Protocol,
    /// Lookup or naming conflicts. The connection stays open for a retry.
    Contention,
    /// Rejected move. Reported to the mover only.
    Game,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::Protocol | ErrorKind::ServerFull => ErrorCategory::Protocol,
            ErrorKind::NotFound
            | ErrorKind::WrongPassword
            | ErrorKind::NameConflict
            | ErrorKind::SessionFull
            | ErrorKind::NameTaken
            | ErrorKind::AlreadyQueued
            | ErrorKind::InvalidName => ErrorCategory::Contention,
            ErrorKind::NotYourTurn
            | ErrorKind::IllegalMove
            | ErrorKind::GameOver
            | ErrorKind::WaitingForOpponent => ErrorCategory::Game,
        }
    }

    pub fn closes_connection(self) -> bool {
        self.category() == ErrorCategory::Protocol
    }
}

/// Encodes a protocol message into a single binary frame payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(message)
}

/// Decodes a binary frame payload.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_board() -> BoardView {
        let mut cells = vec![Cell::Empty; BOARD_SIZE * BOARD_SIZE];
        cells[0] = Cell::First;
        cells[4] = Cell::Second;
        BoardView {
            size: BOARD_SIZE as u32,
            cells,
            turn: Role::First,
            outcome: Outcome::Ongoing,
        }
    }

    #[test]
    fn test_role_other() {
        assert_eq!(Role::First.other(), Role::Second);
        assert_eq!(Role::Second.other(), Role::First);
        assert_eq!(Role::First.other().other(), Role::First);
    }

    #[test]
    fn test_role_winning_outcome() {
        assert_eq!(Role::First.winning_outcome(), Outcome::FirstWins);
        assert_eq!(Role::Second.winning_outcome().winner(), Some(Role::Second));
    }

    #[test]
    fn test_cell_owner() {
        assert_eq!(Cell::Empty.owner(), None);
        assert_eq!(Cell::from(Role::First).owner(), Some(Role::First));
        assert_eq!(Cell::from(Role::Second), Cell::Second);
    }

    #[test]
    fn test_outcome_is_over() {
        assert!(!Outcome::Ongoing.is_over());
        assert!(Outcome::Draw.is_over());
        assert_eq!(Outcome::Draw.winner(), None);
    }

    #[test]
    fn test_board_view_empty_positions() {
        let board = sample_board();
        let empty = board.empty_positions();
        assert_eq!(empty.len(), 7);
        assert!(!empty.contains(&0));
        assert!(!empty.contains(&4));
        assert_eq!(board.cell(4), Some(Cell::Second));
        assert_eq!(board.cell(9), None);
    }

    #[test]
    fn test_error_kind_categories() {
        assert!(ErrorKind::Protocol.closes_connection());
        assert!(ErrorKind::ServerFull.closes_connection());
        assert!(!ErrorKind::NameConflict.closes_connection());
        assert_eq!(ErrorKind::AlreadyQueued.category(), ErrorCategory::Contention);
        assert_eq!(ErrorKind::NotYourTurn.category(), ErrorCategory::Game);
    }

    #[test]
    fn test_joined_serialization_keeps_snapshot() {
        let message = ServerMessage::Joined {
            session: "g1".to_string(),
            role: Role::Second,
            opponent: Some("alice".to_string()),
            board: sample_board(),
        };

        let bytes = encode(&message).unwrap();
        let decoded: ServerMessage = decode(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_create_without_password_serialization() {
        let message = ClientMessage::Create {
            name: "g1".to_string(),
            player_name: "alice".to_string(),
            password: None,
        };

        let decoded: ClientMessage = decode(&encode(&message).unwrap()).unwrap();
        match decoded {
            ClientMessage::Create { password, .. } => assert!(password.is_none()),
            _ => panic!("Wrong message type after deserialization"),
        }
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let bytes = encode(&ClientMessage::Move { position: 4 }).unwrap();

        let truncated: Result<ClientMessage, _> = decode(&bytes[..bytes.len() / 2]);
        assert!(truncated.is_err());

        let empty: Result<ClientMessage, _> = decode(&[]);
        assert!(empty.is_err());

        let mut corrupted = bytes.clone();
        corrupted[0] = 0xFF;
        let corrupted: Result<ClientMessage, _> = decode(&corrupted);
        assert!(corrupted.is_err());
    }
}

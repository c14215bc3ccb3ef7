//! Error types for the session core and the network layer.

use shared::ErrorKind;
use thiserror::Error;

/// Rejected move. The game state is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("position {position} is off the board")]
    OutOfRange { position: u32 },
    #[error("position {position} is already taken")]
    Occupied { position: u32 },
    #[error("the game is already over")]
    GameOver,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NotYourTurn => ErrorKind::NotYourTurn,
            GameError::OutOfRange { .. } | GameError::Occupied { .. } => ErrorKind::IllegalMove,
            GameError::GameOver => ErrorKind::GameOver,
        }
    }
}

/// Failure to resolve an intent against the registry, or to act inside a
/// session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session '{0}' already exists")]
    NameConflict(String),
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("wrong password for session '{0}'")]
    WrongPassword(String),
    #[error("session '{0}' is full")]
    SessionFull(String),
    #[error("player name '{0}' is already in use in this session")]
    NameTaken(String),
    #[error("player '{0}' is already waiting for a match")]
    AlreadyQueued(String),
    #[error("{0} must not be empty")]
    InvalidName(&'static str),
    #[error("waiting for an opponent to join")]
    WaitingForOpponent,
    #[error(transparent)]
    Game(#[from] GameError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NameConflict(_) => ErrorKind::NameConflict,
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::WrongPassword(_) => ErrorKind::WrongPassword,
            SessionError::SessionFull(_) => ErrorKind::SessionFull,
            SessionError::NameTaken(_) => ErrorKind::NameTaken,
            SessionError::AlreadyQueued(_) => ErrorKind::AlreadyQueued,
            SessionError::InvalidName(_) => ErrorKind::InvalidName,
            SessionError::WaitingForOpponent => ErrorKind::WaitingForOpponent,
            SessionError::Game(err) => err.kind(),
        }
    }
}

/// Transport and startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_connections must be at least 2")]
    TooFewConnections,
    #[error("reap_interval must be non-zero")]
    ZeroReapInterval,
}

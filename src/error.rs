use thiserror::Error;

use crate::types::{Position, TurnPhase};

/// Reasons a local action is refused by the state machine.
///
/// These never reach the user: the session treats every refusal as a no-op
/// and only logs it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("the game is already over")]
    GameOver,
    #[error("the game is not over yet")]
    GameNotOver,
    #[error("action is not allowed during {0:?}")]
    WrongPhase(TurnPhase),
    #[error("square {0} is out of range")]
    OutOfRange(Position),
    #[error("square {0} is occupied")]
    Occupied(Position),
    #[error("square {0} does not hold an opponent marble")]
    NotOpponentMarble(Position),
    #[error("a marble is selected; move it or deselect it first")]
    SelectionPending,
    #[error("square {to} is not an empty neighbour of {from}")]
    NotAdjacent { from: Position, to: Position },
    #[error("it is not the local player's turn")]
    NotYourTurn,
    #[error("a rotation is still settling")]
    Rotating,
    #[error("the orbit configuration can only change before the first move")]
    GameUnderway,
}

/// A malformed orbit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("orbit config {name:?} is invalid: {}", errors.join("; "))]
    Invalid { name: String, errors: Vec<String> },
    #[error("orbit config {name:?} has size {size}, expected {expected}")]
    SizeMismatch {
        name: String,
        size: usize,
        expected: usize,
    },
    #[error("no built-in orbit config named {0:?}")]
    Unknown(String),
}

/// Failures decoding or encoding peer messages.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures reported by the excluded transport and room collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to send to peer {peer}: {reason}")]
    Send { peer: String, reason: String },
    #[error("failed to {operation}: {reason}")]
    Room {
        operation: &'static str,
        reason: String,
    },
}

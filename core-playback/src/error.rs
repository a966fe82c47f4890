//! # Playback Error Types
//!
//! Every request resolves with either a JSON value or one of these errors.
//! Each variant maps to a stable wire code through [`PlaybackError::code`].

use bridge_traits::{BridgeError, EngineError};
use core_runtime::events::PlaybackPhase;
use thiserror::Error;

/// Errors surfaced to callers of a player.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Phase Contract
    // ========================================================================
    /// The operation is not allowed in the current phase.
    #[error("Cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: PlaybackPhase,
    },

    /// A pending load was superseded by another load or by stop.
    #[error("Connection aborted")]
    ConnectionAborted,

    // ========================================================================
    // Engine
    // ========================================================================
    /// The engine reported a failure.
    #[error("{message}")]
    EngineFailure { code: String, message: String },

    /// The engine could not be constructed or refused to build a construct.
    #[error("Engine bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // ========================================================================
    // Request Decoding
    // ========================================================================
    /// Malformed arguments, unknown playlist target or bad index.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Method name not recognised.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // ========================================================================
    // Lifecycle
    // ========================================================================
    /// The player was disposed or shut down before replying.
    #[error("Player disposed before the request completed")]
    Disposed,
}

impl PlaybackError {
    pub fn invalid_state(operation: &'static str, phase: PlaybackPhase) -> Self {
        PlaybackError::InvalidState { operation, phase }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        PlaybackError::Decode(message.into())
    }

    /// Stable code carried on the wire next to the message.
    pub fn code(&self) -> &str {
        match self {
            PlaybackError::InvalidState { .. } => "invalid_state",
            PlaybackError::ConnectionAborted => "abort",
            PlaybackError::EngineFailure { code, .. } => code,
            PlaybackError::Bridge(_) => "bridge",
            PlaybackError::Decode(_) => "decode",
            PlaybackError::NotImplemented(_) => "not_implemented",
            PlaybackError::Disposed => "disposed",
        }
    }

    /// Returns `true` if the request was rejected without touching playback.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidState { .. }
                | PlaybackError::Decode(_)
                | PlaybackError::NotImplemented(_)
        )
    }
}

impl From<&EngineError> for PlaybackError {
    fn from(error: &EngineError) -> Self {
        PlaybackError::EngineFailure {
            code: error.kind.code().to_string(),
            message: error.message.clone(),
        }
    }
}

impl From<serde_json::Error> for PlaybackError {
    fn from(error: serde_json::Error) -> Self {
        PlaybackError::Decode(error.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

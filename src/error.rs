//! Error types with location tracking.
//!
//! Illegal and out-of-turn moves are not errors; see [`crate::Rejection`].

use derive_more::{Display, Error};
use tracing::instrument;

// ─────────────────────────────────────────────────────────────
//  Channel delivery
// ─────────────────────────────────────────────────────────────

/// Why a message could not be delivered to the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChannelErrorKind {
    /// The link is closed, failed, or was never established.
    #[display("channel not open")]
    NotOpen,
    /// The compute agent's worker has stopped.
    #[display("compute agent gone")]
    WorkerGone,
    /// The message could not be encoded.
    #[display("encode failed")]
    Encode,
}

/// Delivery failure on an opponent channel.
#[derive(Debug, Clone, Display, Error)]
#[display("Channel error ({}): {} at {}:{}", kind, message, file, line)]
pub struct ChannelError {
    /// Failure category.
    pub kind: ChannelErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ChannelError {
    /// Creates a new channel error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ChannelErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for a [`ChannelErrorKind::NotOpen`] error.
    #[track_caller]
    pub fn not_open(message: impl Into<String>) -> Self {
        Self::new(ChannelErrorKind::NotOpen, message)
    }
}

impl From<serde_json::Error> for ChannelError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(ChannelErrorKind::Encode, format!("JSON error: {}", err))
    }
}

// ─────────────────────────────────────────────────────────────
//  Handshake
// ─────────────────────────────────────────────────────────────

/// Why a peer negotiation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HandshakeErrorKind {
    /// Operation not valid in the current handshake state.
    #[display("invalid state")]
    InvalidState,
    /// The peer connection reported an error.
    #[display("transport")]
    Transport,
    /// Candidate gathering stopped without a completion signal.
    #[display("gathering aborted")]
    GatheringAborted,
    /// A bounded wait ran out.
    #[display("timeout")]
    Timeout,
    /// A description blob could not be parsed.
    #[display("malformed description")]
    MalformedDescription,
}

/// Peer negotiation failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Handshake error ({}): {} at {}:{}", kind, message, file, line)]
pub struct HandshakeError {
    /// Failure category.
    pub kind: HandshakeErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl HandshakeError {
    /// Creates a new handshake error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: HandshakeErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<webrtc::Error> for HandshakeError {
    #[track_caller]
    fn from(err: webrtc::Error) -> Self {
        Self::new(HandshakeErrorKind::Transport, format!("WebRTC error: {}", err))
    }
}

// ─────────────────────────────────────────────────────────────
//  Compute agent
// ─────────────────────────────────────────────────────────────

/// Failure inside a compute agent.
#[derive(Debug, Clone, Display, Error)]
#[display("Agent error: {} at {}:{}", message, file, line)]
pub struct AgentError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl AgentError {
    /// Creates a new agent error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Session
// ─────────────────────────────────────────────────────────────

/// What went wrong in a session.
#[derive(Debug, Clone, Display)]
pub enum SessionErrorKind {
    /// A message could not reach the opponent.
    #[display("{_0}")]
    Delivery(ChannelError),
    /// The opponent's history cannot be reproduced locally.
    #[display("opponent desynchronized: {_0}")]
    Desync(String),
}

/// Session failure surfaced to the caller.
#[derive(Debug, Clone, Display, Error)]
#[display("Session error: {} at {}:{}", kind, file, line)]
pub struct SessionError {
    /// Failure category.
    pub kind: SessionErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: SessionErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for a [`SessionErrorKind::Desync`] error.
    #[track_caller]
    pub fn desync(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Desync(message.into()))
    }

    /// Whether this is a delivery failure.
    pub fn is_delivery(&self) -> bool {
        matches!(self.kind, SessionErrorKind::Delivery(_))
    }
}

impl From<ChannelError> for SessionError {
    #[track_caller]
    fn from(err: ChannelError) -> Self {
        Self::new(SessionErrorKind::Delivery(err))
    }
}

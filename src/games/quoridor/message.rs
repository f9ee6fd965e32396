//! Messages exchanged with an opponent, and history labels.
//!
//! Game moves and session-control messages share one flat wire namespace,
//! so a `Message` serializes exactly like the move or control it carries.

use super::types::Move;
use derive_more::From;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Session-control messages, interpreted by the session rather than the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    /// Start over from the initial position.
    ///
    /// The payload is `true` when the SENDER is the first player.
    Restart(bool),
    /// Discard history and rebuild it from this move list.
    StartAt(Vec<Move>),
}

/// Anything that crosses an opponent channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Message {
    /// A game move.
    Play(Move),
    /// A session-control message.
    Control(Control),
}

impl Message {
    /// Builds a restart message.
    pub fn restart(sender_is_first: bool) -> Self {
        Message::Control(Control::Restart(sender_is_first))
    }

    /// Builds a resynchronization message.
    pub fn start_at(moves: Vec<Move>) -> Self {
        Message::Control(Control::StartAt(moves))
    }

    /// Returns the carried move, if this is a game move.
    pub fn as_move(&self) -> Option<Move> {
        match self {
            Message::Play(candidate) => Some(*candidate),
            Message::Control(_) => None,
        }
    }

    /// Encodes the message as its JSON wire text.
    #[instrument(level = "trace")]
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses JSON wire text back into a message.
    #[instrument(level = "trace")]
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Marker for the root of a history, serialized as `{"InitialSetUp": null}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupMarker {
    /// The only value.
    InitialSetUp(()),
}

/// Label of a history entry: the root setup or the move that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// History root. Never transmitted.
    Setup(SetupMarker),
    /// A played move.
    Played(Move),
}

impl Step {
    /// The history root label.
    pub fn setup() -> Self {
        Step::Setup(SetupMarker::InitialSetUp(()))
    }

    /// Returns the move, unless this is the root.
    pub fn as_move(&self) -> Option<Move> {
        match self {
            Step::Setup(_) => None,
            Step::Played(candidate) => Some(*candidate),
        }
    }
}

impl From<Move> for Step {
    fn from(candidate: Move) -> Self {
        Step::Played(candidate)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Setup(_) => write!(f, "Setup"),
            Step::Played(candidate) => write!(f, "{}", candidate),
        }
    }
}

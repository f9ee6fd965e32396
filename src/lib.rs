//! Strictly Quoridor - two-player session core
//!
//! Keeps two independently advancing participants agreed on whose turn it
//! is and which move history is authoritative, including after one side
//! rewinds and branches play from an earlier position.
//!
//! # Architecture
//!
//! - **Snapshots**: move-only position handles over an external [`RulesEngine`]
//! - **Timeline**: branchable history with a selection cursor
//! - **Session**: turn gating, branching and resynchronization
//! - **Opponents**: one [`OpponentChannel`] over a local agent or a remote peer
//! - **Handshake**: offer/answer negotiation producing a [`PeerChannel`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_quoridor::{
//!     AgentFactory, AgentMode, ComputeAgent, Move, RulesEngine, ScriptedAgent, Seat, Session,
//!     SnapshotStore, WorkerChannel,
//! };
//!
//! # async fn example<E: RulesEngine>(engine: E) -> Result<(), strictly_quoridor::SessionError> {
//! let factory: AgentFactory =
//!     Arc::new(|| Box::new(ScriptedAgent::new([Move::MoveTo(4, 7)])) as Box<dyn ComputeAgent>);
//! let channel = WorkerChannel::new(factory, Seat::Second, AgentMode::Greedy);
//! let mut session = Session::new(SnapshotStore::new(engine), true, channel);
//! session.submit(Move::MoveTo(4, 1)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod error;
mod games;
mod handshake;
mod opponent;
mod orchestrator;
mod session;
mod snapshot;
mod timeline;

// Crate-level exports - Configuration
pub use config::{ConfigError, SessionConfig};

// Crate-level exports - Errors
pub use error::{
    AgentError, ChannelError, ChannelErrorKind, HandshakeError, HandshakeErrorKind, SessionError,
    SessionErrorKind,
};

// Crate-level exports - Game types
pub use games::quoridor::{
    BOARD_SIZE, Control, Direction, Location, Message, Move, Orientation, RulesEngine, Seat,
    SetupMarker, Step, WALL_ANCHORS, WallState,
};

// Crate-level exports - History
pub use snapshot::{Snapshot, SnapshotStore};
pub use timeline::{Entry, SelectionObserver, Timeline};

// Crate-level exports - Session
pub use orchestrator::{Command, Orchestrator, SessionEvent};
pub use session::{BoardView, Incoming, Phase, Rejection, Session, Submission, TurnState};

// Crate-level exports - Opponents
pub use opponent::{
    AgentFactory, AgentMode, ChannelKind, ComputeAgent, DataLink, LinkHandle, LinkState,
    Opponent, OpponentChannel, PeerChannel, ScriptedAgent, WorkerChannel,
};

// Crate-level exports - Handshake
pub use handshake::{
    CandidateSignal, Description, Handshake, HandshakeState, Negotiator, RtcLink, RtcNegotiator,
    Signals,
};

//! Opponent channels: one message interface over a local agent or a remote peer.

mod agent;
mod peer;
mod worker;

pub use agent::{AgentFactory, AgentMode, ComputeAgent, ScriptedAgent};
pub use peer::{DataLink, LinkHandle, LinkState, PeerChannel};
pub use worker::WorkerChannel;

use crate::config::SessionConfig;
use crate::error::ChannelError;
use crate::games::quoridor::{Message, Seat};
use async_trait::async_trait;
use strum::Display;

/// Which transport an opponent channel runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChannelKind {
    /// A compute agent on a local worker thread.
    Worker,
    /// A remote human over a peer data channel.
    Peer,
}

/// Duplex message channel to the opponent.
///
/// Channels deliver messages verbatim and never validate game semantics.
#[async_trait]
pub trait OpponentChannel: Send {
    /// Sends a move or control message.
    ///
    /// Fails with a [`ChannelError`] instead of dropping the message when the
    /// channel cannot deliver.
    async fn send(&mut self, message: &Message) -> Result<(), ChannelError>;

    /// Waits for the next message. `None` means the channel has closed.
    ///
    /// Must be cancel-safe: it is raced against local input.
    async fn recv(&mut self) -> Option<Message>;

    /// Transport behind this channel.
    fn kind(&self) -> ChannelKind;
}

/// An opponent channel chosen once at session start.
#[derive(Debug)]
pub enum Opponent {
    /// Local compute agent.
    Worker(WorkerChannel),
    /// Remote peer.
    Peer(PeerChannel),
}

impl Opponent {
    /// Starts a compute agent holding `agent_seat`, in the configured search mode.
    ///
    /// Must be called from within a tokio runtime.
    pub fn worker(factory: AgentFactory, agent_seat: Seat, config: &SessionConfig) -> Self {
        WorkerChannel::new(factory, agent_seat, *config.agent_mode()).into()
    }

    /// Wraps a negotiated peer link. Must be called from within a tokio runtime.
    pub fn peer(handle: LinkHandle) -> Self {
        PeerChannel::new(handle).into()
    }
}

#[async_trait]
impl OpponentChannel for Opponent {
    async fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        match self {
            Opponent::Worker(channel) => channel.send(message).await,
            Opponent::Peer(channel) => channel.send(message).await,
        }
    }

    async fn recv(&mut self) -> Option<Message> {
        match self {
            Opponent::Worker(channel) => channel.recv().await,
            Opponent::Peer(channel) => channel.recv().await,
        }
    }

    fn kind(&self) -> ChannelKind {
        match self {
            Opponent::Worker(channel) => channel.kind(),
            Opponent::Peer(channel) => channel.kind(),
        }
    }
}

impl From<WorkerChannel> for Opponent {
    fn from(channel: WorkerChannel) -> Self {
        Opponent::Worker(channel)
    }
}

impl From<PeerChannel> for Opponent {
    fn from(channel: PeerChannel) -> Self {
        Opponent::Peer(channel)
    }
}

//! Opponent channel over a negotiated peer data channel.
//!
//! Messages travel as JSON text. Sends issued before the link opens are
//! queued and flushed in order once it does. Sends on an open link go
//! straight to the transport and return its error. Sends after the link
//! closes fail with [`ChannelErrorKind::NotOpen`](crate::ChannelErrorKind::NotOpen),
//! and queued frames that never went out are reported by the next send.

use super::{ChannelKind, OpponentChannel};
use crate::error::ChannelError;
use crate::games::quoridor::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of the underlying data link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LinkState {
    /// Negotiated but not yet open.
    Connecting,
    /// Ready to carry messages.
    Open,
    /// Closed or failed. Terminal.
    Closed,
}

/// Sending half of a text data link.
#[async_trait]
pub trait DataLink: Send + Sync + 'static {
    /// Transmits one text frame.
    async fn send_text(&self, text: String) -> Result<(), ChannelError>;
}

/// Everything a [`PeerChannel`] needs from an established link.
pub struct LinkHandle {
    /// Outbound frames.
    pub link: Arc<dyn DataLink>,
    /// Open/close notifications.
    pub state: watch::Receiver<LinkState>,
    /// Inbound text frames, in arrival order.
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Channel to a remote peer.
pub struct PeerChannel {
    link: Arc<dyn DataLink>,
    pending: Option<mpsc::UnboundedSender<String>>,
    flush: Option<JoinHandle<Result<(), ChannelError>>>,
    inbound: mpsc::UnboundedReceiver<String>,
    state: watch::Receiver<LinkState>,
    closed: bool,
}

impl PeerChannel {
    /// Wraps a link. Must be called from within a tokio runtime.
    #[instrument(skip(handle))]
    pub fn new(handle: LinkHandle) -> Self {
        let LinkHandle {
            link,
            state,
            inbound,
        } = handle;
        let (pending, queue) = mpsc::unbounded_channel();
        let flush = tokio::spawn(flush_on_open(link.clone(), state.clone(), queue));
        Self {
            link,
            pending: Some(pending),
            flush: Some(flush),
            inbound,
            state,
            closed: false,
        }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Stops queueing and waits for the queued frames to be dealt with.
    ///
    /// Returns the error of a failed flush, or of frames dropped because the
    /// link closed before opening. Only the first call reports it.
    async fn settle_queue(&mut self) -> Result<(), ChannelError> {
        self.pending = None;
        let Some(flush) = self.flush.take() else {
            return Ok(());
        };
        flush
            .await
            .map_err(|e| ChannelError::not_open(format!("Queue flush task failed: {}", e)))?
    }
}

impl std::fmt::Debug for PeerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerChannel")
            .field("state", &self.state())
            .field("queueing", &self.pending.is_some())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Holds frames sent while connecting, then transmits them in order once the
/// link opens. Frames still queued when the link closes first are an error.
async fn flush_on_open(
    link: Arc<dyn DataLink>,
    mut state: watch::Receiver<LinkState>,
    mut queue: mpsc::UnboundedReceiver<String>,
) -> Result<(), ChannelError> {
    let opened = match state.wait_for(|s| *s != LinkState::Connecting).await {
        Ok(current) => *current == LinkState::Open,
        Err(_) => false,
    };

    if !opened {
        queue.close();
        let mut dropped = 0;
        while queue.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped == 0 {
            return Ok(());
        }
        warn!(dropped, "Link closed before opening with messages queued");
        return Err(ChannelError::not_open(format!(
            "Link closed before opening, {} queued message(s) not delivered",
            dropped
        )));
    }

    info!(pending = queue.len(), "Link open, flushing queued messages");
    let mut sent = 0;
    while let Some(text) = queue.recv().await {
        if let Err(e) = link.send_text(text).await {
            queue.close();
            let lost = 1 + std::iter::from_fn(|| queue.try_recv().ok()).count();
            warn!(error = %e, sent, lost, "Flushing queued messages failed");
            return Err(e);
        }
        sent += 1;
    }
    debug!(sent, "Queue flushed");
    Ok(())
}

#[async_trait]
impl OpponentChannel for PeerChannel {
    #[instrument(skip(self), fields(state = %self.state()))]
    async fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        let text = message.encode()?;
        match self.state() {
            LinkState::Connecting => {
                let queued = match &self.pending {
                    Some(pending) => pending.send(text).is_ok(),
                    None => false,
                };
                if !queued {
                    return Err(ChannelError::not_open("Peer link is not accepting messages"));
                }
                debug!("Queued message until link opens");
                Ok(())
            }
            LinkState::Open => {
                // Queued frames go out before this one.
                self.settle_queue().await?;
                self.link
                    .send_text(text)
                    .await
                    .inspect_err(|e| warn!(error = %e, "Peer send failed"))
            }
            LinkState::Closed => {
                self.settle_queue().await?;
                warn!("Send on closed peer link");
                Err(ChannelError::not_open("Peer link is closed"))
            }
        }
    }

    async fn recv(&mut self) -> Option<Message> {
        loop {
            if !self.closed && *self.state.borrow() == LinkState::Closed {
                self.closed = true;
            }
            if self.closed && self.inbound.is_empty() {
                debug!("Peer link closed");
                return None;
            }

            tokio::select! {
                biased;
                text = self.inbound.recv() => {
                    let text = text?;
                    match Message::decode(&text) {
                        Ok(message) => return Some(message),
                        Err(e) => warn!(error = %e, %text, "Skipping malformed peer message"),
                    }
                }
                changed = self.state.changed(), if !self.closed => {
                    if changed.is_err() || *self.state.borrow_and_update() == LinkState::Closed {
                        self.closed = true;
                    }
                }
            }
        }
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Peer
    }
}

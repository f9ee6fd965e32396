//! Peer-connection handshake producing a [`PeerChannel`].
//!
//! Two mutually exclusive roles share one state machine:
//!
//! ```text
//! serve:   Idle -> Offering  -> Gathering -> AwaitingAnswer -> Complete
//! connect: Idle -> Answering -> Gathering -> Complete
//! ```
//!
//! Descriptions are only handed out after candidate gathering has signalled
//! completion, so they can be transferred out of band in one piece. The
//! handshake knows nothing about the game; its only product is a channel.

mod rtc;

pub use rtc::{RtcLink, RtcNegotiator};

use crate::config::SessionConfig;
use crate::error::{HandshakeError, HandshakeErrorKind};
use crate::opponent::{LinkHandle, LinkState, PeerChannel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Where a handshake is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum HandshakeState {
    /// Nothing started.
    Idle,
    /// Serving: creating the data channel and offer.
    Offering,
    /// Connecting: applying the remote offer and creating the answer.
    Answering,
    /// Waiting for local candidate gathering to finish.
    Gathering,
    /// Serving: offer handed out, waiting for the remote answer.
    AwaitingAnswer,
    /// Negotiation done.
    Complete,
    /// A step failed. Start a new handshake to retry.
    Failed,
}

/// Opaque session description blob, transferred verbatim between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct Description(String);

impl Description {
    /// Wraps a blob.
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// The blob text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Local candidate gathering progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSignal {
    /// One gathered candidate.
    Candidate(String),
    /// Terminal signal: gathering is complete.
    Gathered,
}

/// Event streams a negotiator hands to its handshake.
#[derive(Debug)]
pub struct Signals {
    /// Candidate gathering progress.
    pub candidates: mpsc::UnboundedReceiver<CandidateSignal>,
    /// The data link, usable once its state turns open.
    pub link: LinkHandle,
}

/// Operations on the underlying peer connection.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Creates the local data channel (serving side only).
    async fn open_data_channel(&self, label: &str) -> Result<(), HandshakeError>;

    /// Creates an offer.
    async fn create_offer(&self) -> Result<Description, HandshakeError>;

    /// Creates an answer to the applied remote offer.
    async fn create_answer(&self) -> Result<Description, HandshakeError>;

    /// Applies a local description and starts candidate gathering.
    async fn set_local_description(&self, description: &Description) -> Result<(), HandshakeError>;

    /// Applies the peer's description.
    async fn set_remote_description(&self, description: &Description)
        -> Result<(), HandshakeError>;

    /// Current local description, including gathered candidates.
    async fn local_description(&self) -> Option<Description>;

    /// Tears the connection down.
    async fn close(&self) -> Result<(), HandshakeError>;
}

/// One peer negotiation.
pub struct Handshake<N: Negotiator> {
    negotiator: N,
    candidates: mpsc::UnboundedReceiver<CandidateSignal>,
    link: Option<LinkHandle>,
    state: HandshakeState,
    label: String,
    gathering_timeout: Duration,
    open_timeout: Duration,
    gathered: Vec<String>,
}

impl<N: Negotiator> Handshake<N> {
    /// Prepares a handshake over `negotiator`.
    pub fn new(negotiator: N, signals: Signals, config: &SessionConfig) -> Self {
        Self {
            negotiator,
            candidates: signals.candidates,
            link: Some(signals.link),
            state: HandshakeState::Idle,
            label: config.channel_label().clone(),
            gathering_timeout: config.gathering_timeout(),
            open_timeout: config.open_timeout(),
            gathered: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Candidates gathered so far.
    pub fn gathered(&self) -> &[String] {
        &self.gathered
    }

    /// The underlying negotiator.
    pub fn negotiator(&self) -> &N {
        &self.negotiator
    }

    fn transition(&mut self, next: HandshakeState) {
        info!(from = %self.state, to = %next, "Handshake state changed");
        self.state = next;
    }

    fn expect(&self, expected: HandshakeState) -> Result<(), HandshakeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HandshakeError::new(
                HandshakeErrorKind::InvalidState,
                format!("expected {} but handshake is {}", expected, self.state),
            ))
        }
    }

    /// Marks the handshake failed on error.
    fn settle<T>(&mut self, outcome: Result<T, HandshakeError>) -> Result<T, HandshakeError> {
        if let Err(e) = &outcome {
            warn!(error = %e, state = %self.state, "Handshake failed");
            self.transition(HandshakeState::Failed);
        }
        outcome
    }

    /// Serving role: creates the data channel and returns the completed offer.
    #[instrument(skip(self), fields(label = %self.label))]
    pub async fn serve(&mut self) -> Result<Description, HandshakeError> {
        self.expect(HandshakeState::Idle)?;
        self.transition(HandshakeState::Offering);
        let outcome = self.offer().await;
        self.settle(outcome)
    }

    async fn offer(&mut self) -> Result<Description, HandshakeError> {
        self.negotiator.open_data_channel(&self.label).await?;
        let offer = self.negotiator.create_offer().await?;
        self.negotiator.set_local_description(&offer).await?;
        self.transition(HandshakeState::Gathering);
        self.gather().await?;
        let completed = self.negotiator.local_description().await.unwrap_or(offer);
        self.transition(HandshakeState::AwaitingAnswer);
        Ok(completed)
    }

    /// Connecting role: applies the remote offer and returns the completed answer.
    #[instrument(skip(self, offer))]
    pub async fn connect(&mut self, offer: &Description) -> Result<Description, HandshakeError> {
        self.expect(HandshakeState::Idle)?;
        self.transition(HandshakeState::Answering);
        let outcome = self.answer(offer).await;
        self.settle(outcome)
    }

    async fn answer(&mut self, offer: &Description) -> Result<Description, HandshakeError> {
        self.negotiator.set_remote_description(offer).await?;
        let answer = self.negotiator.create_answer().await?;
        self.negotiator.set_local_description(&answer).await?;
        self.transition(HandshakeState::Gathering);
        self.gather().await?;
        let completed = self.negotiator.local_description().await.unwrap_or(answer);
        self.transition(HandshakeState::Complete);
        Ok(completed)
    }

    /// Serving role: applies the peer's answer, completing negotiation.
    #[instrument(skip(self, answer))]
    pub async fn accept_answer(&mut self, answer: &Description) -> Result<(), HandshakeError> {
        self.expect(HandshakeState::AwaitingAnswer)?;
        let outcome = self.negotiator.set_remote_description(answer).await;
        self.settle(outcome)?;
        self.transition(HandshakeState::Complete);
        Ok(())
    }

    /// Waits for the terminal candidate signal, however many candidates arrive first.
    async fn gather(&mut self) -> Result<(), HandshakeError> {
        let candidates = &mut self.candidates;
        let gathered = &mut self.gathered;
        let waiting = async {
            while let Some(signal) = candidates.recv().await {
                match signal {
                    CandidateSignal::Candidate(candidate) => {
                        debug!(%candidate, "Gathered candidate");
                        gathered.push(candidate);
                    }
                    CandidateSignal::Gathered => return Ok(()),
                }
            }
            Err(HandshakeError::new(
                HandshakeErrorKind::GatheringAborted,
                "candidate stream ended before gathering completed",
            ))
        };

        tokio::time::timeout(self.gathering_timeout, waiting)
            .await
            .map_err(|_| {
                HandshakeError::new(
                    HandshakeErrorKind::Timeout,
                    format!("candidate gathering exceeded {:?}", self.gathering_timeout),
                )
            })??;
        info!(candidates = self.gathered.len(), "Candidate gathering complete");
        Ok(())
    }

    fn take_link(&mut self) -> Result<LinkHandle, HandshakeError> {
        self.expect(HandshakeState::Complete)?;
        self.link.take().ok_or_else(|| {
            HandshakeError::new(HandshakeErrorKind::InvalidState, "link already taken")
        })
    }

    /// Returns the channel without waiting for it to open.
    ///
    /// Messages sent before the open event are queued.
    pub fn into_channel(mut self) -> Result<PeerChannel, HandshakeError> {
        let link = self.take_link()?;
        Ok(PeerChannel::new(link))
    }

    /// Waits for the data channel to open and returns it.
    #[instrument(skip(self))]
    pub async fn establish(mut self) -> Result<PeerChannel, HandshakeError> {
        let mut link = self.take_link()?;
        let opened = match tokio::time::timeout(
            self.open_timeout,
            link.state.wait_for(|s| *s != LinkState::Connecting),
        )
        .await
        {
            Ok(Ok(state)) => Some(*state == LinkState::Open),
            Ok(Err(_)) => Some(false),
            Err(_) => None,
        };

        let failure = match opened {
            Some(true) => None,
            Some(false) => Some(HandshakeError::new(
                HandshakeErrorKind::Transport,
                "data channel closed before opening",
            )),
            None => Some(HandshakeError::new(
                HandshakeErrorKind::Timeout,
                format!("data channel did not open within {:?}", self.open_timeout),
            )),
        };

        if let Some(e) = failure {
            warn!(error = %e, "Establishment failed");
            if let Err(close) = self.negotiator.close().await {
                debug!(error = %close, "Close after failed establishment also failed");
            }
            return Err(e);
        }

        info!("Data channel open");
        Ok(PeerChannel::new(link))
    }
}

impl<N: Negotiator> std::fmt::Debug for Handshake<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("state", &self.state)
            .field("label", &self.label)
            .field("gathered", &self.gathered.len())
            .finish_non_exhaustive()
    }
}

//! Opponent channel backed by a compute agent on a blocking worker thread.
//!
//! The agent lives on its own thread and is reached only through message
//! passing. `Restart` and `StartAt` discard the current agent and spawn a
//! fresh one; a `StartAt` replays its moves into the new agent before normal
//! exchange resumes. Each agent gets its own reply queue, so a reply still in
//! flight from a discarded agent never reaches the session.

use super::agent::{AgentFactory, AgentMode, ComputeAgent};
use super::{ChannelKind, OpponentChannel};
use crate::error::{ChannelError, ChannelErrorKind};
use crate::games::quoridor::{Control, Message, Move, Seat};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Message posted to the agent thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Envelope {
    /// A move played on the agent's board. The agent answers with its own.
    Move(Move),
    /// Switch search mode.
    SetMode(AgentMode),
}

/// Handles to one running agent thread.
#[derive(Debug)]
struct Worker {
    inbox: mpsc::UnboundedSender<Envelope>,
    replies: mpsc::UnboundedReceiver<Move>,
}

impl Worker {
    fn spawn(
        agent: Box<dyn ComputeAgent>,
        mode: AgentMode,
        replay: Vec<Move>,
        opens: bool,
        generation: u64,
    ) -> Self {
        let (inbox, envelopes) = mpsc::unbounded_channel();
        let (reply_tx, replies) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            let mut envelopes = envelopes;
            run_agent(agent, mode, replay, opens, &mut envelopes, &reply_tx, generation);
            // Inbox closes before the reply queue: a closed reply queue implies a dead inbox.
            drop(envelopes);
            drop(reply_tx);
        });
        Self { inbox, replies }
    }
}

#[instrument(skip(agent, replay, envelopes, replies), fields(replay = replay.len()))]
fn run_agent(
    mut agent: Box<dyn ComputeAgent>,
    mode: AgentMode,
    replay: Vec<Move>,
    opens: bool,
    envelopes: &mut mpsc::UnboundedReceiver<Envelope>,
    replies: &mpsc::UnboundedSender<Move>,
    generation: u64,
) {
    agent.set_mode(mode);
    for candidate in &replay {
        if let Err(e) = agent.send(candidate) {
            warn!(error = %e, %candidate, "Agent rejected replayed move");
            return;
        }
    }

    if opens && !reply(agent.as_mut(), replies) {
        return;
    }

    while let Some(envelope) = envelopes.blocking_recv() {
        match envelope {
            Envelope::Move(candidate) => {
                if let Err(e) = agent.send(&candidate) {
                    warn!(error = %e, %candidate, "Agent rejected move");
                    return;
                }
                if !reply(agent.as_mut(), replies) {
                    return;
                }
            }
            Envelope::SetMode(mode) => agent.set_mode(mode),
        }
    }
    debug!("Agent inbox closed");
}

/// Asks the agent for a move and posts it back. Returns false when the worker should stop.
fn reply(agent: &mut dyn ComputeAgent, replies: &mpsc::UnboundedSender<Move>) -> bool {
    match agent.receive() {
        Ok(candidate) => {
            debug!(%candidate, "Agent replied");
            replies.send(candidate).is_ok()
        }
        Err(e) => {
            warn!(error = %e, "Agent failed to move");
            false
        }
    }
}

/// Channel to a local compute agent.
pub struct WorkerChannel {
    factory: AgentFactory,
    mode: AgentMode,
    agent_seat: Seat,
    worker: Worker,
    generation: u64,
}

impl WorkerChannel {
    /// Starts an agent holding `agent_seat`. A first-seat agent opens immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(factory))]
    pub fn new(factory: AgentFactory, agent_seat: Seat, mode: AgentMode) -> Self {
        let worker = Worker::spawn(factory(), mode, Vec::new(), agent_seat == Seat::First, 0);
        info!("Compute agent started");
        Self {
            factory,
            mode,
            agent_seat,
            worker,
            generation: 0,
        }
    }

    /// Seat the agent currently plays.
    pub fn agent_seat(&self) -> Seat {
        self.agent_seat
    }

    /// Current search mode, re-applied to every fresh agent.
    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    /// How many times the agent has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switches the agent's search mode.
    #[instrument(skip(self))]
    pub fn set_mode(&mut self, mode: AgentMode) -> Result<(), ChannelError> {
        self.mode = mode;
        self.post(Envelope::SetMode(mode))
    }

    fn post(&self, envelope: Envelope) -> Result<(), ChannelError> {
        self.worker.inbox.send(envelope).map_err(|_| {
            ChannelError::new(ChannelErrorKind::WorkerGone, "Compute agent has stopped")
        })
    }

    /// Replaces the agent with a fresh one, replaying `moves` into it first.
    #[instrument(skip(self, moves), fields(replay = moves.len(), seat = %self.agent_seat))]
    fn respawn(&mut self, moves: Vec<Move>) {
        let opens = Seat::to_move_after(moves.len()) == self.agent_seat;
        self.generation += 1;
        // Dropping the old handles stops the old thread and discards its replies.
        self.worker = Worker::spawn(
            (self.factory)(),
            self.mode,
            moves,
            opens,
            self.generation,
        );
        info!(generation = self.generation, opens, "Compute agent replaced");
    }
}

#[async_trait]
impl OpponentChannel for WorkerChannel {
    #[instrument(skip(self), fields(generation = self.generation))]
    async fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        match message {
            Message::Play(candidate) => self.post(Envelope::Move(*candidate)),
            Message::Control(Control::Restart(sender_is_first)) => {
                let sender = if *sender_is_first {
                    Seat::First
                } else {
                    Seat::Second
                };
                self.agent_seat = sender.opponent();
                self.respawn(Vec::new());
                Ok(())
            }
            Message::Control(Control::StartAt(moves)) => {
                self.respawn(moves.clone());
                Ok(())
            }
        }
    }

    async fn recv(&mut self) -> Option<Message> {
        self.worker.replies.recv().await.map(Message::Play)
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Worker
    }
}

impl std::fmt::Debug for WorkerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerChannel")
            .field("mode", &self.mode)
            .field("agent_seat", &self.agent_seat)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

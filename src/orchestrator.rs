//! Session driver: local commands in, session events out.

use crate::error::SessionError;
use crate::games::quoridor::{Move, RulesEngine, Seat};
use crate::opponent::OpponentChannel;
use crate::session::{Incoming, Rejection, Session, Submission};
use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Local input for a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play a move.
    Submit(Move),
    /// View a timeline entry.
    Select(usize),
    /// Start over.
    Restart,
    /// Continue from the rewound cursor with the opponent to move.
    Resume,
    /// Stop the driver.
    Shutdown,
}

/// Messages sent from the orchestrator to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A local move was played.
    Accepted {
        /// The move.
        candidate: Move,
        /// Its timeline index.
        index: usize,
    },
    /// A local move was refused.
    Rejected {
        /// The move.
        candidate: Move,
        /// Why.
        rejection: Rejection,
    },
    /// Local input is disabled after a delivery failure.
    InputDisabled(Move),
    /// The opponent played.
    OpponentMoved(Move),
    /// The game restarted, from either side.
    Restarted,
    /// Play continues from a rewound position with the opponent to move.
    Resumed {
        /// Moves in the kept history.
        plies: usize,
    },
    /// The opponent rebuilt history from a rewound position.
    Resynced {
        /// Moves replayed.
        plies: usize,
    },
    /// A timeline entry was selected.
    Selected(usize),
    /// The game is decided.
    GameOver {
        /// Winning seat.
        winner: Seat,
    },
    /// A message could not reach the opponent. Input stays disabled until a restart.
    DeliveryFailed(String),
    /// The opponent's history could not be reproduced.
    Desynced(String),
    /// The opponent channel closed.
    ChannelClosed,
}

/// Drives one session until shutdown.
pub struct Orchestrator<E: RulesEngine, C: OpponentChannel> {
    session: Session<E, C>,
    commands: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    input_enabled: bool,
}

impl<E: RulesEngine, C: OpponentChannel> Orchestrator<E, C> {
    /// Creates a new orchestrator.
    pub fn new(
        session: Session<E, C>,
        commands: mpsc::UnboundedReceiver<Command>,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            commands,
            event_tx,
            input_enabled: true,
        }
    }

    /// Runs until `Shutdown`, or until the command sender is dropped, and
    /// returns the session.
    ///
    /// A closed opponent channel is reported once; commands keep being served.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<Session<E, C>> {
        info!("Starting session orchestration");
        let mut channel_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command).await?,
                },
                incoming = self.session.next_incoming(), if channel_open => match incoming {
                    Some(outcome) => self.handle_incoming(outcome)?,
                    None => {
                        channel_open = false;
                        warn!("Opponent channel closed");
                        self.event_tx.send(SessionEvent::ChannelClosed)?;
                    }
                },
            }
        }

        info!("Session orchestration stopped");
        Ok(self.session)
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        debug!(?command, "Handling command");
        match command {
            Command::Submit(candidate) => {
                if !self.input_enabled {
                    warn!(%candidate, "Input disabled until restart");
                    self.event_tx.send(SessionEvent::InputDisabled(candidate))?;
                    return Ok(());
                }
                match self.session.submit(candidate).await {
                    Ok(Submission::Accepted { index, result }) => {
                        self.event_tx
                            .send(SessionEvent::Accepted { candidate, index })?;
                        self.announce(result)?;
                    }
                    Ok(Submission::Rejected(rejection)) => {
                        self.event_tx
                            .send(SessionEvent::Rejected { candidate, rejection })?;
                    }
                    Err(e) => self.fail(e)?,
                }
            }
            Command::Select(index) => {
                if self.session.select(index) {
                    self.event_tx.send(SessionEvent::Selected(index))?;
                }
            }
            Command::Restart => match self.session.restart().await {
                Ok(()) => {
                    self.input_enabled = true;
                    self.event_tx.send(SessionEvent::Restarted)?;
                }
                Err(e) => self.fail(e)?,
            },
            Command::Resume => match self.session.resume_from_cursor().await {
                Ok(true) => {
                    let plies = self.session.timeline().cursor();
                    self.event_tx.send(SessionEvent::Resumed { plies })?;
                }
                Ok(false) => debug!("Resume not applicable"),
                Err(e) => self.fail(e)?,
            },
            Command::Shutdown => {}
        }
        Ok(())
    }

    fn handle_incoming(&mut self, outcome: Result<Incoming, SessionError>) -> Result<()> {
        match outcome {
            Ok(Incoming::Moved { candidate, result }) => {
                self.event_tx.send(SessionEvent::OpponentMoved(candidate))?;
                self.announce(result)?;
            }
            Ok(Incoming::Restarted) => {
                self.input_enabled = true;
                self.event_tx.send(SessionEvent::Restarted)?;
            }
            Ok(Incoming::Resynced { plies }) => {
                self.event_tx.send(SessionEvent::Resynced { plies })?;
            }
            Ok(Incoming::Ignored(rejection)) => debug!(%rejection, "Opponent message ignored"),
            Err(e) => self.fail(e)?,
        }
        Ok(())
    }

    fn announce(&self, result: Option<Seat>) -> Result<()> {
        if let Some(winner) = result {
            info!(%winner, "Game over");
            self.event_tx.send(SessionEvent::GameOver { winner })?;
        }
        Ok(())
    }

    fn fail(&mut self, error: SessionError) -> Result<()> {
        warn!(%error, "Session error");
        if error.is_delivery() {
            self.input_enabled = false;
            self.event_tx
                .send(SessionEvent::DeliveryFailed(error.to_string()))?;
        } else {
            self.event_tx.send(SessionEvent::Desynced(error.to_string()))?;
        }
        Ok(())
    }
}

//! Turn-gated game session against one opponent.
//!
//! A [`Session`] owns everything one game needs: the live position, the
//! timeline, the turn state and the opponent channel. Local moves enter
//! through [`Session::submit`]; opponent messages through
//! [`Session::receive`], which never suspends between checking the turn
//! and applying the move.

use crate::error::SessionError;
use crate::games::quoridor::{
    BOARD_SIZE, Control, Location, Message, Move, RulesEngine, Seat, WALL_ANCHORS, WallState,
};
use crate::opponent::OpponentChannel;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::timeline::Timeline;
use derive_getters::Getters;
use derive_more::Display;
use tracing::{debug, info, instrument, warn};

// ─────────────────────────────────────────────────────────────
//  Turn state
// ─────────────────────────────────────────────────────────────

/// Whose move it is, or how the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    /// The local player may move.
    #[display("local turn")]
    LocalTurn,
    /// Waiting for the opponent.
    #[display("remote turn")]
    RemoteTurn,
    /// The game is decided.
    #[display("game over ({_0} won)")]
    GameOver(Seat),
}

/// Turn ownership for one session.
///
/// `first_player_is_local` is fixed when the session starts; the result is
/// set once and only cleared by a restart or a resynchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnState {
    local_turn: bool,
    first_player_is_local: bool,
    result: Option<Seat>,
}

impl TurnState {
    /// Initial state: the first player moves.
    pub fn new(first_player_is_local: bool) -> Self {
        Self {
            local_turn: first_player_is_local,
            first_player_is_local,
            result: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match (self.result, self.local_turn) {
            (Some(winner), _) => Phase::GameOver(winner),
            (None, true) => Phase::LocalTurn,
            (None, false) => Phase::RemoteTurn,
        }
    }

    /// Whether the local player moves first.
    pub fn first_player_is_local(&self) -> bool {
        self.first_player_is_local
    }

    /// Winner, if decided.
    pub fn result(&self) -> Option<Seat> {
        self.result
    }

    /// Seat of the local player.
    pub fn local_seat(&self) -> Seat {
        if self.first_player_is_local {
            Seat::First
        } else {
            Seat::Second
        }
    }

    /// Whether the local player is to move after `plies` moves.
    pub fn local_to_move_at(&self, plies: usize) -> bool {
        Seat::to_move_after(plies) == self.local_seat()
    }

    fn after_local(&mut self, result: Option<Seat>) {
        self.local_turn = false;
        self.result = result;
    }

    fn after_remote(&mut self, result: Option<Seat>) {
        self.local_turn = true;
        self.result = result;
    }

    fn reset(&mut self) {
        *self = Self::new(self.first_player_is_local);
    }

    fn resume_at(&mut self, plies: usize, result: Option<Seat>) {
        self.local_turn = self.local_to_move_at(plies);
        self.result = result;
    }
}

// ─────────────────────────────────────────────────────────────
//  Outcomes
// ─────────────────────────────────────────────────────────────

/// Why a move was refused without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rejection {
    /// The rules engine refused the move.
    #[display("illegal move")]
    IllegalMove,
    /// Not the mover's turn.
    #[display("out of turn")]
    OutOfTurn,
    /// The game is already decided.
    #[display("game concluded")]
    Concluded,
}

/// Result of a local move submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Applied, recorded and sent.
    Accepted {
        /// Timeline index of the new entry.
        index: usize,
        /// Winner, if the move decided the game.
        result: Option<Seat>,
    },
    /// Refused; nothing changed and nothing was sent.
    Rejected(Rejection),
}

/// What an opponent message did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// The opponent's move was applied.
    Moved {
        /// The move.
        candidate: Move,
        /// Winner, if the move decided the game.
        result: Option<Seat>,
    },
    /// The game restarted from the initial position.
    Restarted,
    /// History was rebuilt from the opponent's move list.
    Resynced {
        /// Moves replayed.
        plies: usize,
    },
    /// The message was refused; nothing changed.
    Ignored(Rejection),
}

/// Read-only picture of one position for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct BoardView {
    /// First player's token.
    first_token: Location,
    /// Second player's token.
    second_token: Location,
    /// Walls the first player may still place.
    first_walls: u8,
    /// Walls the second player may still place.
    second_walls: u8,
    /// Winner, if decided.
    result: Option<Seat>,
    /// Wall anchors, indexed `[y][x]`.
    walls: Vec<Vec<WallState>>,
}

impl BoardView {
    fn of<E: RulesEngine>(snapshot: &Snapshot<E>) -> Self {
        let walls = (0..WALL_ANCHORS)
            .map(|y| (0..WALL_ANCHORS).map(|x| snapshot.wall_state(x, y)).collect())
            .collect();
        Self {
            first_token: snapshot.token_location(Seat::First),
            second_token: snapshot.token_location(Seat::Second),
            first_walls: snapshot.walls_remaining(Seat::First),
            second_walls: snapshot.walls_remaining(Seat::Second),
            result: snapshot.result(),
            walls,
        }
    }

    /// Wall anchored at `(x, y)`; [`WallState::None`] outside the grid.
    pub fn wall_at(&self, x: u8, y: u8) -> WallState {
        self.walls
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or(WallState::None)
    }
}

// ─────────────────────────────────────────────────────────────
//  Session
// ─────────────────────────────────────────────────────────────

/// One game against one opponent.
pub struct Session<E: RulesEngine, C: OpponentChannel> {
    store: SnapshotStore<E>,
    live: Snapshot<E>,
    timeline: Timeline<E>,
    turn: TurnState,
    channel: C,
}

impl<E: RulesEngine, C: OpponentChannel> Session<E, C> {
    /// Starts a session at the initial position.
    #[instrument(skip(store, channel), fields(channel = %channel.kind()))]
    pub fn new(store: SnapshotStore<E>, first_player_is_local: bool, channel: C) -> Self {
        let live = store.create();
        let timeline = Timeline::new(store.create());
        info!("Session started");
        Self {
            store,
            live,
            timeline,
            turn: TurnState::new(first_player_is_local),
            channel,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.turn.phase()
    }

    /// Turn state.
    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    /// Move history.
    pub fn timeline(&self) -> &Timeline<E> {
        &self.timeline
    }

    /// Move history, for installing a selection observer.
    pub fn timeline_mut(&mut self) -> &mut Timeline<E> {
        &mut self.timeline
    }

    /// The position of the game as played, regardless of the cursor.
    pub fn live(&self) -> &Snapshot<E> {
        &self.live
    }

    /// Snapshot store backing this session.
    pub fn store(&self) -> &SnapshotStore<E> {
        &self.store
    }

    /// The opponent channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The opponent channel, mutably.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Ends the session, returning its channel.
    pub fn into_channel(self) -> C {
        self.channel
    }

    // ── local input ──────────────────────────────────────────

    /// Submits a local move.
    ///
    /// At the present position the move goes through the turn gate. From a
    /// rewound cursor, the history after the cursor is discarded and the
    /// opponent is sent the replay (`StartAt`) before the move itself.
    ///
    /// The move is recorded locally before it is sent, so a delivery error
    /// means the opponent has not seen a move this side already played.
    #[instrument(skip(self), fields(cursor = self.timeline.cursor(), len = self.timeline.len()))]
    pub async fn submit(&mut self, candidate: Move) -> Result<Submission, SessionError> {
        if self.timeline.is_at_present() {
            self.submit_live(candidate).await
        } else {
            self.submit_branch(candidate).await
        }
    }

    async fn submit_live(&mut self, candidate: Move) -> Result<Submission, SessionError> {
        match self.turn.phase() {
            Phase::GameOver(_) => return Ok(self.reject(candidate, Rejection::Concluded)),
            Phase::RemoteTurn => return Ok(self.reject(candidate, Rejection::OutOfTurn)),
            Phase::LocalTurn => {}
        }
        if !self.live.apply(&candidate) {
            return Ok(self.reject(candidate, Rejection::IllegalMove));
        }

        let index = self.record(candidate)?;
        let result = self.live.result();
        self.turn.after_local(result);
        info!(%candidate, index, ?result, "Local move accepted");

        self.channel.send(&Message::Play(candidate)).await?;
        Ok(Submission::Accepted { index, result })
    }

    async fn submit_branch(&mut self, candidate: Move) -> Result<Submission, SessionError> {
        let cursor = self.timeline.cursor();
        let selected = self.timeline.selected().snapshot();
        if selected.result().is_some() {
            return Ok(self.reject(candidate, Rejection::Concluded));
        }
        if !self.turn.local_to_move_at(cursor) {
            return Ok(self.reject(candidate, Rejection::OutOfTurn));
        }
        if !selected.is_legal(&candidate) {
            return Ok(self.reject(candidate, Rejection::IllegalMove));
        }

        let replay = self.branch_here();
        let index = self.record(candidate)?;
        self.live = self.timeline.latest().snapshot().fork();
        let result = self.live.result();
        self.turn.after_local(result);
        info!(%candidate, index, replay = replay.len(), "Branch move accepted");

        self.channel.send(&Message::start_at(replay)).await?;
        self.channel.send(&Message::Play(candidate)).await?;
        Ok(Submission::Accepted { index, result })
    }

    /// Continues play from a rewound cursor when the opponent is to move there.
    ///
    /// Returns `false` without changing anything when the cursor is at the
    /// present, the selected position is decided, or the local player is to
    /// move (their next [`submit`](Self::submit) branches instead).
    #[instrument(skip(self), fields(cursor = self.timeline.cursor(), len = self.timeline.len()))]
    pub async fn resume_from_cursor(&mut self) -> Result<bool, SessionError> {
        let cursor = self.timeline.cursor();
        if self.timeline.is_at_present()
            || self.timeline.selected().snapshot().result().is_some()
            || self.turn.local_to_move_at(cursor)
        {
            debug!("Nothing to resume");
            return Ok(false);
        }

        let replay = self.branch_here();
        self.live = self.timeline.latest().snapshot().fork();
        self.turn.resume_at(cursor, None);
        info!(plies = replay.len(), "Resumed from rewound position");

        self.channel.send(&Message::start_at(replay)).await?;
        Ok(true)
    }

    /// Starts over from the initial position and tells the opponent.
    #[instrument(skip(self))]
    pub async fn restart(&mut self) -> Result<(), SessionError> {
        self.reset();
        info!(first_player_is_local = self.turn.first_player_is_local, "Session restarted");
        self.channel
            .send(&Message::restart(self.turn.first_player_is_local))
            .await?;
        Ok(())
    }

    /// Selects a timeline entry for viewing. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        self.timeline.select(index)
    }

    // ── opponent input ───────────────────────────────────────

    /// Waits for the next opponent message and applies it.
    ///
    /// `None` means the channel closed.
    pub async fn next_incoming(&mut self) -> Option<Result<Incoming, SessionError>> {
        let message = self.channel.recv().await?;
        Some(self.receive(message))
    }

    /// Applies one opponent message.
    #[instrument(skip(self), fields(phase = %self.turn.phase()))]
    pub fn receive(&mut self, message: Message) -> Result<Incoming, SessionError> {
        match message {
            Message::Play(candidate) => self.receive_move(candidate),
            Message::Control(Control::Restart(sender_is_first)) => {
                if sender_is_first == self.turn.first_player_is_local {
                    warn!(
                        sender_is_first,
                        first_player_is_local = self.turn.first_player_is_local,
                        "Opponent claims the same seat, keeping ours"
                    );
                }
                self.reset();
                info!("Opponent restarted the game");
                Ok(Incoming::Restarted)
            }
            Message::Control(Control::StartAt(moves)) => self.resync(moves),
        }
    }

    fn receive_move(&mut self, candidate: Move) -> Result<Incoming, SessionError> {
        match self.turn.phase() {
            Phase::GameOver(_) => return Ok(self.ignore(candidate, Rejection::Concluded)),
            Phase::LocalTurn => return Ok(self.ignore(candidate, Rejection::OutOfTurn)),
            Phase::RemoteTurn => {}
        }
        if !self.live.apply(&candidate) {
            return Ok(self.ignore(candidate, Rejection::IllegalMove));
        }
        if self.timeline.append(candidate).is_none() {
            self.live = self.timeline.latest().snapshot().fork();
            warn!(%candidate, "Timeline rejected a move the live position accepted");
            return Err(SessionError::desync(format!(
                "timeline rejected opponent move {}",
                candidate
            )));
        }
        let result = self.live.result();
        self.turn.after_remote(result);
        info!(%candidate, ?result, "Opponent move applied");
        Ok(Incoming::Moved { candidate, result })
    }

    /// Rebuilds history from the opponent's move list.
    fn resync(&mut self, moves: Vec<Move>) -> Result<Incoming, SessionError> {
        self.timeline.reset(self.store.create());
        for (ply, candidate) in moves.iter().enumerate() {
            if self.timeline.append(*candidate).is_none() {
                self.live = self.timeline.latest().snapshot().fork();
                let plies = self.timeline.len() - 1;
                self.turn.resume_at(plies, self.live.result());
                warn!(ply, %candidate, "Replay rejected by local rules");
                return Err(SessionError::desync(format!(
                    "replayed move {} ({}) is illegal here",
                    ply + 1,
                    candidate
                )));
            }
        }

        self.live = self.timeline.latest().snapshot().fork();
        self.turn.resume_at(moves.len(), self.live.result());
        info!(plies = moves.len(), phase = %self.turn.phase(), "Resynchronized from opponent");
        Ok(Incoming::Resynced { plies: moves.len() })
    }

    // ── trial evaluations ────────────────────────────────────

    /// Whether `candidate` is legal from the selected position.
    pub fn preview(&self, candidate: &Move) -> bool {
        self.timeline.selected().snapshot().is_legal(candidate)
    }

    /// Cells the side to move could reach with one `MoveTo` from the selected position.
    pub fn reachable_cells(&self) -> Vec<Location> {
        let selected = self.timeline.selected().snapshot();
        (0..BOARD_SIZE)
            .flat_map(|y| (0..BOARD_SIZE).map(move |x| Location::new(x, y)))
            .filter(|cell| selected.is_legal(&Move::MoveTo(cell.x, cell.y)))
            .collect()
    }

    /// Read-only view of the selected position.
    pub fn board(&self) -> BoardView {
        BoardView::of(self.timeline.selected().snapshot())
    }

    // ── internals ────────────────────────────────────────────

    fn reject(&self, candidate: Move, rejection: Rejection) -> Submission {
        warn!(%candidate, %rejection, phase = %self.turn.phase(), "Local move rejected");
        Submission::Rejected(rejection)
    }

    fn ignore(&self, candidate: Move, rejection: Rejection) -> Incoming {
        warn!(%candidate, %rejection, phase = %self.turn.phase(), "Opponent move ignored");
        Incoming::Ignored(rejection)
    }

    /// Appends an already validated move to the timeline.
    ///
    /// On failure the live position is rebuilt from the latest entry so the two stay in step.
    fn record(&mut self, candidate: Move) -> Result<usize, SessionError> {
        match self.timeline.append(candidate) {
            Some(index) => Ok(index),
            None => {
                self.live = self.timeline.latest().snapshot().fork();
                Err(SessionError::desync(format!(
                    "timeline rejected validated move {}",
                    candidate
                )))
            }
        }
    }

    /// Drops history after the cursor and returns the moves leading to it.
    fn branch_here(&mut self) -> Vec<Move> {
        self.timeline.truncate_after_cursor();
        self.timeline.moves_since(0)
    }

    fn reset(&mut self) {
        self.live = self.store.create();
        self.timeline.reset(self.store.create());
        self.turn.reset();
    }
}

impl<E: RulesEngine, C: OpponentChannel> std::fmt::Debug for Session<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.turn.phase())
            .field("timeline", &self.timeline)
            .field("channel", &self.channel.kind())
            .finish_non_exhaustive()
    }
}

//! Shared test doubles: a toy rules engine, a recording channel, fake links.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strictly_quoridor::{
    BOARD_SIZE, CandidateSignal, ChannelError, ChannelKind, DataLink, Description, Direction,
    HandshakeError, HandshakeErrorKind, LinkHandle, LinkState, Location, Message, Move,
    Negotiator, OpponentChannel, RulesEngine, Seat, Signals, WALL_ANCHORS, WallState,
};
use tokio::sync::{mpsc, watch};

pub const WALLS_PER_PLAYER: u8 = 10;

// ─────────────────────────────────────────────────────────────
//  Toy rules engine
// ─────────────────────────────────────────────────────────────

/// Board position for [`ToyEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToyPosition {
    tokens: [Location; 2],
    walls: [u8; 2],
    anchors: BTreeMap<(u8, u8), WallState>,
    plies: usize,
}

fn seat_index(seat: Seat) -> usize {
    match seat {
        Seat::First => 0,
        Seat::Second => 1,
    }
}

/// Orthogonal steps only, walls never block, one wall per anchor.
/// First player starts at (4, 0) and wins on y = 8; second starts at (4, 8)
/// and wins on y = 0.
#[derive(Debug, Default)]
pub struct ToyEngine;

impl ToyEngine {
    fn winner(position: &ToyPosition) -> Option<Seat> {
        if position.tokens[0].y == BOARD_SIZE - 1 {
            Some(Seat::First)
        } else if position.tokens[1].y == 0 {
            Some(Seat::Second)
        } else {
            None
        }
    }

    fn step(from: Location, direction: Direction) -> Option<(u8, u8)> {
        let (x, y) = (from.x as i16, from.y as i16);
        let (x, y) = match direction {
            Direction::Up => (x, y - 1),
            Direction::Down => (x, y + 1),
            Direction::Left => (x - 1, y),
            Direction::Right => (x + 1, y),
        };
        let size = BOARD_SIZE as i16;
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some((x as u8, y as u8))
        } else {
            None
        }
    }
}

impl RulesEngine for ToyEngine {
    type Position = ToyPosition;

    fn create_initial(&self) -> ToyPosition {
        ToyPosition {
            tokens: [Location::new(4, 0), Location::new(4, BOARD_SIZE - 1)],
            walls: [WALLS_PER_PLAYER; 2],
            anchors: BTreeMap::new(),
            plies: 0,
        }
    }

    fn duplicate(&self, position: &ToyPosition) -> ToyPosition {
        position.clone()
    }

    fn apply_move(&self, position: &mut ToyPosition, candidate: &Move) -> bool {
        if Self::winner(position).is_some() {
            return false;
        }
        let mover = seat_index(Seat::to_move_after(position.plies));
        let current = position.tokens[mover];
        let other = position.tokens[1 - mover];

        match *candidate {
            Move::MoveToken(direction) => {
                let Some((x, y)) = Self::step(current, direction) else {
                    return false;
                };
                if other == Location::new(x, y) {
                    return false;
                }
                position.tokens[mover] = Location::new(x, y);
            }
            Move::MoveTo(x, y) => {
                let adjacent = current.x.abs_diff(x) + current.y.abs_diff(y) == 1;
                if !adjacent || x >= BOARD_SIZE || y >= BOARD_SIZE || other == Location::new(x, y)
                {
                    return false;
                }
                position.tokens[mover] = Location::new(x, y);
            }
            Move::AddWall {
                location: (x, y),
                orientation,
            } => {
                if x >= WALL_ANCHORS
                    || y >= WALL_ANCHORS
                    || position.walls[mover] == 0
                    || position.anchors.contains_key(&(x, y))
                {
                    return false;
                }
                position.anchors.insert((x, y), orientation.into());
                position.walls[mover] -= 1;
            }
        }
        position.plies += 1;
        true
    }

    fn result(&self, position: &ToyPosition) -> Option<Seat> {
        Self::winner(position)
    }

    fn walls_remaining(&self, position: &ToyPosition, seat: Seat) -> u8 {
        position.walls[seat_index(seat)]
    }

    fn token_location(&self, position: &ToyPosition, seat: Seat) -> Location {
        position.tokens[seat_index(seat)]
    }

    fn wall_state(&self, position: &ToyPosition, x: u8, y: u8) -> WallState {
        position
            .anchors
            .get(&(x, y))
            .copied()
            .unwrap_or(WallState::None)
    }
}

/// [`ToyEngine`] that stops accepting moves after a fixed number of applies.
///
/// Breaks the determinism contract on purpose, to exercise the paths where
/// two copies of the same position disagree.
#[derive(Debug)]
pub struct RationedEngine {
    applies_left: AtomicUsize,
}

impl RationedEngine {
    pub fn new(applies: usize) -> Self {
        Self {
            applies_left: AtomicUsize::new(applies),
        }
    }
}

impl RulesEngine for RationedEngine {
    type Position = ToyPosition;

    fn create_initial(&self) -> ToyPosition {
        ToyEngine.create_initial()
    }

    fn duplicate(&self, position: &ToyPosition) -> ToyPosition {
        position.clone()
    }

    fn apply_move(&self, position: &mut ToyPosition, candidate: &Move) -> bool {
        let granted = self
            .applies_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        granted && ToyEngine.apply_move(position, candidate)
    }

    fn result(&self, position: &ToyPosition) -> Option<Seat> {
        ToyEngine.result(position)
    }

    fn walls_remaining(&self, position: &ToyPosition, seat: Seat) -> u8 {
        ToyEngine.walls_remaining(position, seat)
    }

    fn token_location(&self, position: &ToyPosition, seat: Seat) -> Location {
        ToyEngine.token_location(position, seat)
    }

    fn wall_state(&self, position: &ToyPosition, x: u8, y: u8) -> WallState {
        ToyEngine.wall_state(position, x, y)
    }
}

/// Moves that march the first player from (4, 0) to victory at (4, 8),
/// interleaved with the second player shuffling sideways on row 8.
pub fn first_player_race() -> Vec<Move> {
    let mut moves = Vec::new();
    for y in 1..BOARD_SIZE {
        moves.push(Move::MoveTo(4, y));
        if y < BOARD_SIZE - 1 {
            let x = if y % 2 == 1 { 3 } else { 4 };
            moves.push(Move::MoveTo(x, BOARD_SIZE - 1));
        }
    }
    moves
}

// ─────────────────────────────────────────────────────────────
//  Recording opponent channel
// ─────────────────────────────────────────────────────────────

/// Opponent channel that records sends and replays scripted input.
#[derive(Debug)]
pub struct RecordingChannel {
    pub sent: Vec<Message>,
    pub incoming: mpsc::UnboundedReceiver<Message>,
    pub failing: bool,
}

/// Creates a recording channel and the sender that feeds its `recv`.
pub fn recording_channel() -> (RecordingChannel, mpsc::UnboundedSender<Message>) {
    let (tx, incoming) = mpsc::unbounded_channel();
    (
        RecordingChannel {
            sent: Vec::new(),
            incoming,
            failing: false,
        },
        tx,
    )
}

#[async_trait]
impl OpponentChannel for RecordingChannel {
    async fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        if self.failing {
            return Err(ChannelError::not_open("recording channel set to fail"));
        }
        self.sent.push(message.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Message> {
        self.incoming.recv().await
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Peer
    }
}

// ─────────────────────────────────────────────────────────────
//  Fake data link
// ─────────────────────────────────────────────────────────────

/// Test side of a fake link.
pub struct LinkControls {
    pub state: watch::Sender<LinkState>,
    pub inbound: mpsc::UnboundedSender<String>,
    pub sent: mpsc::UnboundedReceiver<String>,
}

struct FakeLink {
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl DataLink for FakeLink {
    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        self.sent
            .send(text)
            .map_err(|_| ChannelError::not_open("fake link dropped"))
    }
}

/// Creates a link in the `Connecting` state.
pub fn fake_link() -> (LinkHandle, LinkControls) {
    let (state_tx, state) = watch::channel(LinkState::Connecting);
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (sent_tx, sent) = mpsc::unbounded_channel();
    (
        LinkHandle {
            link: Arc::new(FakeLink { sent: sent_tx }),
            state,
            inbound,
        },
        LinkControls {
            state: state_tx,
            inbound: inbound_tx,
            sent,
        },
    )
}

// ─────────────────────────────────────────────────────────────
//  Fake negotiator
// ─────────────────────────────────────────────────────────────

/// Negotiator that records calls and fabricates descriptions.
#[derive(Debug, Clone, Default)]
pub struct FakeNegotiator {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub reject_remote: bool,
}

impl FakeNegotiator {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Negotiator for FakeNegotiator {
    async fn open_data_channel(&self, label: &str) -> Result<(), HandshakeError> {
        self.record(format!("open_data_channel:{}", label));
        Ok(())
    }

    async fn create_offer(&self) -> Result<Description, HandshakeError> {
        self.record("create_offer");
        Ok(Description::new("offer"))
    }

    async fn create_answer(&self) -> Result<Description, HandshakeError> {
        self.record("create_answer");
        Ok(Description::new("answer"))
    }

    async fn set_local_description(&self, description: &Description) -> Result<(), HandshakeError> {
        self.record(format!("set_local:{}", description));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: &Description,
    ) -> Result<(), HandshakeError> {
        self.record(format!("set_remote:{}", description));
        if self.reject_remote {
            return Err(HandshakeError::new(
                HandshakeErrorKind::MalformedDescription,
                "fake rejects remote descriptions",
            ));
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<Description> {
        let calls = self.calls();
        let local = calls
            .iter()
            .rev()
            .find_map(|call| call.strip_prefix("set_local:"))?;
        Some(Description::new(format!("{}+candidates", local)))
    }

    async fn close(&self) -> Result<(), HandshakeError> {
        self.record("close");
        Ok(())
    }
}

/// Test side of a fake negotiation.
pub struct NegotiationControls {
    pub candidates: mpsc::UnboundedSender<CandidateSignal>,
    pub link: LinkControls,
}

/// Creates a fake negotiator with its signals and controls.
pub fn fake_negotiation() -> (FakeNegotiator, Signals, NegotiationControls) {
    let (candidate_tx, candidates) = mpsc::unbounded_channel();
    let (link, link_controls) = fake_link();
    (
        FakeNegotiator::default(),
        Signals { candidates, link },
        NegotiationControls {
            candidates: candidate_tx,
            link: link_controls,
        },
    )
}

//! Ownership-typed game positions.
//!
//! A [`Snapshot`] is a move-only handle: forking produces an independent
//! handle, and dropping a handle releases its position exactly once. The
//! store counts live handles so leaks show up in tests.

use crate::games::quoridor::{Location, Move, RulesEngine, Seat, WallState};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{instrument, trace};

/// Creates snapshots for one rules engine and tracks how many are alive.
pub struct SnapshotStore<E: RulesEngine> {
    engine: Arc<E>,
    live: Arc<AtomicUsize>,
}

impl<E: RulesEngine> SnapshotStore<E> {
    /// Creates a store around an engine.
    pub fn new(engine: E) -> Self {
        Self::shared(Arc::new(engine))
    }

    /// Creates a store around an engine that is already shared.
    pub fn shared(engine: Arc<E>) -> Self {
        Self {
            engine,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a snapshot of the initial position.
    #[instrument(skip(self))]
    pub fn create(&self) -> Snapshot<E> {
        let position = self.engine.create_initial();
        Snapshot::adopt(self.engine.clone(), self.live.clone(), position)
    }

    /// Number of snapshots created by this store that have not been released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// The engine behind this store.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }
}

impl<E: RulesEngine> Clone for SnapshotStore<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            live: self.live.clone(),
        }
    }
}

impl<E: RulesEngine> std::fmt::Debug for SnapshotStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("live", &self.live())
            .finish_non_exhaustive()
    }
}

/// Exclusively owned handle to one board position.
///
/// Deliberately not `Clone`: use [`Snapshot::fork`] for an independent copy.
pub struct Snapshot<E: RulesEngine> {
    position: E::Position,
    engine: Arc<E>,
    live: Arc<AtomicUsize>,
}

impl<E: RulesEngine> Snapshot<E> {
    fn adopt(engine: Arc<E>, live: Arc<AtomicUsize>, position: E::Position) -> Self {
        let count = live.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(live = count, "snapshot created");
        Self {
            position,
            engine,
            live,
        }
    }

    /// Creates an independent copy of this position.
    pub fn fork(&self) -> Self {
        let position = self.engine.duplicate(&self.position);
        Self::adopt(self.engine.clone(), self.live.clone(), position)
    }

    /// Applies a move in place. Returns `false` and leaves the position as it was if illegal.
    pub fn apply(&mut self, candidate: &Move) -> bool {
        self.engine.apply_move(&mut self.position, candidate)
    }

    /// Forks this position and applies a move to the fork.
    ///
    /// Returns `None` (with the fork already released) when the move is illegal.
    pub fn derive(&self, candidate: &Move) -> Option<Self> {
        let mut next = self.fork();
        next.apply(candidate).then_some(next)
    }

    /// Whether a move would be accepted here. Never touches this position.
    pub fn is_legal(&self, candidate: &Move) -> bool {
        self.derive(candidate).is_some()
    }

    /// Winner, if the game has concluded in this position.
    pub fn result(&self) -> Option<Seat> {
        self.engine.result(&self.position)
    }

    /// Walls the seat may still place.
    pub fn walls_remaining(&self, seat: Seat) -> u8 {
        self.engine.walls_remaining(&self.position, seat)
    }

    /// Token cell of the seat.
    pub fn token_location(&self, seat: Seat) -> Location {
        self.engine.token_location(&self.position, seat)
    }

    /// Wall anchored at `(x, y)`.
    pub fn wall_state(&self, x: u8, y: u8) -> WallState {
        self.engine.wall_state(&self.position, x, y)
    }

    /// Read-only access to the engine's position.
    pub fn position(&self) -> &E::Position {
        &self.position
    }

    /// Releases the position. Equivalent to dropping the handle.
    pub fn release(self) {
        drop(self);
    }
}

impl<E: RulesEngine> Drop for Snapshot<E> {
    fn drop(&mut self) {
        let count = self.live.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(live = count, "snapshot released");
    }
}

impl<E: RulesEngine> std::fmt::Debug for Snapshot<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("result", &self.result())
            .finish_non_exhaustive()
    }
}

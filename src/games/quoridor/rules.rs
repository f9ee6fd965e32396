//! Boundary to the external Quoridor rules engine.

use super::types::{Location, Move, Seat, WallState};

/// The rules engine this crate drives but does not implement.
///
/// Positions are opaque handles. Releasing a position is dropping it, so an
/// engine backed by foreign memory frees it in its position type's `Drop`.
/// Engines are expected to be deterministic: replaying the same moves from
/// [`RulesEngine::create_initial`] must always reach the same position.
pub trait RulesEngine: Send + Sync + 'static {
    /// Opaque board position handle.
    type Position: Send + 'static;

    /// Creates the starting position.
    fn create_initial(&self) -> Self::Position;

    /// Creates an independent copy of a position.
    fn duplicate(&self, position: &Self::Position) -> Self::Position;

    /// Applies a move for the side to move.
    ///
    /// Returns `false` and leaves the position untouched when the move is illegal.
    fn apply_move(&self, position: &mut Self::Position, candidate: &Move) -> bool;

    /// Winner of the position, if the game has concluded.
    fn result(&self, position: &Self::Position) -> Option<Seat>;

    /// Walls the seat may still place.
    fn walls_remaining(&self, position: &Self::Position, seat: Seat) -> u8;

    /// Current token cell of the seat.
    fn token_location(&self, position: &Self::Position, seat: Seat) -> Location;

    /// Wall anchored at `(x, y)`.
    fn wall_state(&self, position: &Self::Position, x: u8, y: u8) -> WallState;
}

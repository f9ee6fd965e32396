//! Core domain types for Quoridor moves and positions.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Cells per board side.
pub const BOARD_SIZE: u8 = 9;

/// Wall anchors per board side (walls sit between cells).
pub const WALL_ANCHORS: u8 = BOARD_SIZE - 1;

/// Seat at the table: who moves first and who moves second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Seat {
    /// Moves first.
    First,
    /// Moves second.
    Second,
}

impl Seat {
    /// Returns the other seat.
    pub fn opponent(self) -> Self {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }

    /// Seat of the side to move after `plies` moves have been played.
    pub fn to_move_after(plies: usize) -> Self {
        if plies % 2 == 0 {
            Seat::First
        } else {
            Seat::Second
        }
    }
}

/// Direction for a relative token step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Towards y = 0.
    Up,
    /// Towards y = 8.
    Down,
    /// Towards x = 0.
    Left,
    /// Towards x = 8.
    Right,
}

/// Orientation of a two-cell wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    /// Blocks vertical movement.
    Horizontal,
    /// Blocks horizontal movement.
    Vertical,
}

/// Wall occupancy at a wall anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum WallState {
    /// No wall anchored here.
    None,
    /// A horizontal wall is anchored here.
    Horizontal,
    /// A vertical wall is anchored here.
    Vertical,
}

impl From<Orientation> for WallState {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Horizontal => WallState::Horizontal,
            Orientation::Vertical => WallState::Vertical,
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct Location {
    /// Column, 0 on the left.
    pub x: u8,
    /// Row, 0 at the top.
    pub y: u8,
}

/// A game move understood by the rules engine.
///
/// Serializes to the stable wire shape shared with remote peers:
/// `{"MoveTo":[x,y]}`, `{"MoveToken":"Up"}`,
/// `{"AddWall":{"location":[x,y],"orientation":"Horizontal"}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    /// Step the token one cell in a direction.
    MoveToken(Direction),
    /// Move the token to an absolute cell.
    MoveTo(u8, u8),
    /// Place a wall anchored at `location`.
    AddWall {
        /// Wall anchor.
        location: (u8, u8),
        /// Wall orientation.
        orientation: Orientation,
    },
}

impl Move {
    /// Convenience constructor for [`Move::AddWall`].
    pub fn wall(x: u8, y: u8, orientation: Orientation) -> Self {
        Move::AddWall {
            location: (x, y),
            orientation,
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Move::MoveToken(direction) => write!(f, "Move {}", direction),
            Move::MoveTo(x, y) => write!(f, "Move to {}, {}", x, y),
            Move::AddWall {
                location: (x, y),
                orientation,
            } => write!(f, "Add {} wall at {}, {}", orientation, x, y),
        }
    }
}

mod message;
mod rules;
mod types;

pub use message::{Control, Message, SetupMarker, Step};
pub use rules::RulesEngine;
pub use types::{BOARD_SIZE, Direction, Location, Move, Orientation, Seat, WALL_ANCHORS, WallState};

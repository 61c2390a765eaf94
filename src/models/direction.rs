use serde::{Deserialize, Serialize};

/// One of the four swipe directions a move can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
}

impl MoveDirection {
    /// The symbolic form stored in a session's `lastMove` record.
    pub fn symbol(&self) -> &'static str {
        match self {
            MoveDirection::Up => "up",
            MoveDirection::Down => "down",
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<MoveDirection> {
        match symbol {
            "up" => Some(MoveDirection::Up),
            "down" => Some(MoveDirection::Down),
            "left" => Some(MoveDirection::Left),
            "right" => Some(MoveDirection::Right),
            _ => None,
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::models::coordinate::Coordinate;
use crate::models::tile::TileValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Players {
    Single,
    Multi,
}

/// Everything a joining client needs to reconstruct the creator's game:
/// board shape, timing, and the two starting tiles, plus the opponent's
/// display name for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSetup<T: TileValue> {
    pub players: Players,
    pub setup_for_creating: bool,
    pub dimension: u32,
    pub turn_duration: u32,
    pub first_value: T,
    pub first_coordinate: Coordinate,
    pub second_value: T,
    pub second_coordinate: Coordinate,
    pub opponent_display_name: String,
}

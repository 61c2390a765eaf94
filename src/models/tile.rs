use std::fmt;

use serde::{Deserialize, Serialize};

/// The game-defined scalar carried by a tile. The synchronizer never
/// interprets it beyond round-tripping it through its decimal score.
pub trait TileValue: Clone + Send + Sync + fmt::Debug + 'static {
    fn from_score(score: i64) -> Self;
    fn score(&self) -> i64;
    /// The well-known starting value new tiles spawn with.
    fn base() -> Self;
}

/// The classic powers-of-two tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwosPowerTile(pub i64);

impl TileValue for TwosPowerTile {
    fn from_score(score: i64) -> Self {
        TwosPowerTile(score)
    }

    fn score(&self) -> i64 {
        self.0
    }

    fn base() -> Self {
        TwosPowerTile(2)
    }
}

//! Store-facing record types for one game session: the key constants of the
//! session schema, tree builders for writes, and typed accessors over
//! snapshots read back from the store.

use crate::models::coordinate::Coordinate;
use crate::models::direction::MoveDirection;
use crate::models::tile::TileValue;
use crate::store::TreeValue;

/// Field names of the session tree and its neighbors.
pub mod keys {
    pub const SESSIONS: &str = "sessions";
    pub const USERS: &str = "users";
    pub const DISPLAY_NAME: &str = "displayName";

    pub const BOARD_DIMENSION: &str = "boardDimension";
    pub const TURN_DURATION: &str = "turnDuration";
    pub const CREATOR: &str = "creatorId";
    pub const JOINER: &str = "joinerId";
    pub const INITIAL_STATE: &str = "initialState";
    pub const TILE1: &str = "tile1";
    pub const TILE2: &str = "tile2";
    pub const POSITION: &str = "position";
    pub const VALUE: &str = "value";
    pub const LAST_MOVE: &str = "lastMove";
    pub const DIRECTION: &str = "direction";
    pub const UPDATER: &str = "updaterId";
    pub const NEW_TILE: &str = "newTile";
}

/// Marker for a text field that has not been written yet.
pub const SENTINEL: &str = "_";

/// What the creator writes when a session is first allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionRecord {
    pub board_dimension: u32,
    pub turn_duration: u32,
    pub creator_id: String,
}

impl NewSessionRecord {
    pub fn to_tree(&self) -> TreeValue {
        TreeValue::branch([
            (
                keys::BOARD_DIMENSION,
                TreeValue::Int(i64::from(self.board_dimension)),
            ),
            (
                keys::TURN_DURATION,
                TreeValue::Int(i64::from(self.turn_duration)),
            ),
            (keys::CREATOR, TreeValue::text(&self.creator_id)),
            (keys::LAST_MOVE, empty_last_move()),
        ])
    }
}

/// A `lastMove` record with every field still at the sentinel, so a fresh
/// session is distinguishable from one with a real move.
pub fn empty_last_move() -> TreeValue {
    TreeValue::branch([
        (keys::DIRECTION, TreeValue::text(SENTINEL)),
        (keys::UPDATER, TreeValue::text(SENTINEL)),
        (
            keys::NEW_TILE,
            TreeValue::branch([
                (keys::POSITION, TreeValue::text(SENTINEL)),
                (keys::VALUE, TreeValue::text(SENTINEL)),
            ]),
        ),
    ])
}

fn tile_tree<T: TileValue>(tile: &T, at: Coordinate) -> TreeValue {
    TreeValue::branch([
        (keys::POSITION, TreeValue::text(at.encode())),
        (keys::VALUE, TreeValue::text(tile.score().to_string())),
    ])
}

pub fn initial_state_tree<T: TileValue>(
    first_tile: &T,
    first_coordinate: Coordinate,
    second_tile: &T,
    second_coordinate: Coordinate,
) -> TreeValue {
    TreeValue::branch([
        (keys::TILE1, tile_tree(first_tile, first_coordinate)),
        (keys::TILE2, tile_tree(second_tile, second_coordinate)),
    ])
}

pub fn last_move_tree<T: TileValue>(
    direction: MoveDirection,
    updater_id: &str,
    tile: &T,
    at: Coordinate,
) -> TreeValue {
    TreeValue::branch([
        (keys::DIRECTION, TreeValue::text(direction.symbol())),
        (keys::UPDATER, TreeValue::text(updater_id)),
        (keys::NEW_TILE, tile_tree(tile, at)),
    ])
}

/// One-shot read of a session record, with typed accessors over the raw tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    tree: TreeValue,
}

impl SessionSnapshot {
    pub fn new(tree: TreeValue) -> Self {
        SessionSnapshot { tree }
    }

    pub fn creator_id(&self) -> Option<&str> {
        self.tree.child(keys::CREATOR)?.as_str()
    }

    pub fn has_initial_state(&self) -> bool {
        self.tree.child(keys::INITIAL_STATE).is_some()
    }

    pub fn has_joiner(&self) -> bool {
        self.tree.child(keys::JOINER).is_some()
    }

    pub fn board_dimension(&self) -> Option<u32> {
        u32::try_from(self.tree.child(keys::BOARD_DIMENSION)?.as_int()?).ok()
    }

    pub fn turn_duration(&self) -> Option<u32> {
        u32::try_from(self.tree.child(keys::TURN_DURATION)?.as_int()?).ok()
    }

    /// Raw `(position, value)` text of one starting tile; `slot` is
    /// [`keys::TILE1`] or [`keys::TILE2`].
    pub fn initial_tile_raw(&self, slot: &str) -> Option<(String, String)> {
        let tile = self.tree.child(keys::INITIAL_STATE)?.child(slot)?;
        let position = tile.child(keys::POSITION)?.as_str()?.to_owned();
        let value = tile.child(keys::VALUE)?.as_str()?.to_owned();
        Some((position, value))
    }
}

/// The four raw text fields of a `lastMove` record.
#[derive(Debug, Clone, PartialEq)]
pub struct LastMoveFields {
    pub direction: String,
    pub updater_id: String,
    pub position: String,
    pub value: String,
}

impl LastMoveFields {
    /// `None` when any of the four fields is missing, which happens for
    /// partial intermediate writes.
    pub fn from_tree(tree: &TreeValue) -> Option<LastMoveFields> {
        let direction = tree.child(keys::DIRECTION)?.as_str()?.to_owned();
        let updater_id = tree.child(keys::UPDATER)?.as_str()?.to_owned();
        let new_tile = tree.child(keys::NEW_TILE)?;
        let position = new_tile.child(keys::POSITION)?.as_str()?.to_owned();
        let value = new_tile.child(keys::VALUE)?.as_str()?.to_owned();
        Some(LastMoveFields {
            direction,
            updater_id,
            position,
            value,
        })
    }

    /// True when any field still holds the unset marker.
    pub fn is_sentinel(&self) -> bool {
        [&self.direction, &self.updater_id, &self.position, &self.value]
            .iter()
            .any(|field| field.as_str() == SENTINEL)
    }
}

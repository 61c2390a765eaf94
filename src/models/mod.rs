pub mod coordinate;
pub mod direction;
pub mod game_setup;
pub mod session;
pub mod tile;

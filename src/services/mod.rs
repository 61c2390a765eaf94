pub mod errors;
pub mod game_session_service;
pub mod identity_service;

use std::fmt;

use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum GameSessionServiceError {
    /// No signed-in identity; the store is never contacted.
    NotSignedIn,
    /// No session has been created or joined yet.
    PinNotSet,
    NoSuchSession(i64),
    /// The session exists but its creator has not finished setting it up.
    SessionNotReady,
    AlreadyJoined,
    /// The other player's uid resolves to no display name.
    NoDisplayName(String),
    /// The session record is missing or has malformed game fields.
    NoGameData(i64),
    Repository(SessionRepositoryError),
}

impl fmt::Display for GameSessionServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameSessionServiceError::NotSignedIn => write!(
                f,
                "There seems to be something wrong with your account. Try to sign out and back in again."
            ),
            GameSessionServiceError::PinNotSet => write!(f, "No session pin has been set"),
            GameSessionServiceError::NoSuchSession(pin) => {
                write!(f, "There is no session with pin {}", pin)
            }
            GameSessionServiceError::SessionNotReady => {
                write!(f, "The session is not completely created yet")
            }
            GameSessionServiceError::AlreadyJoined => {
                write!(f, "The session already has an opponent")
            }
            GameSessionServiceError::NoDisplayName(uid) => {
                write!(f, "User {} does not have a display name", uid)
            }
            GameSessionServiceError::NoGameData(pin) => {
                write!(f, "The session has no game with pin {}", pin)
            }
            GameSessionServiceError::Repository(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for GameSessionServiceError {}

impl From<SessionRepositoryError> for GameSessionServiceError {
    fn from(err: SessionRepositoryError) -> Self {
        GameSessionServiceError::Repository(err)
    }
}

impl From<StoreError> for GameSessionServiceError {
    fn from(err: StoreError) -> Self {
        GameSessionServiceError::Repository(SessionRepositoryError::Store(err))
    }
}

use crate::store::StoreError;

#[derive(Debug)]
pub enum SessionRepositoryError {
    Store(StoreError),
}

impl std::fmt::Display for SessionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRepositoryError::Store(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for SessionRepositoryError {}

impl From<StoreError> for SessionRepositoryError {
    fn from(err: StoreError) -> Self {
        SessionRepositoryError::Store(err)
    }
}

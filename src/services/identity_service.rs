use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::session::keys;
use crate::store::{KeyedStore, StoreError};

#[cfg(test)]
use mockall::automock;

/// A signed-in user. `id` is the numeric identifier a created session adopts
/// as its pin; `uid` is the opaque identity string that tags writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub uid: String,
}

/// The consumed identity abstraction: who is signed in, and how other users'
/// display names resolve.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    async fn display_name(&self, uid: &str) -> Result<Option<String>, StoreError>;
}

/// Identity provider backed by the same store the sessions live in: display
/// names are read from `/users/<uid>/displayName`. The signed-in identity is
/// handed over by the authentication layer through [`set_current`].
///
/// [`set_current`]: StoreIdentityProvider::set_current
pub struct StoreIdentityProvider {
    store: Arc<dyn KeyedStore>,
    current: Mutex<Option<Identity>>,
}

impl StoreIdentityProvider {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        StoreIdentityProvider {
            store,
            current: Mutex::new(None),
        }
    }

    pub fn set_current(&self, identity: Option<Identity>) {
        match self.current.lock() {
            Ok(mut guard) => *guard = identity,
            Err(poisoned) => *poisoned.into_inner() = identity,
        }
    }
}

#[async_trait]
impl IdentityProvider for StoreIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn display_name(&self, uid: &str) -> Result<Option<String>, StoreError> {
        let path = format!("{}/{}/{}", keys::USERS, uid, keys::DISPLAY_NAME);
        Ok(self
            .store
            .get(&path)
            .await?
            .and_then(|value| value.as_str().map(str::to_owned)))
    }
}

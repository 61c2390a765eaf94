#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use game_session_sync::models::coordinate::Coordinate;
use game_session_sync::models::direction::MoveDirection;
use game_session_sync::models::tile::TwosPowerTile;
use game_session_sync::repositories::session_repository::SessionRepository;
use game_session_sync::services::game_session_service::{
    CreatorDelegate, GameDelegate, GameSessionService,
};
use game_session_sync::services::identity_service::{Identity, StoreIdentityProvider};
use game_session_sync::store::{KeyedStore, MemoryStore, TreeValue};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Builds a synchronizer signed in as the given user, with the display name
/// already published to the shared store.
pub async fn signed_in_client(
    store: &Arc<MemoryStore>,
    id: i64,
    uid: &str,
    display_name: &str,
) -> GameSessionService<TwosPowerTile> {
    store
        .set(
            &format!("users/{}/displayName", uid),
            TreeValue::text(display_name),
        )
        .await
        .unwrap();
    let identity = Arc::new(StoreIdentityProvider::new(
        Arc::clone(store) as Arc<dyn KeyedStore>
    ));
    identity.set_current(Some(Identity {
        id,
        uid: uid.to_string(),
    }));
    GameSessionService::new(
        SessionRepository::new(Arc::clone(store) as Arc<dyn KeyedStore>),
        identity,
    )
}

#[derive(Default)]
pub struct RecordingGameDelegate {
    pub moves: Mutex<Vec<(MoveDirection, TwosPowerTile, Coordinate)>>,
}

impl RecordingGameDelegate {
    pub fn move_count(&self) -> usize {
        self.moves.lock().unwrap().len()
    }
}

#[async_trait]
impl GameDelegate<TwosPowerTile> for RecordingGameDelegate {
    async fn opponent_moved(
        &self,
        direction: MoveDirection,
        spawned_tile: TwosPowerTile,
        spawned_at: Coordinate,
    ) {
        self.moves
            .lock()
            .unwrap()
            .push((direction, spawned_tile, spawned_at));
    }
}

#[derive(Default)]
pub struct RecordingCreatorDelegate {
    pub opponents: Mutex<Vec<String>>,
}

#[async_trait]
impl CreatorDelegate for RecordingCreatorDelegate {
    async fn opponent_joined(&self, display_name: &str) {
        self.opponents.lock().unwrap().push(display_name.to_string());
    }
}

/// Polls `condition` for up to a second; returns whether it became true.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Settling time for events that must NOT arrive.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

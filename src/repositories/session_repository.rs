use std::sync::Arc;

use tracing::debug;

use crate::models::coordinate::Coordinate;
use crate::models::direction::MoveDirection;
use crate::models::session::{self, keys, NewSessionRecord, SessionSnapshot};
use crate::models::tile::TileValue;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::store::{KeyedStore, Subscription, TreeValue};

/// Binds one session's key space under `/sessions` and owns every read and
/// write the synchronizer performs against the store.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyedStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        SessionRepository { store }
    }

    /// Deterministic store key for a session pin.
    pub fn session_key(pin: i64) -> String {
        format!("session{}", pin)
    }

    fn session_path(pin: i64) -> String {
        format!("{}/{}", keys::SESSIONS, Self::session_key(pin))
    }

    fn last_move_path(pin: i64) -> String {
        format!("{}/{}", Self::session_path(pin), keys::LAST_MOVE)
    }

    pub async fn create_session(
        &self,
        pin: i64,
        record: &NewSessionRecord,
    ) -> Result<(), SessionRepositoryError> {
        debug!(pin, "writing new session record");
        self.store
            .set(&Self::session_path(pin), record.to_tree())
            .await?;
        Ok(())
    }

    pub async fn arm_disconnect_cleanup(&self, pin: i64) -> Result<(), SessionRepositoryError> {
        self.store
            .remove_on_disconnect(&Self::session_path(pin))
            .await?;
        Ok(())
    }

    pub async fn fetch_session(
        &self,
        pin: i64,
    ) -> Result<Option<SessionSnapshot>, SessionRepositoryError> {
        Ok(self
            .store
            .get(&Self::session_path(pin))
            .await?
            .map(SessionSnapshot::new))
    }

    pub async fn write_initial_state<T: TileValue>(
        &self,
        pin: i64,
        first_tile: &T,
        first_coordinate: Coordinate,
        second_tile: &T,
        second_coordinate: Coordinate,
    ) -> Result<(), SessionRepositoryError> {
        let path = format!("{}/{}", Self::session_path(pin), keys::INITIAL_STATE);
        self.store
            .set(
                &path,
                session::initial_state_tree(
                    first_tile,
                    first_coordinate,
                    second_tile,
                    second_coordinate,
                ),
            )
            .await?;
        Ok(())
    }

    /// Claims the joiner slot if and only if it is still empty; returns
    /// whether this caller won the slot.
    pub async fn claim_joiner_slot(
        &self,
        pin: i64,
        joiner_id: &str,
    ) -> Result<bool, SessionRepositoryError> {
        let path = format!("{}/{}", Self::session_path(pin), keys::JOINER);
        Ok(self
            .store
            .set_if_absent(&path, TreeValue::text(joiner_id))
            .await?)
    }

    pub async fn write_last_move<T: TileValue>(
        &self,
        pin: i64,
        direction: MoveDirection,
        updater_id: &str,
        tile: &T,
        at: Coordinate,
    ) -> Result<(), SessionRepositoryError> {
        self.store
            .set(
                &Self::last_move_path(pin),
                session::last_move_tree(direction, updater_id, tile, at),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_session(&self, pin: i64) -> Result<(), SessionRepositoryError> {
        self.store.remove(&Self::session_path(pin)).await?;
        Ok(())
    }

    pub fn subscribe_last_move(&self, pin: i64) -> Subscription {
        self.store.subscribe_value(&Self::last_move_path(pin))
    }

    pub fn subscribe_session_children(&self, pin: i64) -> Subscription {
        self.store.subscribe_child_added(&Self::session_path(pin))
    }

    pub fn unsubscribe(&self, id: u64) {
        self.store.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::LastMoveFields;
    use crate::models::tile::TwosPowerTile;
    use crate::store::MemoryStore;

    fn repository() -> SessionRepository {
        SessionRepository::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_session_key_is_deterministic() {
        assert_eq!(SessionRepository::session_key(42), "session42");
        assert_eq!(SessionRepository::session_key(0), "session0");
    }

    #[tokio::test]
    async fn test_create_then_fetch_round_trip() {
        let repository = repository();
        let record = NewSessionRecord {
            board_dimension: 4,
            turn_duration: 120,
            creator_id: "uid-a".to_string(),
        };
        repository.create_session(7, &record).await.unwrap();

        let snapshot = repository.fetch_session(7).await.unwrap().unwrap();
        assert_eq!(snapshot.creator_id(), Some("uid-a"));
        assert_eq!(snapshot.board_dimension(), Some(4));
        assert_eq!(snapshot.turn_duration(), Some(120));
        assert!(!snapshot.has_initial_state());
        assert!(!snapshot.has_joiner());

        assert_eq!(repository.fetch_session(8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claim_joiner_slot_only_once() {
        let repository = repository();
        let record = NewSessionRecord {
            board_dimension: 4,
            turn_duration: 120,
            creator_id: "uid-a".to_string(),
        };
        repository.create_session(7, &record).await.unwrap();

        assert!(repository.claim_joiner_slot(7, "uid-b").await.unwrap());
        assert!(!repository.claim_joiner_slot(7, "uid-c").await.unwrap());

        let snapshot = repository.fetch_session(7).await.unwrap().unwrap();
        assert!(snapshot.has_joiner());
    }

    #[tokio::test]
    async fn test_last_move_subscription_sees_writes() {
        let repository = repository();
        let record = NewSessionRecord {
            board_dimension: 4,
            turn_duration: 120,
            creator_id: "uid-a".to_string(),
        };
        repository.create_session(7, &record).await.unwrap();

        let mut subscription = repository.subscribe_last_move(7);
        // Replay of the sentinel record.
        let _ = subscription.events.recv().await;

        repository
            .write_last_move(
                7,
                MoveDirection::Left,
                "uid-a",
                &TwosPowerTile(4),
                Coordinate::new(0, 3),
            )
            .await
            .unwrap();

        match subscription.events.recv().await.unwrap() {
            crate::store::StoreEvent::Value(Some(tree)) => {
                let fields = LastMoveFields::from_tree(&tree).unwrap();
                assert_eq!(fields.direction, "left");
                assert_eq!(fields.updater_id, "uid-a");
                assert_eq!(fields.position, "0,3");
                assert_eq!(fields.value, "4");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_session_removes_record() {
        let repository = repository();
        let record = NewSessionRecord {
            board_dimension: 4,
            turn_duration: 120,
            creator_id: "uid-a".to_string(),
        };
        repository.create_session(7, &record).await.unwrap();
        repository.delete_session(7).await.unwrap();
        assert_eq!(repository.fetch_session(7).await.unwrap(), None);
    }
}

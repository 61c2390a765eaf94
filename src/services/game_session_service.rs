//! The game-session synchronizer: creation flow, join flow, move exchange,
//! and cleanup for one two-player session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::coordinate::Coordinate;
use crate::models::direction::MoveDirection;
use crate::models::game_setup::{GameSetup, Players};
use crate::models::session::{keys, LastMoveFields, NewSessionRecord, SessionSnapshot};
use crate::models::tile::TileValue;
use crate::repositories::session_repository::SessionRepository;
use crate::services::errors::game_session_service_errors::GameSessionServiceError;
use crate::services::identity_service::IdentityProvider;
use crate::store::{StoreEvent, TreeValue};

/// Told when the opponent claims the joiner slot of a session this client
/// created.
#[async_trait]
pub trait CreatorDelegate: Send + Sync {
    async fn opponent_joined(&self, display_name: &str);
}

/// Told about each move the opponent publishes.
#[async_trait]
pub trait GameDelegate<T: TileValue>: Send + Sync {
    async fn opponent_moved(&self, direction: MoveDirection, spawned_tile: T, spawned_at: Coordinate);
}

enum Notification<T: TileValue> {
    OpponentJoined(String),
    OpponentMoved {
        direction: MoveDirection,
        tile: T,
        at: Coordinate,
    },
}

struct Delegates<T: TileValue> {
    creator: Mutex<Option<Arc<dyn CreatorDelegate>>>,
    game: Mutex<Option<Arc<dyn GameDelegate<T>>>>,
}

/// Synchronizes one game session through the store. A client either creates
/// a session (becoming its creator and waiting for an opponent) or joins an
/// existing one by pin; both sides then exchange moves through the session's
/// single `lastMove` record until the session is torn down.
pub struct GameSessionService<T: TileValue> {
    repository: SessionRepository,
    identity: Arc<dyn IdentityProvider>,
    delegates: Arc<Delegates<T>>,
    notifications: mpsc::UnboundedSender<Notification<T>>,
    dispatcher: JoinHandle<()>,
    pin: Mutex<Option<i64>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    subscription_ids: Mutex<Vec<u64>>,
}

impl<T: TileValue> GameSessionService<T> {
    /// Must be called from within a tokio runtime; the dispatch task that
    /// serializes delegate callbacks is spawned here.
    pub fn new(repository: SessionRepository, identity: Arc<dyn IdentityProvider>) -> Self {
        let delegates = Arc::new(Delegates {
            creator: Mutex::new(None),
            game: Mutex::new(None),
        });
        let (notifications, receiver) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch_loop(Arc::clone(&delegates), receiver));
        GameSessionService {
            repository,
            identity,
            delegates,
            notifications,
            dispatcher,
            pin: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            subscription_ids: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_creator_delegate(&self, delegate: Arc<dyn CreatorDelegate>) {
        *self.delegates.creator.lock().await = Some(delegate);
    }

    pub async fn set_game_delegate(&self, delegate: Arc<dyn GameDelegate<T>>) {
        *self.delegates.game.lock().await = Some(delegate);
    }

    /// Allocates a session keyed by this client's own identity and waits for
    /// an opponent. Creating again under the same identity overwrites any
    /// previous session without warning.
    ///
    /// Returns the session's pin once the record is live; the opponent is
    /// reported later through the creator delegate.
    pub async fn create_session(
        &self,
        dimension: u32,
        turn_duration: u32,
    ) -> Result<i64, GameSessionServiceError> {
        let identity = self
            .identity
            .current_identity()
            .ok_or(GameSessionServiceError::NotSignedIn)?;
        let pin = identity.id;
        info!(pin, dimension, turn_duration, "creating session");
        *self.pin.lock().await = Some(pin);

        // Arm the cleanup first so a connection lost mid-create still removes
        // the half-written session.
        self.repository.arm_disconnect_cleanup(pin).await?;
        let record = NewSessionRecord {
            board_dimension: dimension,
            turn_duration,
            creator_id: identity.uid.clone(),
        };
        self.repository.create_session(pin, &record).await?;

        self.spawn_last_move_listener(pin, identity.uid).await;
        self.spawn_joiner_listener(pin).await;
        Ok(pin)
    }

    /// Writes the two starting tiles of the current session. The creator
    /// calls this once after `create_session`; the session is not joinable
    /// until it has.
    pub async fn add_initial_state(
        &self,
        first_tile: &T,
        first_coordinate: Coordinate,
        second_tile: &T,
        second_coordinate: Coordinate,
    ) -> Result<(), GameSessionServiceError> {
        let Some(pin) = *self.pin.lock().await else {
            warn!("add_initial_state called before any session was created");
            return Err(GameSessionServiceError::PinNotSet);
        };
        debug!(pin, "writing initial state");
        self.repository
            .write_initial_state(pin, first_tile, first_coordinate, second_tile, second_coordinate)
            .await?;
        Ok(())
    }

    /// Looks up the session with `pin_to_join`, claims its empty opponent
    /// slot, and reconstructs the full game setup from stored data.
    pub async fn join_session(
        &self,
        pin_to_join: i64,
    ) -> Result<GameSetup<T>, GameSessionServiceError> {
        let identity = self
            .identity
            .current_identity()
            .ok_or(GameSessionServiceError::NotSignedIn)?;
        *self.pin.lock().await = Some(pin_to_join);
        info!(pin = pin_to_join, "joining session");

        let snapshot = self
            .repository
            .fetch_session(pin_to_join)
            .await?
            .ok_or(GameSessionServiceError::NoSuchSession(pin_to_join))?;
        let creator_uid = match snapshot.creator_id() {
            Some(uid) if snapshot.has_initial_state() => uid.to_owned(),
            _ => return Err(GameSessionServiceError::SessionNotReady),
        };
        if snapshot.has_joiner() {
            return Err(GameSessionServiceError::AlreadyJoined);
        }

        // Subscribe before claiming the slot so no opponent move is missed
        // once joined.
        self.spawn_last_move_listener(pin_to_join, identity.uid.clone())
            .await;

        let display_name = self
            .identity
            .display_name(&creator_uid)
            .await?
            .ok_or_else(|| GameSessionServiceError::NoDisplayName(creator_uid.clone()))?;

        if !self
            .repository
            .claim_joiner_slot(pin_to_join, &identity.uid)
            .await?
        {
            warn!(pin = pin_to_join, "lost the race for the joiner slot");
            return Err(GameSessionServiceError::AlreadyJoined);
        }

        let setup = decode_setup(&snapshot, display_name)
            .ok_or(GameSessionServiceError::NoGameData(pin_to_join))?;
        info!(
            pin = pin_to_join,
            opponent = %setup.opponent_display_name,
            "joined session"
        );
        Ok(setup)
    }

    /// Publishes this client's move as the session's `lastMove` record.
    /// Fire-and-forget: without an active session or identity this is a
    /// logged no-op, and write failures are logged rather than surfaced.
    pub async fn publish_move(&self, direction: MoveDirection, spawned_tile: &T, spawned_at: Coordinate) {
        let Some(pin) = *self.pin.lock().await else {
            warn!("publish_move called with no active session");
            return;
        };
        let Some(identity) = self.identity.current_identity() else {
            warn!(pin, "publish_move called with no signed-in identity");
            return;
        };
        match self
            .repository
            .write_last_move(pin, direction, &identity.uid, spawned_tile, spawned_at)
            .await
        {
            Ok(()) => debug!(
                pin,
                direction = direction.symbol(),
                at = %spawned_at.encode(),
                value = spawned_tile.score(),
                "published move"
            ),
            Err(err) => error!(pin, error = %err, "failed to publish move"),
        }
    }

    /// Detaches every subscription this synchronizer owns. Used when leaving
    /// the game screen.
    pub async fn stop_listening(&self) {
        for id in self.subscription_ids.lock().await.drain(..) {
            self.repository.unsubscribe(id);
        }
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    /// Removes the session record unconditionally; either participant may
    /// call this.
    pub async fn delete_session(&self, pin: i64) -> Result<(), GameSessionServiceError> {
        info!(pin, "deleting session");
        self.repository.delete_session(pin).await?;
        Ok(())
    }

    async fn spawn_last_move_listener(&self, pin: i64, own_uid: String) {
        let subscription = self.repository.subscribe_last_move(pin);
        self.subscription_ids.lock().await.push(subscription.id);
        let notifications = self.notifications.clone();
        let mut events = subscription.events;
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let StoreEvent::Value(Some(value)) = event else {
                    continue;
                };
                if let Some((direction, tile, at)) = decode_last_move::<T>(&value, &own_uid) {
                    let _ = notifications.send(Notification::OpponentMoved { direction, tile, at });
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    async fn spawn_joiner_listener(&self, pin: i64) {
        let subscription = self.repository.subscribe_session_children(pin);
        self.subscription_ids.lock().await.push(subscription.id);
        let identity = Arc::clone(&self.identity);
        let notifications = self.notifications.clone();
        let mut events = subscription.events;
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let StoreEvent::ChildAdded { key, value } = event else {
                    continue;
                };
                if key != keys::JOINER {
                    debug!(pin, key = %key, "added child is not the joiner slot");
                    continue;
                }
                let Some(joiner_uid) = value.as_str() else {
                    warn!(pin, "joiner slot does not hold an identity string");
                    continue;
                };
                match identity.display_name(joiner_uid).await {
                    Ok(Some(name)) => {
                        info!(pin, joiner = %joiner_uid, name = %name, "opponent joined");
                        let _ = notifications.send(Notification::OpponentJoined(name));
                    }
                    Ok(None) => warn!(pin, joiner = %joiner_uid, "joiner has no display name"),
                    Err(err) => {
                        warn!(pin, joiner = %joiner_uid, error = %err, "could not resolve joiner display name");
                    }
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }
}

impl<T: TileValue> Drop for GameSessionService<T> {
    fn drop(&mut self) {
        self.dispatcher.abort();
        if let Ok(mut tasks) = self.tasks.try_lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Every externally observable callback funnels through this single consumer
/// so delegate calls never interleave.
async fn dispatch_loop<T: TileValue>(
    delegates: Arc<Delegates<T>>,
    mut notifications: mpsc::UnboundedReceiver<Notification<T>>,
) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            Notification::OpponentJoined(name) => {
                let delegate = delegates.creator.lock().await.clone();
                match delegate {
                    Some(delegate) => delegate.opponent_joined(&name).await,
                    None => debug!(name = %name, "opponent joined but no creator delegate is set"),
                }
            }
            Notification::OpponentMoved { direction, tile, at } => {
                let delegate = delegates.game.lock().await.clone();
                match delegate {
                    Some(delegate) => delegate.opponent_moved(direction, tile, at).await,
                    None => debug!("opponent moved but no game delegate is set"),
                }
            }
        }
    }
}

/// Turns a `lastMove` write into an opponent move, or `None` for anything
/// that must not reach the delegate: partial records, the unset sentinel,
/// echoes of this client's own writes, and undecodable fields.
fn decode_last_move<T: TileValue>(
    tree: &TreeValue,
    own_uid: &str,
) -> Option<(MoveDirection, T, Coordinate)> {
    let Some(fields) = LastMoveFields::from_tree(tree) else {
        warn!("last move record is missing fields");
        return None;
    };
    if fields.is_sentinel() {
        // Nothing has been played yet.
        return None;
    }
    if fields.updater_id == own_uid {
        debug!("ignoring echo of this client's own move");
        return None;
    }
    let Some(direction) = MoveDirection::from_symbol(&fields.direction) else {
        warn!(symbol = %fields.direction, "unrecognized direction symbol, dropping move");
        return None;
    };
    let Some(at) = Coordinate::parse(&fields.position) else {
        warn!(position = %fields.position, "unparsable spawn coordinate, dropping move");
        return None;
    };
    let Ok(score) = fields.value.parse::<i64>() else {
        warn!(value = %fields.value, "unparsable tile value, dropping move");
        return None;
    };
    Some((direction, T::from_score(score), at))
}

fn decode_setup<T: TileValue>(
    snapshot: &SessionSnapshot,
    opponent_display_name: String,
) -> Option<GameSetup<T>> {
    let dimension = snapshot.board_dimension()?;
    let turn_duration = snapshot.turn_duration()?;
    let (first_position, first_value) = snapshot.initial_tile_raw(keys::TILE1)?;
    let (second_position, second_value) = snapshot.initial_tile_raw(keys::TILE2)?;
    Some(GameSetup {
        players: Players::Multi,
        setup_for_creating: false,
        dimension,
        turn_duration,
        first_value: T::from_score(first_value.parse().ok()?),
        first_coordinate: Coordinate::parse(&first_position)?,
        second_value: T::from_score(second_value.parse().ok()?),
        second_coordinate: Coordinate::parse(&second_position)?,
        opponent_display_name,
    })
}

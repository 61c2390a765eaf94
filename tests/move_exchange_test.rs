//! Move exchange between two live clients: delivery, echo suppression, and
//! sentinel handling.

mod common;

use std::sync::Arc;

use game_session_sync::models::coordinate::Coordinate;
use game_session_sync::models::direction::MoveDirection;
use game_session_sync::models::tile::TwosPowerTile;
use game_session_sync::services::game_session_service::GameSessionService;
use game_session_sync::store::{KeyedStore, MemoryStore, TreeValue};

use common::{
    settle, signed_in_client, wait_until, RecordingCreatorDelegate, RecordingGameDelegate,
};

struct Match {
    store: Arc<MemoryStore>,
    creator: GameSessionService<TwosPowerTile>,
    joiner: GameSessionService<TwosPowerTile>,
    creator_moves: Arc<RecordingGameDelegate>,
    joiner_moves: Arc<RecordingGameDelegate>,
}

/// Creates a session, joins it from a second identity, and wires recording
/// move delegates on both sides.
async fn live_match() -> Match {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());

    let creator = signed_in_client(&store, 1, "uid-a", "Alice").await;
    creator.create_session(4, 120).await.unwrap();
    creator
        .add_initial_state(
            &TwosPowerTile(2),
            Coordinate::new(0, 0),
            &TwosPowerTile(4),
            Coordinate::new(3, 3),
        )
        .await
        .unwrap();

    let joiner = signed_in_client(&store, 2, "uid-b", "Bob").await;
    joiner.join_session(1).await.unwrap();

    let creator_moves = Arc::new(RecordingGameDelegate::default());
    let joiner_moves = Arc::new(RecordingGameDelegate::default());
    creator.set_game_delegate(Arc::clone(&creator_moves) as _).await;
    joiner.set_game_delegate(Arc::clone(&joiner_moves) as _).await;

    Match {
        store,
        creator,
        joiner,
        creator_moves,
        joiner_moves,
    }
}

#[tokio::test]
async fn test_opponent_move_is_delivered_exactly_once() {
    let game = live_match().await;

    game.creator
        .publish_move(MoveDirection::Left, &TwosPowerTile(4), Coordinate::new(0, 3))
        .await;

    assert!(wait_until(|| game.joiner_moves.move_count() == 1).await);
    settle().await;
    assert_eq!(
        *game.joiner_moves.moves.lock().unwrap(),
        vec![(MoveDirection::Left, TwosPowerTile(4), Coordinate::new(0, 3))]
    );
    assert_eq!(game.creator_moves.move_count(), 0, "echo must be suppressed");
}

#[tokio::test]
async fn test_echo_suppression_holds_for_all_directions() {
    let game = live_match().await;

    let moves = [
        (MoveDirection::Up, TwosPowerTile(2), Coordinate::new(0, 0)),
        (MoveDirection::Down, TwosPowerTile(4), Coordinate::new(1, 2)),
        (MoveDirection::Left, TwosPowerTile(8), Coordinate::new(3, 3)),
        (MoveDirection::Right, TwosPowerTile(16), Coordinate::new(2, 1)),
    ];
    for (direction, tile, at) in moves {
        game.creator.publish_move(direction, &tile, at).await;
        assert!(wait_until(|| game.joiner_moves.move_count() > 0).await);
    }

    assert!(wait_until(|| game.joiner_moves.move_count() == moves.len()).await);
    assert_eq!(*game.joiner_moves.moves.lock().unwrap(), moves.to_vec());
    assert_eq!(game.creator_moves.move_count(), 0);
}

#[tokio::test]
async fn test_moves_flow_both_ways() {
    let game = live_match().await;

    game.creator
        .publish_move(MoveDirection::Left, &TwosPowerTile(4), Coordinate::new(0, 3))
        .await;
    assert!(wait_until(|| game.joiner_moves.move_count() == 1).await);

    game.joiner
        .publish_move(MoveDirection::Up, &TwosPowerTile(2), Coordinate::new(2, 0))
        .await;
    assert!(wait_until(|| game.creator_moves.move_count() == 1).await);

    assert_eq!(
        *game.creator_moves.moves.lock().unwrap(),
        vec![(MoveDirection::Up, TwosPowerTile(2), Coordinate::new(2, 0))]
    );
    assert_eq!(game.joiner_moves.move_count(), 1);
}

#[tokio::test]
async fn test_sentinel_field_suppresses_delivery() {
    let game = live_match().await;

    // Well-formed except for the sentinel author.
    game.store
        .set(
            "sessions/session1/lastMove",
            TreeValue::branch([
                ("direction", TreeValue::text("left")),
                ("updaterId", TreeValue::text("_")),
                (
                    "newTile",
                    TreeValue::branch([
                        ("position", TreeValue::text("0,3")),
                        ("value", TreeValue::text("4")),
                    ]),
                ),
            ]),
        )
        .await
        .unwrap();

    settle().await;
    assert_eq!(game.creator_moves.move_count(), 0);
    assert_eq!(game.joiner_moves.move_count(), 0);
}

#[tokio::test]
async fn test_malformed_last_move_is_dropped() {
    let game = live_match().await;

    game.store
        .set(
            "sessions/session1/lastMove",
            TreeValue::branch([
                ("direction", TreeValue::text("sideways")),
                ("updaterId", TreeValue::text("uid-a")),
                (
                    "newTile",
                    TreeValue::branch([
                        ("position", TreeValue::text("0,3")),
                        ("value", TreeValue::text("4")),
                    ]),
                ),
            ]),
        )
        .await
        .unwrap();

    settle().await;
    assert_eq!(game.joiner_moves.move_count(), 0);
}

#[tokio::test]
async fn test_creator_is_told_the_opponents_display_name() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());

    let creator = signed_in_client(&store, 1, "uid-a", "Alice").await;
    let opponents = Arc::new(RecordingCreatorDelegate::default());
    creator.set_creator_delegate(Arc::clone(&opponents) as _).await;

    creator.create_session(4, 120).await.unwrap();
    creator
        .add_initial_state(
            &TwosPowerTile(2),
            Coordinate::new(0, 0),
            &TwosPowerTile(4),
            Coordinate::new(3, 3),
        )
        .await
        .unwrap();

    let joiner = signed_in_client(&store, 2, "uid-b", "Bob").await;
    joiner.join_session(1).await.unwrap();

    assert!(wait_until(|| !opponents.opponents.lock().unwrap().is_empty()).await);
    settle().await;
    assert_eq!(*opponents.opponents.lock().unwrap(), vec!["Bob".to_string()]);
}

#[tokio::test]
async fn test_stop_listening_ends_delivery() {
    let game = live_match().await;

    game.joiner.stop_listening().await;
    game.creator
        .publish_move(MoveDirection::Left, &TwosPowerTile(4), Coordinate::new(0, 3))
        .await;

    settle().await;
    assert_eq!(game.joiner_moves.move_count(), 0);
}

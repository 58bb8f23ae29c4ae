//! Room lifecycle: create, join, ready, start, leave, host promotion.

use skirmish_server::rooms::{self, RoomError, RoomStatus};
use uuid::Uuid;

fn two_players() -> (Uuid, Uuid) {
    (Uuid::new_v4(), Uuid::new_v4())
}

#[tokio::test]
async fn create_join_ready_start_happy_path() {
    let (host, guest) = two_players();
    let room = rooms::create(host, Some("alice".into()), false, None, Some(42));
    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.players.len(), 1);

    let room = rooms::join(room.id, guest, Some("bob".into())).unwrap();
    assert_eq!(room.players.len(), 2);

    rooms::ready(room.id, host).unwrap();
    rooms::ready(room.id, guest).unwrap();

    let started = rooms::start(room.id, host).unwrap();
    assert_eq!(started.status, RoomStatus::Playing);
}

#[tokio::test]
async fn join_is_idempotent_and_full_rooms_reject() {
    let (host, guest) = two_players();
    let room = rooms::create(host, None, false, None, None);
    rooms::join(room.id, guest, None).unwrap();

    // Same player joining again is a no-op.
    let again = rooms::join(room.id, guest, None).unwrap();
    assert_eq!(again.players.len(), 2);

    // A third player does not fit.
    let third = Uuid::new_v4();
    assert_eq!(rooms::join(room.id, third, None).unwrap_err(), RoomError::Full);
}

#[tokio::test]
async fn start_requires_host_and_readiness() {
    let (host, guest) = two_players();
    let room = rooms::create(host, None, false, None, None);
    rooms::join(room.id, guest, None).unwrap();

    assert_eq!(rooms::start(room.id, guest).unwrap_err(), RoomError::NotHost);
    assert_eq!(rooms::start(room.id, host).unwrap_err(), RoomError::NotAllReady);

    rooms::ready(room.id, host).unwrap();
    rooms::ready(room.id, guest).unwrap();
    assert!(rooms::start(room.id, host).is_ok());
}

#[tokio::test]
async fn solo_start_requires_the_ai_flag() {
    let host = Uuid::new_v4();
    let without_ai = rooms::create(host, None, false, None, None);
    rooms::ready(without_ai.id, host).unwrap();
    assert_eq!(
        rooms::start(without_ai.id, host).unwrap_err(),
        RoomError::NeedOpponent
    );

    let with_ai = rooms::create(host, None, true, None, None);
    rooms::ready(with_ai.id, host).unwrap();
    let started = rooms::start(with_ai.id, host).unwrap();
    assert_eq!(started.status, RoomStatus::Playing);
}

#[tokio::test]
async fn leaving_promotes_the_next_host() {
    let (host, guest) = two_players();
    let room = rooms::create(host, None, false, None, None);
    rooms::join(room.id, guest, None).unwrap();

    let view = rooms::leave(room.id, host).unwrap().unwrap();
    assert_eq!(view.host, guest);
    assert_eq!(view.players.len(), 1);
    assert_eq!(
        view.players[0].team,
        skirmish_server::game::types::Team::Host
    );
}

#[tokio::test]
async fn last_leaver_deletes_the_room() {
    let host = Uuid::new_v4();
    let room = rooms::create(host, None, false, None, None);
    assert!(rooms::leave(room.id, host).unwrap().is_none());
    assert_eq!(rooms::get(room.id).unwrap_err(), RoomError::NotFound);
}

#[tokio::test]
async fn leaving_a_running_match_keeps_the_roster() {
    let (host, guest) = two_players();
    let room = rooms::create(host, None, false, None, None);
    rooms::join(room.id, guest, None).unwrap();
    rooms::ready(room.id, host).unwrap();
    rooms::ready(room.id, guest).unwrap();
    rooms::start(room.id, host).unwrap();

    // Mid-match leave opens the grace window instead of dropping the slot.
    let view = rooms::leave(room.id, guest).unwrap().unwrap();
    assert_eq!(view.players.len(), 2);
    assert!(!view.players.iter().find(|p| p.id == guest).unwrap().connected);

    // Rejoin within the window is idempotent.
    let back = rooms::join(room.id, guest, None).unwrap();
    assert_eq!(back.players.len(), 2);
}

#[tokio::test]
async fn unknown_rooms_return_not_found() {
    assert_eq!(
        rooms::join(Uuid::new_v4(), Uuid::new_v4(), None).unwrap_err(),
        RoomError::NotFound
    );
    assert_eq!(rooms::get(Uuid::new_v4()).unwrap_err(), RoomError::NotFound);
}

//! Room lifecycle and the process-wide registry.
//!
//! Rooms live in a global `DashMap`; entry locks are held only for
//! lookup/insert/remove; simulation runs on each room's session task,
//! never under the registry lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::settings;
use crate::game::engine::GameEngine;
use crate::game::session::{self, SessionCmd};
use crate::game::types::{Difficulty, Team};
use crate::protocol::ServerMsg;

/// In-memory map of rooms: room_id → room.
static ROOMS: Lazy<DashMap<Uuid, Room>> = Lazy::new(DashMap::new);
/// Reverse index player_id → room_id.
static PLAYER_ROOMS: Lazy<DashMap<Uuid, Uuid>> = Lazy::new(DashMap::new);

pub const MAX_PLAYERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    pub id: Uuid,
    pub name: String,
    pub team: Team,
    pub color: String,
    pub ready: bool,
    pub connected: bool,
}

pub struct Room {
    pub id: Uuid,
    pub seed: u64,
    pub difficulty: Difficulty,
    pub vs_ai: bool,
    pub host: Uuid,
    pub players: Vec<RoomPlayer>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub session: Option<mpsc::Sender<SessionCmd>>,
    conns: HashMap<Uuid, mpsc::UnboundedSender<ServerMsg>>,
}

/// Public room state returned by the lobby API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: Uuid,
    pub status: RoomStatus,
    pub host: Uuid,
    pub difficulty: Difficulty,
    pub vs_ai: bool,
    pub max_players: usize,
    pub players: Vec<RoomPlayer>,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for RoomView {
    fn from(r: &Room) -> Self {
        RoomView {
            id: r.id,
            status: r.status,
            host: r.host,
            difficulty: r.difficulty,
            vs_ai: r.vs_ai,
            max_players: MAX_PLAYERS,
            players: r.players.clone(),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
    #[error("room is full")]
    Full,
    #[error("room already started")]
    NotWaiting,
    #[error("player is not in this room")]
    NotMember,
    #[error("only the host can do that")]
    NotHost,
    #[error("all players must be ready")]
    NotAllReady,
    #[error("a second player or an AI opponent is required")]
    NeedOpponent,
    #[error("map generation failed: {0}")]
    MapFailure(String),
}

impl RoomError {
    /// HTTP status the lobby layer maps this to.
    pub fn status_code(&self) -> u16 {
        match self {
            RoomError::NotFound => 404,
            RoomError::MapFailure(_) => 500,
            _ => 400,
        }
    }
}

pub fn create(
    host_id: Uuid,
    host_name: Option<String>,
    vs_ai: bool,
    difficulty: Option<Difficulty>,
    seed: Option<u64>,
) -> RoomView {
    let id = Uuid::new_v4();
    let name = host_name.unwrap_or_else(|| format!("player-{}", &host_id.to_string()[..8]));
    let room = Room {
        id,
        seed: seed.filter(|s| *s != 0).unwrap_or_else(|| rand::random::<u64>() | 1),
        difficulty: difficulty.unwrap_or_default(),
        vs_ai,
        host: host_id,
        players: vec![RoomPlayer {
            id: host_id,
            name,
            team: Team::Host,
            color: "blue".into(),
            ready: false,
            connected: false,
        }],
        status: RoomStatus::Waiting,
        created_at: Utc::now(),
        session: None,
        conns: HashMap::new(),
    };
    let view = RoomView::from(&room);
    ROOMS.insert(id, room);
    PLAYER_ROOMS.insert(host_id, id);
    view
}

pub fn list() -> Vec<RoomView> {
    ROOMS
        .iter()
        .filter(|r| r.status == RoomStatus::Waiting)
        .map(|r| RoomView::from(r.value()))
        .collect()
}

pub fn get(room_id: Uuid) -> Result<RoomView, RoomError> {
    ROOMS
        .get(&room_id)
        .map(|r| RoomView::from(r.value()))
        .ok_or(RoomError::NotFound)
}

pub fn join(room_id: Uuid, player_id: Uuid, name: Option<String>) -> Result<RoomView, RoomError> {
    let mut room = ROOMS.get_mut(&room_id).ok_or(RoomError::NotFound)?;

    // Rejoin by the same id is idempotent, including during the grace window.
    if room.players.iter().any(|p| p.id == player_id) {
        return Ok(RoomView::from(room.value()));
    }
    if room.status != RoomStatus::Waiting {
        return Err(RoomError::NotWaiting);
    }
    if room.players.len() >= MAX_PLAYERS {
        return Err(RoomError::Full);
    }
    let name = name.unwrap_or_else(|| format!("player-{}", &player_id.to_string()[..8]));
    room.players.push(RoomPlayer {
        id: player_id,
        name,
        team: Team::Guest,
        color: "red".into(),
        ready: false,
        connected: false,
    });
    PLAYER_ROOMS.insert(player_id, room_id);
    Ok(RoomView::from(room.value()))
}

pub fn leave(room_id: Uuid, player_id: Uuid) -> Result<Option<RoomView>, RoomError> {
    let mut delete = false;
    let view = {
        let mut room = ROOMS.get_mut(&room_id).ok_or(RoomError::NotFound)?;
        if !room.players.iter().any(|p| p.id == player_id) {
            return Err(RoomError::NotMember);
        }

        if matches!(room.status, RoomStatus::Playing | RoomStatus::Paused) {
            // Keep the roster entry: the grace window may restore the player.
            if let Some(p) = room.players.iter_mut().find(|p| p.id == player_id) {
                p.connected = false;
            }
            room.conns.remove(&player_id);
            if let Some(session) = &room.session {
                let _ = session.try_send(SessionCmd::Disconnect { player: player_id });
            }
            return Ok(Some(RoomView::from(room.value())));
        }

        room.players.retain(|p| p.id != player_id);
        room.conns.remove(&player_id);
        PLAYER_ROOMS.remove(&player_id);

        if room.players.is_empty() {
            delete = true;
            None
        } else {
            if room.host == player_id {
                let promoted = room.players[0].id;
                room.host = promoted;
                room.players[0].team = Team::Host;
                room.players[0].color = "blue".into();
            }
            Some(RoomView::from(room.value()))
        }
    };
    if delete {
        ROOMS.remove(&room_id);
    }
    Ok(view)
}

pub fn ready(room_id: Uuid, player_id: Uuid) -> Result<RoomView, RoomError> {
    let mut room = ROOMS.get_mut(&room_id).ok_or(RoomError::NotFound)?;
    let player = room
        .players
        .iter_mut()
        .find(|p| p.id == player_id)
        .ok_or(RoomError::NotMember)?;
    player.ready = !player.ready;
    Ok(RoomView::from(room.value()))
}

pub fn start(room_id: Uuid, player_id: Uuid) -> Result<RoomView, RoomError> {
    let mut room = ROOMS.get_mut(&room_id).ok_or(RoomError::NotFound)?;
    if room.host != player_id {
        return Err(RoomError::NotHost);
    }
    if room.status != RoomStatus::Waiting {
        return Err(RoomError::NotWaiting);
    }
    if !room.players.iter().all(|p| p.ready) {
        return Err(RoomError::NotAllReady);
    }
    if room.players.len() < MAX_PLAYERS && !room.vs_ai {
        return Err(RoomError::NeedOpponent);
    }

    let mut engine = GameEngine::new(room.seed, room.difficulty)
        .map_err(|e| RoomError::MapFailure(e.to_string()))?;
    for p in &room.players {
        engine.add_player(p.id, &p.name, p.team, &p.color);
    }
    if room.players.len() < MAX_PLAYERS {
        engine.add_ai(Uuid::new_v4());
    }
    engine.initialize();

    room.status = RoomStatus::Playing;
    room.session = Some(session::spawn(room_id, engine, room.conns.clone()));
    for tx in room.conns.values() {
        let _ = tx.send(ServerMsg::GameStart { room_id, tick: 0 });
    }
    log::info!("room {room_id} started (seed {})", room.seed);
    Ok(RoomView::from(room.value()))
}

/// Record a liveness ping; in a running match this feeds the session's
/// timeout watch.
pub fn ping(room_id: Uuid, player_id: Uuid) -> Result<(), RoomError> {
    let room = ROOMS.get(&room_id).ok_or(RoomError::NotFound)?;
    if !room.players.iter().any(|p| p.id == player_id) {
        return Err(RoomError::NotMember);
    }
    if let Some(session) = &room.session {
        let _ = session.try_send(SessionCmd::Ping { player: player_id });
    }
    Ok(())
}

pub fn pause(room_id: Uuid, player_id: Uuid) -> Result<(), RoomError> {
    signal(room_id, player_id, SessionCmd::Pause)
}

pub fn resume(room_id: Uuid, player_id: Uuid) -> Result<(), RoomError> {
    signal(room_id, player_id, SessionCmd::Resume)
}

fn signal(room_id: Uuid, player_id: Uuid, cmd: SessionCmd) -> Result<(), RoomError> {
    let room = ROOMS.get(&room_id).ok_or(RoomError::NotFound)?;
    if room.host != player_id {
        return Err(RoomError::NotHost);
    }
    if let Some(session) = &room.session {
        let _ = session.try_send(cmd);
    }
    Ok(())
}

/// Attach a live WS connection for a player.
pub fn register_conn(
    room_id: Uuid,
    player_id: Uuid,
    tx: mpsc::UnboundedSender<ServerMsg>,
) -> Result<(), RoomError> {
    let mut room = ROOMS.get_mut(&room_id).ok_or(RoomError::NotFound)?;
    if !room.players.iter().any(|p| p.id == player_id) {
        return Err(RoomError::NotMember);
    }
    if let Some(p) = room.players.iter_mut().find(|p| p.id == player_id) {
        p.connected = true;
    }
    room.conns.insert(player_id, tx.clone());
    if let Some(session) = &room.session {
        let _ = session.try_send(SessionCmd::Connect {
            player: player_id,
            tx,
        });
    }
    Ok(())
}

/// Surface a socket close to the room; in a running match this opens the
/// grace window.
pub fn drop_conn(room_id: Uuid, player_id: Uuid) {
    if let Some(mut room) = ROOMS.get_mut(&room_id) {
        room.conns.remove(&player_id);
        if let Some(p) = room.players.iter_mut().find(|p| p.id == player_id) {
            p.connected = false;
        }
        if let Some(session) = &room.session {
            let _ = session.try_send(SessionCmd::Disconnect { player: player_id });
        }
    }
}

/// Session callback: the match is over.
pub fn mark_ended(room_id: Uuid) {
    if let Some(mut room) = ROOMS.get_mut(&room_id) {
        room.status = RoomStatus::Ended;
        room.session = None;
        for p in &room.players {
            PLAYER_ROOMS.remove(&p.id);
        }
    }
}

/// Session callback: pause flag flipped.
pub fn set_paused(room_id: Uuid, paused: bool) {
    if let Some(mut room) = ROOMS.get_mut(&room_id) {
        room.status = if paused {
            RoomStatus::Paused
        } else {
            RoomStatus::Playing
        };
    }
}

/// Find the room a player currently belongs to.
pub fn room_of(player_id: Uuid) -> Option<Uuid> {
    PLAYER_ROOMS.get(&player_id).map(|r| *r.value())
}

/// Clone of the room's engine handle, when the match is running.
pub fn session_handle(room_id: Uuid) -> Option<mpsc::Sender<SessionCmd>> {
    ROOMS.get(&room_id).and_then(|r| r.session.clone())
}

/// Spawn the background task that removes stale rooms: never-started rooms
/// expire after the waiting TTL, ended rooms are reaped immediately.
pub fn start_sweeper() {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(Duration::from_secs(60));
        loop {
            timer.tick().await;
            sweep(Utc::now());
        }
    });
}

fn sweep(now: DateTime<Utc>) {
    let ttl = chrono::Duration::seconds(settings().room_ttl_secs as i64);
    let stale: Vec<Uuid> = ROOMS
        .iter()
        .filter(|r| {
            (r.status == RoomStatus::Waiting && now.signed_duration_since(r.created_at) > ttl)
                || r.status == RoomStatus::Ended
        })
        .map(|r| r.id)
        .collect();
    for id in stale {
        if let Some((_, room)) = ROOMS.remove(&id) {
            for p in &room.players {
                PLAYER_ROOMS.remove(&p.id);
            }
            log::info!("sweeper removed room {id} ({:?})", room.status);
        }
    }
}

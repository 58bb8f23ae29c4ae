//! Runtime configuration for the skirmish server.

use once_cell::sync::Lazy;
use std::env;

#[derive(Debug)]
pub struct Settings {
    /// Simulation steps per second.
    pub tick_rate: u64,
    /// Snapshot broadcasts per second.
    pub snapshot_rate: u64,
    /// Fog-of-war vision radius in pixels.
    pub vision_range: f32,
    /// Map dimensions in tiles.
    pub map_width: u32,
    pub map_height: u32,
    /// Tile edge length in pixels.
    pub tile_size: f32,
    /// Seconds a disconnected in-game player may stay away before forfeit.
    pub grace_secs: u64,
    /// Seconds without a ping before a player counts as disconnected.
    pub ping_timeout_secs: u64,
    /// Seconds a never-started room may idle before the sweeper deletes it.
    pub room_ttl_secs: u64,
    /// Per-player action rate limits (sliding windows).
    pub actions_per_sec: usize,
    pub actions_per_min: usize,
    /// Bind address for the HTTP/WS server.
    pub server_addr: String,
}

impl Settings {
    fn from_env() -> Self {
        fn var<T: std::str::FromStr>(key: &str, default: T) -> T {
            env::var(key)
                .ok()
                .and_then(|v| v.parse::<T>().ok())
                .unwrap_or(default)
        }

        Settings {
            tick_rate: var("TICK_RATE", 60),
            snapshot_rate: var("SNAPSHOT_RATE", 10),
            vision_range: var("VISION_RANGE", 200.0),
            map_width: var("MAP_WIDTH", 60),
            map_height: var("MAP_HEIGHT", 60),
            tile_size: var("TILE_SIZE", 40.0),
            grace_secs: var("GRACE_WINDOW", 60),
            ping_timeout_secs: var("PING_TIMEOUT", 30),
            room_ttl_secs: var("ROOM_TTL_WAITING", 3600),
            actions_per_sec: var("ACTIONS_PER_SEC", 10),
            actions_per_min: var("ACTIONS_PER_MIN", 300),
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into()),
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}

//! Wire protocol shared by the client, the WS handler and the room session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::snapshot::Snapshot;
use crate::game::types::Action;

// ---------- client → server ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    Action {
        room_id: Uuid,
        player_id: Uuid,
        #[serde(default)]
        action_id: Option<String>,
        action: Action,
        #[serde(default)]
        client_tick: u64,
        timestamp: DateTime<Utc>,
    },
    Join {
        room_id: Uuid,
        player_id: Uuid,
        #[serde(default)]
        player_name: Option<String>,
    },
    Leave {
        room_id: Uuid,
        player_id: Uuid,
    },
    Ready {
        room_id: Uuid,
        player_id: Uuid,
    },
    Ping {
        room_id: Uuid,
        player_id: Uuid,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

// ---------- server → client ----------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    Snapshot {
        #[serde(flatten)]
        snapshot: Snapshot,
    },
    ActionAccepted {
        action_id: Option<String>,
        tick: u64,
    },
    ActionRejected {
        action_id: Option<String>,
        reason: String,
    },
    GameStart {
        room_id: Uuid,
        tick: u64,
    },
    GameOver {
        room_id: Uuid,
        winner: Option<Uuid>,
        reason: String,
    },
    Error {
        message: String,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
}

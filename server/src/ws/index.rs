//! WebSocket endpoint: one persistent duplex connection per player.
//!
//! The socket task bridges two streams: inbound frames are parsed and routed
//! (actions to the room session, lobby verbs to the room manager), outbound
//! messages arrive on a per-player channel the session publishes to.
//! Malformed frames close the connection; a close surfaces as a disconnect.

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{handle, Message};
use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::session::SessionCmd;
use crate::protocol::{ClientMsg, ServerMsg};
use crate::rooms;

fn query_uuid(req: &HttpRequest, key: &str) -> Option<Uuid> {
    req.query_string()
        .split('&')
        .find_map(|kv| kv.strip_prefix(&format!("{key}=")).map(str::to_owned))
        .and_then(|v| Uuid::parse_str(&v).ok())
}

pub async fn ws_index(req: HttpRequest, body: web::Payload) -> Result<HttpResponse, Error> {
    let room_id =
        query_uuid(&req, "roomId").ok_or_else(|| actix_web::error::ErrorBadRequest("roomId"))?;
    let player_id = query_uuid(&req, "playerId")
        .ok_or_else(|| actix_web::error::ErrorBadRequest("playerId"))?;

    let (response, mut session, mut ws_stream) = handle(&req, body)?;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMsg>();
    rooms::register_conn(room_id, player_id, out_tx)
        .map_err(|e| actix_web::error::ErrorBadRequest(e.to_string()))?;

    actix::spawn(async move {
        loop {
            tokio::select! {
                // client → server
                frame = ws_stream.next() => {
                    let Some(frame) = frame else { break };
                    let text = match frame {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Ping(payload)) => {
                            let _ = session.pong(&payload).await;
                            continue;
                        }
                        Ok(Message::Pong(_)) | Ok(Message::Nop) => continue,
                        Ok(Message::Close(_)) | Err(_) => break,
                        // Binary and continuation frames are protocol errors.
                        _ => break,
                    };
                    let msg = match serde_json::from_str::<ClientMsg>(&text) {
                        Ok(msg) => msg,
                        Err(e) => {
                            log::warn!("malformed frame from {player_id}: {e}");
                            break;
                        }
                    };
                    if let Some(reply) = route(room_id, player_id, msg) {
                        if send(&mut session, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                // session → client
                Some(msg) = out_rx.recv() => {
                    if send(&mut session, &msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }

        rooms::drop_conn(room_id, player_id);
        log::info!("WS closed for player {player_id}");
    });

    Ok(response)
}

async fn send(session: &mut actix_ws::Session, msg: &ServerMsg) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    session.text(json).await.map_err(|_| ())
}

/// Route one inbound message; `Some` is an immediate direct reply.
fn route(conn_room: Uuid, conn_player: Uuid, msg: ClientMsg) -> Option<ServerMsg> {
    match msg {
        ClientMsg::Action {
            room_id,
            player_id,
            action_id,
            action,
            client_tick,
            timestamp,
        } => {
            if room_id != conn_room || player_id != conn_player {
                return Some(ServerMsg::Error {
                    message: "message ids do not match this connection".into(),
                });
            }
            let Some(session) = rooms::session_handle(room_id) else {
                return Some(ServerMsg::ActionRejected {
                    action_id,
                    reason: "room is not running".into(),
                });
            };
            let cmd = SessionCmd::Action {
                player: player_id,
                action,
                action_id: action_id.clone(),
                client_tick,
                timestamp,
            };
            if session.try_send(cmd).is_err() {
                return Some(ServerMsg::ActionRejected {
                    action_id,
                    reason: "room is not running".into(),
                });
            }
            None
        }
        ClientMsg::Join {
            room_id,
            player_id,
            player_name,
        } => match rooms::join(room_id, player_id, player_name) {
            Ok(_) => None,
            Err(e) => Some(ServerMsg::Error {
                message: e.to_string(),
            }),
        },
        ClientMsg::Leave { room_id, player_id } => match rooms::leave(room_id, player_id) {
            Ok(_) => None,
            Err(e) => Some(ServerMsg::Error {
                message: e.to_string(),
            }),
        },
        ClientMsg::Ready { room_id, player_id } => match rooms::ready(room_id, player_id) {
            Ok(_) => None,
            Err(e) => Some(ServerMsg::Error {
                message: e.to_string(),
            }),
        },
        ClientMsg::Ping { room_id, player_id, .. } => {
            let _ = rooms::ping(room_id, player_id);
            Some(ServerMsg::Pong {
                timestamp: Utc::now(),
            })
        }
    }
}

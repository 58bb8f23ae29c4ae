//! Lobby REST surface: create, list, join, leave, ready, start.

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;

use crate::game::types::Difficulty;
use crate::rooms::{self, RoomError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub player_id: Uuid,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub vs_ai: bool,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest {
    pub player_id: Uuid,
    #[serde(default)]
    pub player_name: Option<String>,
}

fn fail(e: RoomError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e.status_code() {
        404 => HttpResponse::NotFound().json(body),
        500 => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

/// GET /api/rooms: rooms still waiting for players.
#[get("/rooms")]
async fn list_rooms() -> impl Responder {
    HttpResponse::Ok().json(rooms::list())
}

/// GET /api/rooms/{id}
#[get("/rooms/{id}")]
async fn get_room(path: web::Path<Uuid>) -> impl Responder {
    match rooms::get(path.into_inner()) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => fail(e),
    }
}

/// POST /api/rooms: create a room; the caller becomes host.
#[post("/rooms")]
async fn create_room(body: web::Json<CreateRequest>) -> impl Responder {
    let req = body.into_inner();
    let view = rooms::create(
        req.player_id,
        req.player_name,
        req.vs_ai,
        req.difficulty,
        req.seed,
    );
    HttpResponse::Ok().json(view)
}

/// POST /api/rooms/{id}/join
#[post("/rooms/{id}/join")]
async fn join_room(path: web::Path<Uuid>, body: web::Json<MemberRequest>) -> impl Responder {
    match rooms::join(path.into_inner(), body.player_id, body.player_name.clone()) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => fail(e),
    }
}

/// POST /api/rooms/{id}/leave
#[post("/rooms/{id}/leave")]
async fn leave_room(path: web::Path<Uuid>, body: web::Json<MemberRequest>) -> impl Responder {
    match rooms::leave(path.into_inner(), body.player_id) {
        Ok(Some(view)) => HttpResponse::Ok().json(view),
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({ "deleted": true })),
        Err(e) => fail(e),
    }
}

/// POST /api/rooms/{id}/ready: toggles the caller's ready flag.
#[post("/rooms/{id}/ready")]
async fn ready_room(path: web::Path<Uuid>, body: web::Json<MemberRequest>) -> impl Responder {
    match rooms::ready(path.into_inner(), body.player_id) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => fail(e),
    }
}

/// POST /api/rooms/{id}/start: host only; spawns the match session.
#[post("/rooms/{id}/start")]
async fn start_room(path: web::Path<Uuid>, body: web::Json<MemberRequest>) -> impl Responder {
    match rooms::start(path.into_inner(), body.player_id) {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => fail(e),
    }
}

/// POST /api/rooms/{id}/pause
#[post("/rooms/{id}/pause")]
async fn pause_room(path: web::Path<Uuid>, body: web::Json<MemberRequest>) -> impl Responder {
    match rooms::pause(path.into_inner(), body.player_id) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "paused": true })),
        Err(e) => fail(e),
    }
}

/// POST /api/rooms/{id}/resume
#[post("/rooms/{id}/resume")]
async fn resume_room(path: web::Path<Uuid>, body: web::Json<MemberRequest>) -> impl Responder {
    match rooms::resume(path.into_inner(), body.player_id) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "paused": false })),
        Err(e) => fail(e),
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_rooms)
        .service(get_room)
        .service(create_room)
        .service(join_room)
        .service(leave_room)
        .service(ready_room)
        .service(start_room)
        .service(pause_room)
        .service(resume_room);
}

//! WebSocket transport: one duplex connection per player.

pub mod index;

use actix_web::web;

/// Mount the WS endpoint next to the REST tree.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/", web::get().to(index::ws_index));
}

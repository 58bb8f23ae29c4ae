//! Simple liveness / readiness probe

use actix_web::{get, web, HttpResponse, Responder};

#[get("/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}

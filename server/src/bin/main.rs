use actix_web::{middleware::Logger, App, HttpServer};
use skirmish_server::{config::settings, http, metrics, rooms, ws};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let addr = settings().server_addr.clone();

    // Background reaper for stale rooms
    rooms::start_sweeper();

    log::info!("listening on {addr}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .configure(http::routes::init_routes)
            .configure(ws::init_routes)
    })
    .bind(&addr)?
    .run()
    .await
}

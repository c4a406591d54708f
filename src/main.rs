use actix_web::{web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use log::info;
use std::env;

mod database;
mod extract;
mod models;
mod routes;
mod sessions;
mod sync;

use database::Database;
use sessions::SessionStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let db = Database::new(&data_dir).expect("Failed to initialize data directory");
    let db = web::Data::new(db);
    let session_store = web::Data::new(SessionStore::new());

    let server_address =
        env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    info!("Server running at http://{} (data dir: {})", server_address, data_dir);

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(session_store.clone())
            .route(
                "/",
                web::get().to(|| async { HttpResponse::Ok().body("Logiport backend") }),
            )
            .configure(routes::routes::login_configure)
            .configure(routes::routes::profile_configure)
            .configure(routes::routes::admin_configure)
            .configure(routes::routes::planner_configure)
            .configure(routes::routes::customs_configure)
            .configure(routes::routes::t2l_configure)
            .configure(routes::routes::toyota_configure)
    })
    .bind(server_address)?
    .run()
    .await
}

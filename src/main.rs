use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use env_logger::Env;

use mailtriage::api::{routes, AppState};
use mailtriage::classifier::Classifier;
use mailtriage::config::Settings;
use mailtriage::store::AccountStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("MAILTRIAGE_CONFIG").ok();
    let settings = Settings::new(config_path.as_deref())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log.level.as_str()))
        .init();

    let store = Arc::new(AccountStore::new(&settings.store.path));
    store
        .initialize()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let http = reqwest::Client::new();
    let classifier = Classifier::from_config(&settings.openai, http);

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let cors_origins = settings.server.cors_origins.clone();
    let state = web::Data::new(AppState::new(settings, store, classifier));

    log::info!("Starting server at http://{}", bind_addr);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}

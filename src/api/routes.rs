use actix_web::web;
use log::info;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    info!("Configuring triage routes");
    cfg.route(
        "/bulk_remove_mails",
        web::post().to(handlers::bulk_remove_mails),
    )
    .route("/delete_account", web::delete().to(handlers::delete_account))
    .route("/update_labels", web::post().to(handlers::update_labels))
    .route("/gmail_watch", web::post().to(handlers::gmail_watch))
    .route(
        "/past_email_sorter",
        web::post().to(handlers::past_email_sorter),
    )
    .route(
        "/get_user_data_ai_labeling",
        web::get().to(handlers::get_user_data),
    )
    .route("/webhook", web::get().to(handlers::webhook));
}

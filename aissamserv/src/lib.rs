pub mod ai;
pub mod config;
pub mod db;
pub mod handlers;
pub mod media;

use actix_web::web;

pub fn configure_routes() -> impl actix_web::dev::HttpServiceFactory {
    web::scope("")
        .route("/", web::get().to(handlers::root))
        .route("/register", web::post().to(handlers::register))
        .route("/token", web::post().to(handlers::login))
        .route("/me", web::get().to(handlers::me))
        .route("/subjects", web::get().to(handlers::subjects))
        .route("/chat-sessions", web::post().to(handlers::create_chat_session))
        .route("/chat-sessions", web::get().to(handlers::list_chat_sessions))
        .route("/chat-sessions/{id}", web::get().to(handlers::get_chat_session))
        .route("/chat-sessions/{id}/messages", web::post().to(handlers::post_message))
        .route("/chat-sessions/{id}/messages", web::get().to(handlers::list_messages))
        .route("/chat-sessions/{id}/analysis", web::get().to(handlers::session_analysis))
}

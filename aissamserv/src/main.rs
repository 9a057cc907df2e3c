use tracing::info;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};

use std::time::Duration;

use aissam::auth::TokenService;
use aissamserv::ai::{AiService, GeminiClient};
use aissamserv::config::Config;
use aissamserv::media::MediaStore;
use aissamserv::{configure_routes, db};

fn build_cors(allowed_origins: &[String]) -> Cors {
    if allowed_origins.iter().any(|o| o == "*") {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
    } else {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));
        cors.allow_any_method().allow_any_header()
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut _guard = None;

    if std::env::var("SERVER_LOG").unwrap_or_default() == "true" {
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            "./logs",
            "aissam-server.log"
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::writer::MakeWriterExt::and(non_blocking, std::io::stdout))
            .with_file(true)
            .with_line_number(true)
            .with_env_filter("info,actix_server=warn,actix_http::h1::dispatcher=off")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();

        _guard = Some(guard);
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stdout)
            .with_file(true)
            .with_line_number(true)
            .with_env_filter("info,actix_server=warn,actix_http::h1::dispatcher=off")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();
    }

    let cfg = Config::from_env();

    // Initialize SQLite database
    let db_pool = db::init_db(&cfg.database_url)
        .expect("Failed to initialize database");

    db::run_migrations(&db_pool)
        .expect("Failed to run database migrations");

    tracing::info!("✅ Database initialized");

    let media = MediaStore::new(&cfg.uploads_dir, &cfg.public_base_url)
        .expect("Failed to create uploads directory");

    let tokens = TokenService::new(cfg.token_secret.clone(), cfg.token_ttl_secs);
    let gemini = GeminiClient::new(
        cfg.gemini_base_url.clone(),
        cfg.gemini_api_key.clone(),
        cfg.gemini_model.clone(),
    );
    let ai = AiService::new(gemini, 3, Duration::from_secs(30));

    let db_data = web::Data::new(db_pool);
    let tokens_data = web::Data::new(tokens);
    let ai_data = web::Data::new(ai);
    let media_data = web::Data::new(media);

    info!("Server starting on http://{}/", cfg.bind_addr);

    let bind_addr = cfg.bind_addr.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(db_data.clone())
            .app_data(tokens_data.clone())
            .app_data(ai_data.clone())
            .app_data(media_data.clone())
            .wrap(build_cors(&cfg.allowed_origins))
            .wrap(Logger::default())
            .service(Files::new("/uploads", &cfg.uploads_dir))
            .service(configure_routes())
    })
    .bind(bind_addr)?
    .run()
    .await
}

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use expense_tracker::api;
use expense_tracker::app::{self, AppState};
use expense_tracker::config::AppConfig;
use expense_tracker::database::{MemoryStore, MongoDB};
use expense_tracker::middleware::SecurityHeaders;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("🚀 Starting Expense Tracker...");

    let state = if config.uses_memory_store() {
        log::warn!("⚠️  Using in-memory store, data is lost on restart");
        AppState::new(Arc::new(MemoryStore::new()), &config)
    } else {
        log::info!("📊 Connecting to MongoDB...");
        let db = match MongoDB::new(&config.database_url).await {
            Ok(db) => db,
            Err(e) => {
                log::error!("❌ Failed to connect to MongoDB: {}", e);
                std::process::exit(1);
            }
        };
        log::info!("✅ MongoDB connected successfully");
        AppState::new(Arc::new(db), &config)
    };

    let state = match state {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("❌ Failed to initialize services: {}", e);
            std::process::exit(1);
        }
    };

    match config.token_ttl_minutes {
        Some(minutes) => log::info!("🔑 Tokens expire after {} idle minutes", minutes),
        None => log::info!("🔑 Tokens never expire"),
    }

    let host = config.host.clone();
    let port = config.port;
    let origins = config.cors_allowed_origins.clone();

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
            ])
            .expose_headers(vec![header::CONTENT_TYPE])
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi)
            )
            .configure(app::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

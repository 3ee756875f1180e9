use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware};
use haven_algo::config::{LoggingSettings, Settings};
use haven_algo::coordinator::{Collaborators, RunCoordinator};
use haven_algo::core::Matcher;
use haven_algo::routes::{self, AppState};
use haven_algo::scheduler;
use haven_algo::services::{ChatClient, MailNotifier, PostgresClient};
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingSettings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Configuration comes first so logging can honour it
    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_tracing(&settings.logging);

    info!("Starting Haven Algo matchmaking service...");
    info!("Configuration loaded successfully");

    let postgres = Arc::new(
        PostgresClient::from_settings(&settings.database)
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );

    info!(
        "PostgreSQL client initialized (max: {} connections)",
        settings.database.max_connections.unwrap_or(10)
    );

    let chat = Arc::new(
        ChatClient::from_settings(&settings.chat)
            .map_err(|e| startup_error("Failed to build chat client", e))?,
    );
    let mail = Arc::new(
        MailNotifier::from_settings(&settings.notifier)
            .map_err(|e| startup_error("Failed to build mail client", e))?,
    );

    info!("Chat and mail clients initialized");

    let matcher = Matcher::new(settings.scoring_weights(), settings.matching_policy());

    info!(
        "Matcher initialized with weights: {:?}, policy: {:?}",
        matcher.weights(),
        matcher.policy()
    );

    let collaborators = Collaborators {
        queue: postgres.clone(),
        groups: postgres.clone(),
        channels: chat,
        contacts: postgres.clone(),
        notifier: mail,
    };

    let coordinator = Arc::new(
        RunCoordinator::new(matcher, collaborators, settings.retry_config())
            .with_limits(settings.run_limits()),
    );

    let _scheduler = scheduler::spawn(coordinator.clone(), &settings.scheduler);

    // Build application state
    let app_state = AppState {
        coordinator,
        database: postgres,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}

//! # Clinic Scribe Backend - Main Application Entry Point
//!
//! Actix-web server for the clinic dictation workflow:
//!
//! ## Application Architecture:
//! - **config**: application configuration (TOML files + environment variables)
//! - **state**: shared application state and metrics
//! - **error**: custom error types and HTTP error responses
//! - **middleware**: request logging and metrics collection
//! - **health**: system health and metrics endpoints
//! - **audio**: PCM frame validation for the dictation stream
//! - **speech**: live dictation relay (WebSocket ↔ streaming recognizer)
//! - **llm**: generative text backend (Gemini)
//! - **notes**: transcript → structured consultation draft extraction
//! - **adr**: adverse-drug-reaction screening against the label registry
//! - **handlers**: thin HTTP handlers over the engines
//!
//! ## Request Surface:
//! - `GET  /live_transcript` — WebSocket dictation relay
//! - `POST /process_transcript_text` — structure the accumulated transcript
//! - `POST /adr_screening` — screen the transcript for drug alerts
//! - `GET  /health`, `/api/v1/health`, `/api/v1/metrics`, `/api/v1/config`

mod adr;
mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod llm;
mod middleware;
mod notes;
mod speech;
mod state;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown signal, set by the signal handler task and polled by the
/// main select loop for graceful shutdown.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting clinic-scribe-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    if !config.gemini_configured() {
        info!("Gemini API key not set; note structuring and ADR screening will answer 503");
    }
    if config.speech.endpoint_url.trim().is_empty() {
        info!("Speech recognizer endpoint not set; live dictation will answer 503");
    }

    let app_state = AppState::new(config.clone());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        // The consultation UI is served from a different origin in
        // development, so CORS stays permissive here.
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
            .route("/health", web::get().to(health::health_check))
            .route(
                "/process_transcript_text",
                web::post().to(handlers::process_transcript_text),
            )
            .route("/adr_screening", web::post().to(handlers::adr_screening))
            .route("/live_transcript", web::get().to(speech::relay::live_transcript))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Race the server against the shutdown signal.
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// `RUST_LOG` controls the filter; the default keeps this crate at debug and
/// actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_scribe_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM/SIGINT and flip the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set.
///
/// Simple polling keeps the select arm trivial; 100ms of shutdown latency is
/// irrelevant next to in-flight dictations being drained.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}

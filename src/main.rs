//! Gemini Canvas - conversational image generation backend
//!
//! Turns chat commands into Gemini image and text calls, keeping per-user
//! conversations, pending multi-step operations and recent images in memory.

mod api;
mod cache;
mod config;
mod engine;
mod gemini;
mod pending;
mod response;
mod session;
mod store;
mod translate;

use api::{create_router, AppState};
use cache::DiskImageStore;
use config::Config;
use engine::Engine;
use gemini::ReqwestTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_canvas=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();
    if config.has_api_key() {
        tracing::info!(
            base_url = %config.base_url,
            auth_mode = ?config.auth_mode,
            image_model = %config.image_model,
            chat_model = %config.chat_model,
            "Gemini configured"
        );
    } else {
        tracing::warn!("No API key configured. Set GEMINI_API_KEY.");
    }

    let transport = Arc::new(ReqwestTransport::new()?);
    tracing::info!(path = %config.save_dir.display(), "Saving generated images");
    let last_images = Arc::new(DiskImageStore::new(config.save_dir.clone()));
    let port = config.port;
    let engine = Arc::new(Engine::new(config, transport, last_images));

    // Periodic expiry of sessions, cached images and pending operations
    let sweeper = Arc::clone(&engine);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let report = sweeper.sweep(tokio::time::Instant::now()).await;
            if report != engine::SweepReport::default() {
                tracing::info!(
                    sessions = report.sessions,
                    images = report.images,
                    pending = report.pending,
                    last_images = report.last_images,
                    "Expired state swept"
                );
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(engine))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CompressionLayer::new());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Gemini Canvas listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

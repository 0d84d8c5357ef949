//! Profile Server - user profile data over a whole-document store
//!
//! Serves favorite places, favorite prompts, visit history, collections and
//! preferences. All of a user's data lives in one record; see the library
//! crate for the storage model.

use anyhow::Context;
use axum::http::Method;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use profile_store::api::{self, AppState};
use profile_store::config::{BackendKind, ServiceConfig};
use profile_store::features::ProfileServices;
use profile_store::storage::{InMemoryBackend, RecordBackend, SledBackend};
use profile_store::store::{AcceptAll, KnownReferences, ReferenceValidator, SystemClock};

// ============================================================================
// STARTUP
// ============================================================================

fn open_backend(config: &ServiceConfig) -> anyhow::Result<(Arc<dyn RecordBackend>, &'static str)> {
    match config.backend {
        BackendKind::Memory => {
            warn!("Using in-memory backend - profiles will be lost on restart");
            let backend: Arc<dyn RecordBackend> = Arc::new(InMemoryBackend::new());
            Ok((backend, "memory"))
        }
        BackendKind::Sled => {
            info!("Initializing storage at: {}", config.storage.path);
            let backend = SledBackend::open(&config.storage).context("Failed to open storage")?;
            info!("Storage initialized ({} records)", backend.record_count());
            let backend: Arc<dyn RecordBackend> = Arc::new(backend);
            Ok((backend, "sled"))
        }
    }
}

fn reference_validator(config: &ServiceConfig) -> Arc<dyn ReferenceValidator> {
    if config.known_places.is_empty() {
        info!("No known places configured - accepting every place id");
        Arc::new(AcceptAll)
    } else {
        info!("Validating against {} known places", config.known_places.len());
        Arc::new(KnownReferences::new(config.known_places.iter().cloned()))
    }
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profile_store=info,profile_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    let (backend, backend_name) = open_backend(&config)?;
    let services = ProfileServices::new(
        backend,
        reference_validator(&config),
        Arc::new(SystemClock),
        config.feature_config(),
    );

    // Create application state
    let state = Arc::new(AppState::new(services, backend_name));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("Profile server v{} starting", env!("CARGO_PKG_VERSION"));
    info!("   Backend: {}", backend_name);
    info!("   Consistency: {:?}", config.consistency());
    info!("   Listening on: http://{}", addr);
    info!("   Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

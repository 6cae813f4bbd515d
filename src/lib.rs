pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use log::{info, warn};
use tower_http::cors::{Any, CorsLayer};

// Export API types
pub use api::handlers::{AppState, ErrorResponse};
pub use api::routes;

// Export logic types
pub use logic::{
    CsvImport, DocumentRenderer, EmailMessageSender, LogMailTransport, LookupQuery,
    LookupValueOperations, MailTransport, TemplateRenderService,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use crate::config::{AppConfig, StorageBackend};

/// Router with state and CORS applied, ready to serve.
pub fn build_app<S: Store + ?Sized + 'static>(
    store: Arc<S>,
    renderer: Arc<dyn DocumentRenderer>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::create_router::<S>()
        .with_state(AppState::new(store, renderer))
        .layer(cors)
}

/// Connects the configured backend and serves until the listener fails.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    match config.database.backend {
        StorageBackend::Postgres => {
            info!("Connecting to PostgreSQL...");
            let store = PostgresStore::new(&config.database_url()?, config.max_connections()).await?;
            info!("Running database migrations...");
            store.migrate().await?;
            serve(Arc::new(store), &config).await
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; data is lost on shutdown");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn serve<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    let template_dir = &config.render.template_dir;
    if !std::path::Path::new(template_dir).is_dir() {
        warn!("Template directory {} does not exist", template_dir);
    }
    let renderer: Arc<dyn DocumentRenderer> = Arc::new(TemplateRenderService::new(template_dir));

    if config.mail.enabled {
        EmailMessageSender::new(
            store.clone(),
            Arc::new(LogMailTransport),
            config.mail.from_address.clone(),
            config.mail.batch_size,
        )
        .spawn(Duration::from_secs(config.mail.poll_interval_secs.max(1)));
        info!(
            "E-mail outbox polled every {}s",
            config.mail.poll_interval_secs.max(1)
        );
    }

    let app = build_app(store, renderer);
    let bind_address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Lookup service running on http://{}", bind_address);
    info!("API documentation available at http://{}/docs", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

use env_logger::{Builder, Env};
use log::{info, LevelFilter};
use lookup_db_rust::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    info!("Lookup values service");

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded: server={}:{} backend={:?}",
        config.server.host, config.server.port, config.database.backend
    );

    lookup_db_rust::run_server(config).await
}

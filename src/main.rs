//! Approval ledger - main application entry point.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the store: PostgreSQL (pool + migrations) when `DATABASE_URL` is set,
//!    otherwise the in-memory store
//! 3. Provision the bootstrap admin if `ADMIN_API_KEY` is set
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

use approval_ledger::{
    app,
    config::Config,
    db,
    services::{account_service, transaction_service::LedgerSettings},
    state::AppState,
    store::{LedgerStore, MemoryStore, PgStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let settings = LedgerSettings {
        balance_precheck: config.balance_precheck,
    };

    match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::create_pool(database_url, config.max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            serve(PgStore::new(pool), settings, &config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            serve(MemoryStore::new(), settings, &config).await
        }
    }
}

async fn serve<S: LedgerStore>(
    store: S,
    settings: LedgerSettings,
    config: &Config,
) -> anyhow::Result<()> {
    if let Some(admin_api_key) = config.admin_api_key.as_deref() {
        let admin = account_service::bootstrap_admin(&store, admin_api_key).await?;
        tracing::info!(account_id = %admin.account_id, "Admin principal ready");
    }

    let app = app(AppState::new(store, settings));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

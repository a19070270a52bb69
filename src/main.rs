use std::sync::Arc;

use forrisco_api::auth::{generate_jwt, Claims};
use forrisco_api::config::{self, StoreBackend};
use forrisco_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use forrisco_api::{app, is_production, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting ForRisco API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match config.database.backend {
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            if config.database.run_migrations {
                DatabaseManager::migrate(&pool).await?;
                tracing::info!("Database migrations applied");
            }
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            if is_production!() {
                tracing::warn!("Running production with the in-memory store; data is lost on restart");
            }
            let memory = MemoryStore::with_demo_data().await;
            if let Some(admin) = memory.user(MemoryStore::DEMO_ADMIN_ID).await? {
                let claims = Claims::new(&admin, Vec::new(), config.security.jwt_expiry_hours);
                match generate_jwt(&claims, &config.security.jwt_secret) {
                    Ok(token) => tracing::info!("Demo company admin token: {}", token),
                    Err(e) => tracing::warn!("Could not issue demo token: {}", e),
                }
            }
            Arc::new(memory)
        }
    };

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let router = app(AppState::new(store, config));
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("ForRisco API listening on http://{}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}

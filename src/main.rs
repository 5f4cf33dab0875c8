use account_manager::api::{create_router, AppState};
use account_manager::cache::RedisAccountCache;
use account_manager::config::Settings;
use account_manager::id_generator::SnowflakeIdGenerator;
use account_manager::lock::RedisLockManager;
use account_manager::observability::{init_logging, init_metrics, LogConfig};
use account_manager::repositories::PgAccountRepository;
use account_manager::services::AccountService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    init_logging(&LogConfig::from(&settings.application));
    info!("Configuration loaded");

    let metrics_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Metrics recorder not installed: {}", e);
            None
        }
    };

    // Connect to PostgreSQL
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout_secs))
        .connect(&settings.database.url)
        .await?;
    info!("Database connection established");

    // Connect to Redis
    info!("Connecting to Redis at {}...", settings.redis.url);
    let client = redis::Client::open(settings.redis.url.as_str())?;
    let mut con = client.get_multiplexed_async_connection().await?;
    let _: () = redis::cmd("PING").query_async(&mut con).await?;
    info!("Redis connection established");

    let service = AccountService::new(
        Arc::new(PgAccountRepository::new(pool)),
        Arc::new(RedisLockManager::new(
            client.clone(),
            settings.locks.retry_interval(),
        )),
        Arc::new(RedisAccountCache::new(client, settings.cache.clone())),
        Arc::new(SnowflakeIdGenerator::new(settings.id_generator.node_id)),
        settings.locks.clone(),
        settings.cache.ttl(),
    );

    let mut state = AppState::new(Arc::new(service));
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }
    let app = create_router(state);

    let addr = format!("{}:{}", settings.application.host, settings.application.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

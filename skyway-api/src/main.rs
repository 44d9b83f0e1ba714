use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use skyway_api::{app, auth::ensure_admin, worker, AppState, Repositories};
use skyway_core::repository::{EventPublisher, RateLimiter, SessionStore};
use skyway_store::app_config::{Config, StorageBackend};
use skyway_store::{DbClient, EventProducer, LogEventPublisher, MemoryRateLimiter, MemorySessionStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyway_api=debug,skyway_core=debug,skyway_store=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Skyway API on port {}", config.server.port);

    // Storage
    let repos = match config.database.backend {
        StorageBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("database.url is required for the postgres backend")?;
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Repositories::postgres(&db)
        }
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Repositories::in_memory()
        }
    };

    // Redis Connection
    let (sessions, rate_limiter): (Arc<dyn SessionStore>, Arc<dyn RateLimiter>) = match &config.redis.url {
        Some(url) => {
            let redis = Arc::new(RedisClient::new(url).await.context("Failed to connect to Redis")?);
            let sessions: Arc<dyn SessionStore> = redis.clone();
            let limiter: Arc<dyn RateLimiter> = redis;
            (sessions, limiter)
        }
        None => {
            tracing::info!("Redis not configured, using in-memory sessions and rate limits");
            let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            let limiter: Arc<dyn RateLimiter> = Arc::new(MemoryRateLimiter::new());
            (sessions, limiter)
        }
    };

    // Kafka Connection
    let events: Arc<dyn EventPublisher> = match &config.kafka.brokers {
        Some(brokers) => Arc::new(EventProducer::new(brokers).context("Failed to create Kafka producer")?),
        None => {
            tracing::info!("Kafka not configured, events go to the log");
            Arc::new(LogEventPublisher)
        }
    };

    let state = AppState::new(
        repos,
        sessions,
        rate_limiter,
        events,
        config.auth.clone(),
        config.business_rules.clone(),
    )
    .context("Failed to register metrics")?;

    if let (Some(email), Some(password)) = (&config.auth.admin_email, &config.auth.admin_password) {
        ensure_admin(&state, email, password)
            .await
            .context("Failed to create bootstrap admin")?;
    }

    if config.database.backend == StorageBackend::Memory && config.database.seed_demo_flights > 0 {
        skyway_store::seed::seed_demo_flights(
            state.flights.as_ref(),
            config.database.seed_demo_flights as usize,
            &config.business_rules.default_currency,
        )
        .await
        .context("Failed to seed demo flights")?;
    }

    tokio::spawn(worker::start_hold_expiry_worker(state.clone()));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use cdc_indexer::{CdcIndexer, ElasticsearchSink};
use engagement_core::{
    EngagementEngine, EngineParts, GuardedVerifier, PgCounterStore, PgDirectory,
    RedisCacheBackend,
};
use engagement_service::{handlers, identity::HttpTokenVerifier, metrics, AppState, Config};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "engagement_service=info,engagement_core=info,actix_web=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("Starting engagement-service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        env = %config.app.env,
        port = config.app.port,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let redis_client =
        redis::Client::open(config.redis.url.as_str()).context("Failed to create Redis client")?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection established");

    metrics::register().context("Failed to register metrics")?;

    let directory = Arc::new(PgDirectory::new(pg_pool.clone()));
    let (engine, worker) = EngagementEngine::start(
        &config.engine,
        EngineParts {
            store: Arc::new(PgCounterStore::new(pg_pool.clone())),
            cache_backend: Arc::new(RedisCacheBackend::new(redis_conn)),
            directory: directory.clone(),
            authors: directory,
        },
    );

    let verifier = GuardedVerifier::new(
        HttpTokenVerifier::new(&config.identity.url),
        config.identity.breaker(),
        &config.identity.rate_limit(),
        config.identity.request_timeout(),
    )
    .context("Invalid identity-service guard configuration")?;

    let indexer = match &config.search {
        Some(search) => {
            let routes = search.index_routes();
            if routes.is_empty() {
                warn!("SEARCH_URL set but SEARCH_INDEX_ROUTES is empty; every topic will be rejected");
            }
            let sink = ElasticsearchSink::new(search.url.as_str(), search.request_timeout())
                .context("Failed to build search client")?;
            info!(routes = routes.len(), "Search indexing enabled");
            Some(Arc::new(CdcIndexer::new(Arc::new(sink), routes)))
        }
        None => None,
    };

    let state = AppState {
        engine: Arc::new(engine),
        verifier: Arc::new(verifier),
        indexer,
        internal_token: config.app.internal_token.clone(),
    };

    if state.internal_token.is_none() {
        warn!("INTERNAL_API_TOKEN not set; internal endpoints are disabled");
    }

    let bind_addr = (config.app.host.clone(), config.app.port);
    info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    // Actix installs its own SIGINT/SIGTERM handling and drains connections
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("HTTP server stopped, draining refresh queue");
    worker.shutdown().await;
    pg_pool.close().await;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cache;
mod config;
mod domain;
mod http;
mod messaging;
mod metrics;
mod service;
mod storage;

use cache::{CachedOrderReader, InMemoryOrderCache};
use config::AppConfig;
use http::AppState;
use messaging::{KafkaPublisher, OrderConsumer};
use service::OrderSaver;
use storage::{OrderReader, PgStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orderflow=debug")),
        )
        .init();

    tracing::info!("🚀 Starting orderflow ingestion pipeline");

    let config = AppConfig::from_env();

    // === 1. Connect storage and apply migrations ===
    tracing::info!(
        max_connections = config.database.max_connections,
        "Connecting to Postgres..."
    );
    let storage = PgStorage::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.op_timeout,
    )
    .await?;
    storage.run_migrations().await?;

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 3. Create Kafka publisher ===
    let publisher = Arc::new(KafkaPublisher::new(&config.kafka)?);

    // === 4. Start the consumer pipeline ===
    let shutdown = CancellationToken::new();
    let saver = OrderSaver::new(storage.clone(), metrics.clone());
    let consumer = OrderConsumer::new(&config.kafka, saver, metrics.clone(), shutdown.clone())?;
    let consumer_task = tokio::spawn(consumer.run());

    // === 5. Wire the cache-aside read path ===
    let reader: Arc<dyn OrderReader> = Arc::new(CachedOrderReader::new(
        storage,
        InMemoryOrderCache::new(),
        metrics.clone(),
    ));

    // === 6. Start the HTTP server ===
    let server = http::run_server(
        &config.http,
        AppState {
            reader,
            publisher: publisher.clone(),
            topic: config.kafka.topic.clone(),
            metrics: metrics.clone(),
        },
    )?;
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tracing::info!(addr = %config.http.addr, topic = %config.kafka.topic, "✅ orderflow is up");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    // === 7. Drain in dependency order ===
    // Consumer first so its final offset commit happens while the broker
    // connection is still healthy, then the HTTP server, then the producer
    // queue for anything accepted meanwhile.
    shutdown.cancel();
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "consumer task panicked");
    }

    server_handle.stop(true).await;
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "server exited with error"),
        Err(e) => tracing::error!(error = %e, "server task panicked"),
    }

    if let Err(e) = publisher.flush(Duration::from_secs(5)) {
        tracing::warn!(error = %e, "producer queue did not drain cleanly");
    }

    tracing::info!("🎉 Shutdown complete");

    Ok(())
}

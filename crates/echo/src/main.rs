//! Echo - execution reply consumer for Athena
//!
//! Consumes execution replies from a Redis Stream, correlates each one with
//! the (solution, test case) pair it answers and records the result.

mod config;
mod consumer;
mod handler;
mod metrics;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use athena_common::HeaderKeyCodec;
use themis::{PgStore, ResultRecorder};

use crate::config::Config;
use crate::consumer::ReplyConsumer;
use crate::handler::ReplyHandler;
use crate::metrics::MetricsServer;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "echo=debug,themis=debug,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting Echo reply consumer");

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Environment: {}", config.environment);

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    store.migrate().await?;
    tracing::info!("Database connected, migrations applied");

    tracing::info!("Connecting to Redis...");
    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis_pool = redis_cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
    tracing::info!("Redis pool created");

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing current batch...");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = MetricsServer::run(metrics_port).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    let recorder = ResultRecorder::new(store);
    let handler = Arc::new(ReplyHandler::new(
        Arc::new(HeaderKeyCodec::default()),
        Arc::new(recorder),
    ));

    let consumers: Vec<ReplyConsumer> = (0..config.workers)
        .map(|index| {
            ReplyConsumer::new(
                config.clone(),
                config.consumer_name(index),
                redis_pool.clone(),
                handler.clone(),
                shutdown.clone(),
            )
        })
        .collect();

    if let Some(first) = consumers.first() {
        first.initialize().await?;
    }

    tracing::info!(workers = consumers.len(), "Echo ready, starting reply consumers");

    let handles: Vec<_> = consumers
        .into_iter()
        .map(|consumer| tokio::spawn(async move { consumer.run().await }))
        .collect();

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Reply consumer stopped with error: {}", e),
            Err(e) => tracing::error!("Reply consumer task panicked: {}", e),
        }
    }

    tracing::info!("Echo shutdown complete");
    Ok(())
}

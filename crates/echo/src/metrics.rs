//! Prometheus metrics for Echo

use std::sync::LazyLock;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::handler::{DropReason, Outcome};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Replies recorded by the processor
pub static REPLIES_PROCESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("echo_replies_processed_total", "Total replies recorded")
        .expect("Failed to create counter")
});

/// Replies acknowledged without being recorded, by reason
pub static REPLIES_DROPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let opts = Opts::new("echo_replies_dropped_total", "Total replies dropped by reason");
    IntCounterVec::new(opts, &["reason"]).expect("Failed to create counter")
});

/// Replies left pending after a transport or storage failure
pub static REPLIES_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("echo_replies_failed_total", "Total replies that failed to process")
        .expect("Failed to create counter")
});

/// Register all metrics with [`REGISTRY`]
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(REPLIES_PROCESSED.clone()))?;
    REGISTRY.register(Box::new(REPLIES_DROPPED.clone()))?;
    REGISTRY.register(Box::new(REPLIES_FAILED.clone()))?;
    Ok(())
}

pub fn record_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Processed => REPLIES_PROCESSED.inc(),
        Outcome::Dropped(reason) => record_drop(reason),
    }
}

pub fn record_drop(reason: DropReason) {
    REPLIES_DROPPED.with_label_values(&[reason.as_str()]).inc();
}

pub fn record_failure() {
    REPLIES_FAILED.inc();
}

/// HTTP server for Prometheus metrics endpoint
pub struct MetricsServer;

impl MetricsServer {
    /// Run the metrics server
    pub async fn run(port: u16) -> anyhow::Result<()> {
        use axum::{Router, routing::get};
        use std::net::SocketAddr;

        init_metrics()?;

        let app = Router::new()
            .route("/metrics", get(Self::metrics_handler))
            .route("/health", get(|| async { "OK" }));

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!("Metrics server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    async fn metrics_handler() -> String {
        render(&REGISTRY).unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}

fn render(registry: &Registry) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

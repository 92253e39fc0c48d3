//! Prometheus metrics and the health listener.

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Installs the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Registers descriptions for the synchronizer's metrics.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "relsync_tuple_writes_total",
        "Total relationship tuples written to the store"
    );
    metrics::describe_counter!(
        "relsync_tuple_deletes_total",
        "Total relationship tuples deleted from the store"
    );
    metrics::describe_counter!(
        "relsync_check_cache_hits_total",
        "Check results answered from the shared cache"
    );
    metrics::describe_counter!(
        "relsync_check_cache_misses_total",
        "Check lookups that missed the shared cache"
    );
    metrics::describe_counter!(
        "relsync_check_cache_stale_total",
        "Cache entries rejected as older than the invalidation marker"
    );
}

fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/livez", get(|| async { "OK" }))
        .route("/readyz", get(|| async { "OK" }))
        .route("/metrics", get(move || async move { handle.render() }))
}

/// Serves the health and metrics endpoints until the process exits.
pub async fn serve_metrics(listen: &str, handle: PrometheusHandle) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(listen, "metrics listener started");
    axum::serve(listener, router(handle)).await?;
    Ok(())
}

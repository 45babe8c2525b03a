use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics — pipeline counters and timings in Prometheus text
/// exposition format.
pub async fn scrape(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

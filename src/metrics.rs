use axum::{extract::State, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::signal::SignalSource;

pub const MERGES_TOTAL: &str = "profile_merges_total";
pub const MERGE_CONFLICTS_TOTAL: &str = "profile_merge_conflicts_total";
pub const SIGNALS_REJECTED_TOTAL: &str = "profile_signals_rejected_total";
pub const ADJUSTED_WEIGHT: &str = "profile_adjusted_weight";
pub const MAX_RETRIES: &str = "profile_engine_max_retries";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose a static gauge for the retry budget.
    pub fn init(max_retries: u32) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        gauge!(MAX_RETRIES).set(max_retries as f64);

        Ok(Self { handle })
    }

    /// `GET /metrics` in the Prometheus text format, merged beside `api::router`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

// Recording helpers. Without an installed recorder these are no-ops.

pub(crate) fn record_merge(source: SignalSource, adjusted_weight: f64) {
    counter!(MERGES_TOTAL, "source" => source.as_str()).increment(1);
    histogram!(ADJUSTED_WEIGHT).record(adjusted_weight);
}

pub(crate) fn record_conflict() {
    counter!(MERGE_CONFLICTS_TOTAL).increment(1);
}

pub(crate) fn record_rejected(reason: &'static str) {
    counter!(SIGNALS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

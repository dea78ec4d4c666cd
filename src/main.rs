//! Cognitive Profile Engine — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, shared state, metrics, and routes.

use cognitive_profile_engine::{
    api::{self, AppState},
    config::EngineConfig,
    metrics::Metrics,
};
use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the tracing subscriber.
///   - filter from RUST_LOG, default `cognitive_profile_engine=info,warn`
///   - LOG_FORMAT=json switches from compact to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cognitive_profile_engine=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let (json_layer, compact_layer) = if json {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer().compact()))
    };

    // A subscriber may already be installed by the runtime; keep that one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(compact_layer)
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = EngineConfig::load()?;
    info!(
        max_retries = config.service.max_retries,
        dedup_by_source_id = config.service.dedup_by_source_id,
        "engine config loaded"
    );

    let metrics = Metrics::init(config.service.max_retries)?;
    let state = AppState::with_config(config);
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}

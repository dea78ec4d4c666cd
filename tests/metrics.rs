// tests/metrics.rs
//
// The Prometheus recorder is process-global, so this binary holds a single test.
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use cognitive_profile_engine::api::{self, AppState};
use cognitive_profile_engine::metrics::Metrics;
use cognitive_profile_engine::EngineConfig;

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let metrics = Metrics::init(5).expect("install recorder once per process");
    let app = api::router(AppState::with_config(EngineConfig::default())).merge(metrics.router());

    // One accepted and one rejected signal.
    for payload in [
        json!({ "source": "quiz", "intent_vector": { "learn": 1.0 } }),
        json!({ "source": "telepathy" }),
    ] {
        app.clone()
            .oneshot(
                Request::post("/profiles/c1/signals")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "profile_merges_total",
        "source=\"quiz\"",
        "profile_signals_rejected_total",
        "reason=\"validation\"",
        "profile_adjusted_weight",
        "profile_engine_max_retries 5",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}

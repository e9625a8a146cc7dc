//! End-to-end tests against the router served on a local port.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use tonemeter_api::{app_state::AppState, config::ServiceConfig, router};
use tonemeter_core::model::{Classifier, Prediction, SentimentModel};

/// Serve `state` on an ephemeral port and return the base URL.
async fn start(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn default_state() -> AppState {
    AppState::new(ServiceConfig::default()).unwrap()
}

/// Counts calls before delegating to the real model.
struct CountingClassifier {
    inner: SentimentModel,
    calls: AtomicUsize,
}

impl Classifier for CountingClassifier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn predict(&self, text: &str) -> Prediction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(text)
    }
}

struct PanickingClassifier;

impl Classifier for PanickingClassifier {
    fn name(&self) -> &str {
        "broken"
    }

    fn predict(&self, _text: &str) -> Prediction {
        panic!("model exploded");
    }
}

async fn post_predict(client: &reqwest::Client, base: &str, body: Value) -> reqwest::Response {
    client.post(format!("{base}/predict")).json(&body).send().await.unwrap()
}

#[tokio::test]
async fn health_is_always_ok() {
    let base = start(default_state()).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let resp = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "status": "ok" }));
    }
}

#[tokio::test]
async fn predict_scenarios() {
    let base = start(default_state()).await;
    let client = reqwest::Client::new();

    let resp = post_predict(&client, &base, json!({ "text": "i love this" })).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["label"], "positive");
    assert!(body["score"].as_f64().unwrap() >= 0.5);
    assert_eq!(body["model"], "tfidf+logreg");

    let resp = post_predict(&client, &base, json!({ "text": "this is terrible" })).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["label"], "negative");
    assert!(body["score"].as_f64().unwrap() >= 0.5);

    let resp = post_predict(&client, &base, json!({ "text": "   " })).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn score_stays_in_range_for_arbitrary_text() {
    let base = start(default_state()).await;
    let client = reqwest::Client::new();

    for text in ["ok", "what a day", "zzz", "great great great", "not bad at all", "1234 5678"] {
        let body: Value = post_predict(&client, &base, json!({ "text": text })).await.json().await.unwrap();
        let label = body["label"].as_str().unwrap();
        assert!(label == "positive" || label == "negative", "{text}: {label}");
        let score = body["score"].as_f64().unwrap();
        assert!((0.5..=1.0).contains(&score), "{text}: {score}");
    }
}

#[tokio::test]
async fn blank_text_is_rejected_before_the_model() {
    let classifier = Arc::new(CountingClassifier { inner: SentimentModel::train().unwrap(), calls: AtomicUsize::new(0) });
    let state = AppState::with_classifier(ServiceConfig::default(), classifier.clone()).unwrap();
    let base = start(state.clone()).await;
    let client = reqwest::Client::new();

    for text in ["", "   ", "\n\t "] {
        let resp = post_predict(&client, &base, json!({ "text": text })).await;
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "INVALID_INPUT");
        assert_eq!(body["message"], "text must not be empty");
    }

    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    let metrics = state.metrics();
    assert_eq!(metrics.requests_total.get(&["/predict", "POST", "400"]), 3);
    assert_eq!(metrics.inference_latency.snapshot(&[]).count, 0);
}

#[tokio::test]
async fn malformed_body_is_unprocessable() {
    let state = default_state();
    let base = start(state.clone()).await;
    let client = reqwest::Client::new();

    let resp = post_predict(&client, &base, json!({ "txt": "hello" })).await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_BODY");

    assert_eq!(state.metrics().requests_total.get(&["/predict", "POST", "422"]), 1);
    assert_eq!(state.metrics().inprogress.get(&[]), 0);
}

#[tokio::test]
async fn concurrent_predictions_are_all_counted() {
    const N: usize = 64;
    let state = default_state();
    let base = start(state.clone()).await;
    let client = reqwest::Client::new();

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let client = client.clone();
            let base = base.clone();
            let text = if i % 2 == 0 { "great work" } else { "bad work" };
            tokio::spawn(async move { post_predict(&client, &base, json!({ "text": text })).await.status() })
        })
        .collect();
    for t in tasks {
        assert_eq!(t.await.unwrap(), 200);
    }

    let metrics = state.metrics();
    assert_eq!(metrics.requests_total.get(&["/predict", "POST", "200"]), N as u64);
    assert_eq!(metrics.request_latency.snapshot(&["/predict", "POST"]).count, N as u64);
    assert_eq!(metrics.inference_latency.snapshot(&[]).count, N as u64);
    assert_eq!(metrics.inprogress.get(&[]), 0);
}

#[tokio::test]
async fn inprogress_gauge_settles_after_every_request_kind() {
    let state = default_state();
    let base = start(state.clone()).await;
    let client = reqwest::Client::new();
    let gauge = || state.metrics().inprogress.get(&[]);

    client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(gauge(), 0);
    post_predict(&client, &base, json!({ "text": "i love this" })).await;
    assert_eq!(gauge(), 0);
    post_predict(&client, &base, json!({ "text": "" })).await;
    assert_eq!(gauge(), 0);
    client.post(format!("{base}/predict")).body("not json").send().await.unwrap();
    assert_eq!(gauge(), 0);

    // The scrape is itself in flight while it renders.
    let text = client.get(format!("{base}/metrics")).send().await.unwrap().text().await.unwrap();
    assert!(text.lines().any(|l| l == "api_inprogress_requests 1"));
    assert_eq!(gauge(), 0);
}

#[tokio::test]
async fn metrics_exposition_lists_declared_metrics() {
    let base = start(default_state()).await;
    let client = reqwest::Client::new();

    client.get(format!("{base}/health")).send().await.unwrap();
    post_predict(&client, &base, json!({ "text": "i love this" })).await;

    let resp = client.get(format!("{base}/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let text = resp.text().await.unwrap();

    let samples: Vec<&str> = text.lines().filter(|l| !l.starts_with('#') && !l.is_empty()).collect();
    for name in [
        "api_requests_total",
        "api_request_latency_seconds",
        "api_inprogress_requests",
        "model_inference_latency_seconds",
        "tonemeter_build_info",
    ] {
        assert!(samples.iter().any(|l| l.starts_with(name)), "missing {name}");
    }
    #[cfg(target_os = "linux")]
    assert!(samples.iter().any(|l| l.starts_with("process_resident_memory_bytes ")));

    assert!(samples.contains(&r#"api_requests_total{endpoint="/predict",method="POST",http_status="200"} 1"#));
    assert!(samples.contains(&r#"api_requests_total{endpoint="/health",method="GET",http_status="200"} 1"#));
    assert!(samples.contains(&"model_inference_latency_seconds_count 1"));

    // Every sample line is `name[{labels}] value` with a numeric value.
    for line in &samples {
        let (_, value) = line.rsplit_once(' ').unwrap();
        assert!(value.parse::<f64>().is_ok(), "bad sample: {line}");
    }
}

#[tokio::test]
async fn scrapes_are_counted_as_requests() {
    let state = default_state();
    let base = start(state.clone()).await;
    let client = reqwest::Client::new();

    client.get(format!("{base}/metrics")).send().await.unwrap().text().await.unwrap();
    let text = client.get(format!("{base}/metrics")).send().await.unwrap().text().await.unwrap();

    assert!(text.contains(r#"api_requests_total{endpoint="/metrics",method="GET",http_status="200"} 1"#));
    assert_eq!(state.metrics().requests_total.get(&["/metrics", "GET", "200"]), 2);
}

#[tokio::test]
async fn panicking_handler_is_recorded_as_500() {
    let state = AppState::with_classifier(ServiceConfig::default(), Arc::new(PanickingClassifier)).unwrap();
    let base = start(state.clone()).await;
    let client = reqwest::Client::builder().pool_max_idle_per_host(0).build().unwrap();

    // The connection is torn down; there is no response to inspect.
    let _ = client.post(format!("{base}/predict")).json(&json!({ "text": "hello" })).send().await;

    let metrics = state.metrics();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while metrics.requests_total.get(&["/predict", "POST", "500"]) == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(metrics.requests_total.get(&["/predict", "POST", "500"]), 1);
    assert_eq!(metrics.inprogress.get(&[]), 0);
    assert_eq!(metrics.inference_latency.snapshot(&[]).count, 0);
}

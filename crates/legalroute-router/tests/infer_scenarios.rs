//! Integration tests for the router's concrete operating scenarios, driven
//! against the real Axum router with fake GPU/CPU backends stood up by
//! `wiremock`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use legalroute_router::config::Config;
use legalroute_router::state::AppState;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `HealthMonitor`'s first probe fires after a fixed 500ms initial delay
/// (see `state.rs`); tests that need GPU eligible must outlive that.
const GPU_WARMUP: Duration = Duration::from_millis(700);

fn test_config(gpu_url: String, cpu_url: String, gpu_max_inflight: usize) -> Config {
    Config {
        listen_addr: ([127, 0, 0, 1], 0).into(),
        gpu_url,
        cpu_url,
        gpu_max_inflight,
        backend_timeout: Duration::from_millis(500),
        health_check_interval: Duration::from_millis(20),
        circuit_breaker_failure_threshold: 3,
        circuit_breaker_cooldown: Duration::from_secs(30),
        cache_similarity_threshold: 0.95,
        cache_ttl: Duration::from_secs(3600),
        embedding_dimension: 32,
        embedding_service_url: None,
        retrieval_alpha: 0.5,
        retrieval_bi_encoder_model: None,
        retrieval_cross_encoder_model: None,
        retrieval_enable_reranking: false,
    }
}

fn metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

async fn healthy_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&server).await;
    server
}

fn infer_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/infer")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn exact_cache_hit_calls_generator_exactly_once() {
    let gpu = healthy_backend().await;
    let cpu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "answer" })))
        .expect(1)
        .mount(&gpu)
        .await;

    let config = test_config(gpu.uri(), cpu.uri(), 20);
    let state = AppState::build(&config, metrics_handle());
    tokio::time::sleep(GPU_WARMUP).await;
    let app = legalroute_router::app(state);

    let body = json!({ "messages": [{ "role": "user", "content": "What is promissory estoppel?" }] });

    let first = app.clone().oneshot(infer_request(body.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_json = json_body(first).await;
    assert_eq!(first_json["cached"], json!(false));

    let second = app.clone().oneshot(infer_request(body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_json = json_body(second).await;
    assert_eq!(second_json["cached"], json!(true));
    assert_eq!(second_json["content"], first_json["content"]);

    gpu.verify().await;
}

#[tokio::test]
async fn caller_override_routes_to_cpu_with_user_preference_reason() {
    let gpu = healthy_backend().await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "should not be called" })))
        .expect(0)
        .mount(&gpu)
        .await;

    let cpu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "cpu answer" })))
        .expect(1)
        .mount(&cpu)
        .await;

    let config = test_config(gpu.uri(), cpu.uri(), 20);
    let state = AppState::build(&config, metrics_handle());
    tokio::time::sleep(GPU_WARMUP).await;
    let app = legalroute_router::app(state);

    let body = json!({
        "messages": [{ "role": "user", "content": "What is the rent?" }],
        "prefer_gpu": false,
        "use_cache": false,
    });

    let response = app.oneshot(infer_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["backend"], json!("cpu"));
    assert_eq!(parsed["fallback_reason"], json!("user_preference"));

    gpu.verify().await;
    cpu.verify().await;
}

#[tokio::test]
async fn fallback_on_capacity_routes_overflow_to_cpu_with_queue_full() {
    let gpu = MockServer::start().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&gpu).await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "gpu answer" })).set_delay(Duration::from_millis(300)))
        .mount(&gpu)
        .await;

    let cpu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "cpu answer" })))
        .mount(&cpu)
        .await;

    let config = test_config(gpu.uri(), cpu.uri(), 1);
    let state = AppState::build(&config, metrics_handle());
    tokio::time::sleep(GPU_WARMUP).await;
    let app = legalroute_router::app(state);

    let body = |q: &str| {
        json!({ "messages": [{ "role": "user", "content": q }], "use_cache": false })
    };

    let app1 = app.clone();
    let app2 = app.clone();
    let first = tokio::spawn(async move { app1.oneshot(infer_request(body("first"))).await.unwrap() });
    // give the first request time to acquire the lone GPU permit before the
    // second one races it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = tokio::spawn(async move { app2.oneshot(infer_request(body("second"))).await.unwrap() });

    let second_response = second.await.unwrap();
    let second_json = json_body(second_response).await;
    assert_eq!(second_json["backend"], json!("cpu"));
    assert_eq!(second_json["fallback_reason"], json!("queue_full"));

    let first_response = first.await.unwrap();
    let first_json = json_body(first_response).await;
    assert_eq!(first_json["backend"], json!("gpu"));
}

#[tokio::test]
async fn breaker_opens_after_failure_threshold_and_routes_to_cpu() {
    let gpu = MockServer::start().await;
    Mock::given(method("GET")).and(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&gpu).await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&gpu)
        .await;

    let cpu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "cpu answer" })))
        .mount(&cpu)
        .await;

    let mut config = test_config(gpu.uri(), cpu.uri(), 20);
    config.circuit_breaker_failure_threshold = 2;
    config.circuit_breaker_cooldown = Duration::from_secs(30);
    let state = AppState::build(&config, metrics_handle());
    tokio::time::sleep(GPU_WARMUP).await;
    let app = legalroute_router::app(state);

    let body = |q: &str| json!({ "messages": [{ "role": "user", "content": q }], "use_cache": false });

    // Two failing GPU attempts (each falls back to CPU with `gpu_error`)
    // open the breaker.
    for i in 0..2 {
        let response = app.clone().oneshot(infer_request(body(&format!("q{i}")))).await.unwrap();
        let parsed = json_body(response).await;
        assert_eq!(parsed["backend"], json!("cpu"));
    }

    // Third request: breaker is open, GPU is never dispatched to.
    let response = app.clone().oneshot(infer_request(body("q2"))).await.unwrap();
    let parsed = json_body(response).await;
    assert_eq!(parsed["backend"], json!("cpu"));
    assert_eq!(parsed["fallback_reason"], json!("circuit_open"));
}

#[tokio::test]
async fn validation_rejects_empty_messages_with_400() {
    let gpu = healthy_backend().await;
    let cpu = MockServer::start().await;
    let config = test_config(gpu.uri(), cpu.uri(), 20);
    let state = AppState::build(&config, metrics_handle());
    let app = legalroute_router::app(state);

    let response = app.oneshot(infer_request(json!({ "messages": [] }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validation_rejects_out_of_range_max_tokens_with_400() {
    let gpu = healthy_backend().await;
    let cpu = MockServer::start().await;
    let config = test_config(gpu.uri(), cpu.uri(), 20);
    let state = AppState::build(&config, metrics_handle());
    let app = legalroute_router::app(state);

    let body = json!({ "messages": [{ "role": "user", "content": "hi" }], "max_tokens": 99999 });
    let response = app.oneshot(infer_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bare_prompt_string_is_accepted_as_a_single_user_message() {
    let gpu = healthy_backend().await;
    Mock::given(method("POST"))
        .and(path("/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "answer" })))
        .expect(1)
        .mount(&gpu)
        .await;
    let cpu = MockServer::start().await;

    let config = test_config(gpu.uri(), cpu.uri(), 20);
    let state = AppState::build(&config, metrics_handle());
    tokio::time::sleep(GPU_WARMUP).await;
    let app = legalroute_router::app(state);

    let body = json!({ "prompt": "What is the statute of limitations?", "use_cache": false });
    let response = app.oneshot(infer_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["content"], json!("answer"));

    gpu.verify().await;
}

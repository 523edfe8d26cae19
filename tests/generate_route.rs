use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use qrcraft::api::{self, AppState};
use qrcraft::config::{GenerationConfig, PollPolicy, ServerConfig};
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn config(api_base: String, token: Option<&str>, timeout: Option<Duration>) -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        api_base,
        api_token: token.map(str::to_string),
        request_timeout: Duration::from_secs(10),
        generation: GenerationConfig::default(),
        poll: PollPolicy {
            interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(40),
            multiplier: 2.0,
            timeout,
        },
    }
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(config: ServerConfig, body: Value) -> (StatusCode, Value) {
    let app = api::router(AppState::new(config));
    let response = app.oneshot(generate_request(body)).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn cat() -> Value {
    json!({"url": "https://example.com", "prompt": "a cat"})
}

#[tokio::test]
async fn succeeded_prediction_returns_output_verbatim() {
    let provider = MockServer::start();
    let create = provider.mock(|when, then| {
        when.method(POST)
            .path("/predictions")
            .header("authorization", "Bearer r8_test");
        then.status(201)
            .json_body(json!({"id": "p1", "status": "starting"}));
    });
    let poll = provider.mock(|when, then| {
        when.method(GET).path("/predictions/p1");
        then.status(200).json_body(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["https://img/1.png"]
        }));
    });

    let (status, body) = call(
        config(provider.base_url(), Some("r8_test"), Some(Duration::from_secs(5))),
        cat(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"imageUrl": ["https://img/1.png"]}));
    create.assert_calls(1);
    poll.assert_calls(1);
}

#[tokio::test]
async fn empty_output_is_still_ok() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "p2", "status": "succeeded", "output": []}));
    });

    let (status, body) = call(config(provider.base_url(), Some("r8_test"), None), cat()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"imageUrl": []}));
}

#[tokio::test]
async fn failed_prediction_hides_provider_detail() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "p3", "status": "processing"}));
    });
    provider.mock(|when, then| {
        when.method(GET).path("/predictions/p3");
        then.status(200).json_body(json!({
            "id": "p3",
            "status": "failed",
            "error": "CUDA out of memory"
        }));
    });

    let (status, body) = call(
        config(provider.base_url(), Some("r8_test"), Some(Duration::from_secs(5))),
        cat(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "generation failed"}));
}

#[tokio::test]
async fn canceled_prediction_counts_as_failed() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "p4", "status": "canceled"}));
    });

    let (status, body) = call(config(provider.base_url(), Some("r8_test"), None), cat()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "generation failed");
}

#[tokio::test]
async fn missing_credential_short_circuits() {
    let provider = MockServer::start();
    let create = provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "p5", "status": "starting"}));
    });

    let (status, body) = call(config(provider.base_url(), None, None), cat()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "missing credential"}));
    create.assert_calls(0);
}

#[tokio::test]
async fn poll_timeout_is_its_own_error() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "slow", "status": "starting"}));
    });
    provider.mock(|when, then| {
        when.method(GET).path("/predictions/slow");
        then.status(200)
            .json_body(json!({"id": "slow", "status": "processing"}));
    });

    let (status, body) = call(
        config(
            provider.base_url(),
            Some("r8_test"),
            Some(Duration::from_millis(100)),
        ),
        cat(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "generation timed out"}));
}

#[tokio::test]
async fn provider_rejection_message_is_forwarded() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(401)
            .body(r#"{"detail":"Invalid token."}"#);
    });

    let (status, body) = call(config(provider.base_url(), Some("bad"), None), cat()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("401"));
    assert!(message.contains("Invalid token."));
}

#[tokio::test]
async fn invalid_input_fails_with_500_before_provider_call() {
    let provider = MockServer::start();
    let create = provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201);
    });

    let (status, body) = call(
        config(provider.base_url(), Some("r8_test"), None),
        json!({"url": "not a url", "prompt": "a cat"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("url"));

    let (status, body) = call(
        config(provider.base_url(), Some("r8_test"), None),
        json!({"url": "https://example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    create.assert_calls(0);
}

#[tokio::test]
async fn network_error_mid_poll_is_forwarded() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "p6", "status": "processing"}));
    });
    provider.mock(|when, then| {
        when.method(GET).path("/predictions/p6");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!({"id": "p6", "status": "succeeded", "output": []}));
    });

    let mut config = config(provider.base_url(), Some("r8_test"), Some(Duration::from_secs(10)));
    config.request_timeout = Duration::from_millis(300);
    let (status, body) = call(config, cat()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to poll prediction p6"), "{message}");
}

#[tokio::test]
async fn undecodable_prediction_is_an_invalid_response() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201)
            .json_body(json!({"id": "p7", "status": "aborted"}));
    });

    let (status, body) = call(config(provider.base_url(), Some("r8_test"), None), cat()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("invalid provider response"), "{message}");
}

#[tokio::test]
async fn prediction_without_id_is_an_invalid_response() {
    let provider = MockServer::start();
    provider.mock(|when, then| {
        when.method(POST).path("/predictions");
        then.status(201).json_body(json!({"status": "starting"}));
    });

    let (status, body) = call(config(provider.base_url(), Some("r8_test"), None), cat()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid provider response"));
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn rejected_input_is_logged() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (status, _) = call(
        config("http://unused".into(), Some("r8_test"), None),
        json!({"url": "https://example.com", "prompt": "  "}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("WARN"), "{output}");
    assert!(output.contains("rejected generate request"), "{output}");
    assert!(output.contains("prompt is required"), "{output}");
}

#[tokio::test]
async fn index_page_is_served() {
    let app = api::router(AppState::new(config("http://unused".into(), None, None)));
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/api/generate"));
}

//! Backend adapters against mocked engine and prediction services.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use gateway_common::{CompletionResponse, FinishReason, GeneratedText};
use inference_gateway::backend::{Backend, BackendTarget};
use inference_gateway::config::{BackendConfig, BackendKind, Config, LocalEngineConfig, LoggingConfig, ManagedConfig, ServerConfig};
use inference_gateway::sampling::SamplingConfig;
use inference_gateway::{app, AppState, Error};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PUBLISHER_PATH: &str =
    "/v1/projects/proj/locations/us-central1/publishers/google/models/text-bison@001:predict";
const ENDPOINT_PATH: &str = "/v1/projects/proj/locations/us-central1/endpoints/555:predict";

fn local_config(base_url: &str) -> Config {
    Config {
        server: ServerConfig::default(),
        logging: LoggingConfig::default(),
        sampling: SamplingConfig::default(),
        backend: BackendConfig {
            kind: BackendKind::Local,
        },
        local: LocalEngineConfig {
            model: Some("facebook/opt-125m".to_string()),
            base_url: base_url.to_string(),
            startup_timeout_secs: 1,
        },
        managed: ManagedConfig::default(),
    }
}

fn managed_config(base_url: &str, endpoint_id: Option<&str>) -> Config {
    Config {
        server: ServerConfig::default(),
        logging: LoggingConfig::default(),
        sampling: SamplingConfig::default(),
        backend: BackendConfig {
            kind: BackendKind::Managed,
        },
        local: LocalEngineConfig::default(),
        managed: ManagedConfig {
            project: Some("proj".to_string()),
            endpoint_id: endpoint_id.map(String::from),
            api_base_url: Some(base_url.to_string()),
            access_token: Some("test-token".to_string()),
            ..ManagedConfig::default()
        },
    }
}

async fn mount_models(server: &MockServer, model: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": model, "object": "model"}]
        })))
        .mount(server)
        .await;
}

async fn connect(config: &Config) -> Backend {
    let target = config.backend_target().unwrap();
    Backend::connect(&target, config).await.unwrap()
}

fn prompts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_local_engine_single_batched_call() {
    let server = MockServer::start().await;
    mount_models(&server, "facebook/opt-125m").await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({
            "model": "facebook/opt-125m",
            "prompt": ["p1", "p2", "p3"],
            "temperature": 0.7,
            "top_p": 0.9,
            "max_tokens": 256,
            "n": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-x",
            "object": "text_completion",
            "choices": [
                {"index": 1, "text": "two", "finish_reason": "length"},
                {"index": 0, "text": "one", "finish_reason": "stop"},
                {"index": 2, "text": "three", "finish_reason": "stop"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = connect(&local_config(&server.uri())).await;
    assert_eq!(backend.id(), "facebook/opt-125m");

    let completions = backend
        .generate(&prompts(&["p1", "p2", "p3"]), &SamplingConfig::default())
        .await
        .unwrap();

    let texts: Vec<String> = completions.iter().map(|c| c.text.to_text()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert_eq!(completions[1].finish_reason, Some(FinishReason::Length));
}

#[tokio::test]
async fn test_local_engine_load_times_out_when_model_missing() {
    let server = MockServer::start().await;
    mount_models(&server, "some/other-model").await;

    let config = local_config(&server.uri());
    let target = config.backend_target().unwrap();
    let result = Backend::connect(&target, &config).await;
    assert!(matches!(result, Err(Error::BackendUnavailable(_))));
}

#[tokio::test]
async fn test_local_engine_rejection_maps_to_502() {
    let server = MockServer::start().await;
    mount_models(&server, "facebook/opt-125m").await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "max_tokens exceeds context length"
        })))
        .mount(&server)
        .await;

    let config = local_config(&server.uri());
    let target = config.backend_target().unwrap();
    let state = Arc::new(AppState::new(config.clone(), target.clone()));
    state.publish(Backend::connect(&target, &config).await.unwrap()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/completions")
        .header("content-type", "application/json")
        .body(Body::from(json!({"prompt": "Hello"}).to_string()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_local_engine_end_to_end_completion() {
    let server = MockServer::start().await;
    mount_models(&server, "facebook/opt-125m").await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({"prompt": ["Hello"], "temperature": 0.7, "top_p": 0.9, "max_tokens": 256})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "text": ", world!", "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = local_config(&server.uri());
    let target = config.backend_target().unwrap();
    let state = Arc::new(AppState::new(config.clone(), target.clone()));
    state.publish(Backend::connect(&target, &config).await.unwrap()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/completions")
        .header("content-type", "application/json")
        .body(Body::from(json!({"prompt": "Hello"}).to_string()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: CompletionResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.choices[0].text, ", world!");
    assert_eq!(body.choices[0].finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn test_managed_publisher_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PUBLISHER_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "instances": [{"prompt": "a"}, {"prompt": "b"}],
            "parameters": {"temperature": 0.7, "topP": 0.9, "maxOutputTokens": 256}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [
                {"content": "from a"},
                {"output": "from b"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = connect(&managed_config(&server.uri(), None)).await;
    assert_eq!(backend.id(), "text-bison@001");

    let completions = backend
        .generate(&prompts(&["a", "b"]), &SamplingConfig::default())
        .await
        .unwrap();
    assert_eq!(completions[0].text, GeneratedText::from("from a"));
    assert_eq!(completions[1].text, GeneratedText::from("from b"));
    assert_eq!(completions[0].finish_reason, Some(FinishReason::Unknown));
}

#[tokio::test]
async fn test_managed_endpoint_ignores_model_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"content": "endpoint says hi"}],
            "deployedModelId": "123"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PUBLISHER_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = managed_config(&server.uri(), Some("555"));
    config.managed.model_id = "text-bison@001".to_string();
    assert!(matches!(
        config.backend_target().unwrap(),
        BackendTarget::Endpoint { .. }
    ));

    let backend = connect(&config).await;
    assert_eq!(backend.id(), "555");
    let completions = backend
        .generate(&prompts(&["hi"]), &SamplingConfig::default())
        .await
        .unwrap();
    assert_eq!(completions[0].text, GeneratedText::from("endpoint says hi"));
}

#[tokio::test]
async fn test_managed_raw_prediction_fallback_via_predict_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PUBLISHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"candidates": [{"text": "nested"}]}]
        })))
        .mount(&server)
        .await;

    let config = managed_config(&server.uri(), None);
    let target = config.backend_target().unwrap();
    let state = Arc::new(AppState::new(config.clone(), target.clone()));
    state.publish(Backend::connect(&target, &config).await.unwrap()).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(json!({"prompt": "hi"}).to_string()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["model"], "text-bison@001");
    assert_eq!(body["response"], json!({"candidates": [{"text": "nested"}]}));
}

#[tokio::test]
async fn test_managed_status_mapping() {
    let cases = [
        (400, StatusCode::BAD_GATEWAY),
        (403, StatusCode::SERVICE_UNAVAILABLE),
        (503, StatusCode::SERVICE_UNAVAILABLE),
    ];

    for (upstream, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PUBLISHER_PATH))
            .respond_with(ResponseTemplate::new(upstream).set_body_json(json!({
                "error": {"code": upstream, "message": "nope"}
            })))
            .mount(&server)
            .await;

        let config = managed_config(&server.uri(), None);
        let target = config.backend_target().unwrap();
        let state = Arc::new(AppState::new(config.clone(), target.clone()));
        state.publish(Backend::connect(&target, &config).await.unwrap()).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(json!({"instances": [{"prompt": "x"}]}).to_string()))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected, "upstream {}", upstream);
    }
}

#[tokio::test]
async fn test_managed_cardinality_mismatch_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PUBLISHER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"content": "only one"}]
        })))
        .mount(&server)
        .await;

    let backend = connect(&managed_config(&server.uri(), None)).await;
    let result = backend
        .generate(&prompts(&["a", "b"]), &SamplingConfig::default())
        .await;
    assert!(matches!(result, Err(Error::Internal(_))));
}

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use creative_prompt_api::{
    ai::{MockChatClient, MockImageGenerationClient},
    app::{App, AppServices},
    error::{AsyncProcessingError, LlmError},
    logs::{self, InMemoryLogStore, LogEntry, LogStore},
    models::{Config, StreamFrame},
    Error, Result,
};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const CURATOR_REPLY: &str = "🌙 Dream Interpretation: The staircase is your ambition.\n\n\
    🌠 Image Prompt: An endless spiral staircase of books under a violet sky\n\n\
    ✨ Micro-story: She kept climbing.";

fn test_config() -> Config {
    tokio_test::assert_ok!(Config::from_lookup(|_| None))
}

fn build_app(
    chat: MockChatClient,
    image: MockImageGenerationClient,
    log_store: Option<Arc<dyn LogStore>>,
) -> Router {
    App::with_services(
        AppServices {
            chat: Arc::new(chat),
            image: Arc::new(image),
            log_store,
        },
        test_config(),
    )
    .router()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Log writes happen in spawned tasks; wait until both halves landed.
async fn wait_for_exchange(store: &InMemoryLogStore, request_id: &str) {
    for _ in 0..100 {
        if store.get(&logs::response_key(request_id)).await.unwrap().is_some()
            && store.get(&logs::request_key(request_id)).await.unwrap().is_some()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("log entries for {} were never written", request_id);
}

struct FailingLogStore;

#[async_trait]
impl LogStore for FailingLogStore {
    async fn put(&self, _entry: LogEntry) -> Result<()> {
        Err(Error::LogStore("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<LogEntry>> {
        Err(Error::LogStore("connection refused".to_string()))
    }

    async fn scan(&self, _prefix: &str) -> Result<Vec<LogEntry>> {
        Err(Error::LogStore("connection refused".to_string()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize> {
        Err(Error::LogStore("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_chat_message_returns_persona_response() {
    let chat = MockChatClient::new().with_response("Self-warming socks powered by dreams.");
    let app = build_app(chat.clone(), MockImageGenerationClient::new(), None);

    let response = app
        .oneshot(post_json(
            "/chat/message",
            json!({ "persona": "inventor", "query": "cold feet" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "response": "Self-warming socks powered by dreams.",
            "persona": "inventor",
            "imageUrl": null
        })
    );
    assert_eq!(chat.get_requests()[0].user_message, "Problem: cold feet");
}

#[tokio::test]
async fn test_chat_message_accepts_prompt_alias() {
    let app = build_app(
        MockChatClient::new().with_response("Translated."),
        MockImageGenerationClient::new(),
        None,
    );

    let response = app
        .oneshot(post_json(
            "/chat/message",
            json!({ "prompt": "translator", "query": "k." }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["persona"], "translator");
}

#[tokio::test]
async fn test_chat_message_unknown_persona_is_bad_request() {
    let chat = MockChatClient::new();
    let app = build_app(chat.clone(), MockImageGenerationClient::new(), None);

    let response = app
        .oneshot(post_json(
            "/chat/message",
            json!({ "persona": "poet", "query": "roses" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["detail"],
        "Persona 'poet' not supported. Available personas: inventor, translator, curator"
    );
    assert_eq!(chat.get_call_count(), 0);
}

#[tokio::test]
async fn test_chat_message_llm_failure_returns_fallback() {
    let app = build_app(
        MockChatClient::new().with_failure(LlmError::Service("upstream down".to_string())),
        MockImageGenerationClient::new(),
        None,
    );

    let response = app
        .oneshot(post_json(
            "/chat/message",
            json!({ "persona": "curator", "query": "I was flying" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["response"],
        "Sorry, I couldn't interpret that dream right now. Please try again later."
    );
    assert_eq!(body["imageUrl"], Value::Null);
}

#[tokio::test]
async fn test_curator_message_includes_image_url() {
    let image = MockImageGenerationClient::new().with_image_url("https://img.test/stairs.png");
    let app = build_app(
        MockChatClient::new().with_response(CURATOR_REPLY),
        image.clone(),
        None,
    );

    let response = app
        .oneshot(post_json(
            "/chat/message",
            json!({ "persona": "curator", "query": "endless stairs" }),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["response"], CURATOR_REPLY);
    assert_eq!(body["imageUrl"], "https://img.test/stairs.png");
    assert_eq!(
        image.get_prompts(),
        vec!["An endless spiral staircase of books under a violet sky".to_string()]
    );
}

#[tokio::test]
async fn test_stream_emits_ndjson_frames_then_error() {
    let chat = MockChatClient::new()
        .with_stream_chunks(&["Hello", " world"])
        .with_stream_error(AsyncProcessingError::ConnectionClosed(
            "connection reset".to_string(),
        ));
    let app = build_app(chat, MockImageGenerationClient::new(), None);

    let response = app
        .oneshot(post_json(
            "/chat/message/stream",
            json!({ "persona": "inventor", "query": "hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let frames: Vec<StreamFrame> = body
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(
        frames,
        vec![
            StreamFrame::Chunk {
                chunk: "Hello".to_string(),
                persona: "inventor".to_string()
            },
            StreamFrame::Chunk {
                chunk: " world".to_string(),
                persona: "inventor".to_string()
            },
            StreamFrame::Error {
                error: "Processing error: Connection closed: connection reset".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_stream_unknown_persona_is_bad_request() {
    let chat = MockChatClient::new();
    let app = build_app(chat.clone(), MockImageGenerationClient::new(), None);

    let response = app
        .oneshot(post_json(
            "/chat/message/stream",
            json!({ "persona": "oracle", "query": "future" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(chat.get_stream_call_count(), 0);
}

#[tokio::test]
async fn test_chat_message_missing_query_renders_detail() {
    let chat = MockChatClient::new();
    let app = build_app(chat.clone(), MockImageGenerationClient::new(), None);

    let response = app
        .oneshot(post_json("/chat/message", json!({ "persona": "inventor" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("query"));
    assert_eq!(chat.get_call_count(), 0);
}

#[tokio::test]
async fn test_stream_malformed_body_renders_detail() {
    let app = build_app(MockChatClient::new(), MockImageGenerationClient::new(), None);

    let request = Request::builder()
        .method("POST")
        .uri("/chat/message/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"persona\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert!(body_json(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_services_lists_every_persona() {
    let app = build_app(MockChatClient::new(), MockImageGenerationClient::new(), None);

    let response = app.oneshot(get("/chat/services")).await.unwrap();

    let body = body_json(response).await;
    assert_eq!(body["services"], json!(["inventor", "translator", "curator"]));
    let details = body["service_details"].as_object().unwrap();
    assert_eq!(details.len(), 3);
    assert_eq!(details["curator"]["name"], "Dream Healer and Curator of Surreal Art");
    assert_eq!(details["inventor"]["temperature"], json!(0.8));
}

#[tokio::test]
async fn test_chat_health_reports_provider_status() {
    let app = build_app(
        MockChatClient::new().with_model("gpt-test"),
        MockImageGenerationClient::new(),
        None,
    );

    let body = body_json(app.oneshot(get("/chat/health")).await.unwrap()).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["llm_provider"]["status"], "healthy");
    assert_eq!(body["llm_provider"]["model"], "gpt-test");
    assert!(body["llm_provider"]["response_time"].is_number());
    assert_eq!(body["service_count"], 3);
}

#[tokio::test]
async fn test_chat_health_reports_unhealthy_provider() {
    let app = build_app(
        MockChatClient::new()
            .with_health_error(LlmError::Authentication("Invalid API key".to_string())),
        MockImageGenerationClient::new(),
        None,
    );

    let body = body_json(app.oneshot(get("/chat/health")).await.unwrap()).await;

    assert_eq!(body["llm_provider"]["status"], "unhealthy");
    assert_eq!(
        body["llm_provider"]["error"],
        "Authentication failed: Invalid API key"
    );
}

#[tokio::test]
async fn test_model_info_includes_app_config() {
    let app = build_app(
        MockChatClient::new().with_model("gpt-test"),
        MockImageGenerationClient::new(),
        None,
    );

    let body = body_json(app.oneshot(get("/chat/model-info")).await.unwrap()).await;

    assert_eq!(body["model_info"]["model"], "gpt-test");
    assert_eq!(body["model_info"]["provider"], "mock");
    assert_eq!(body["config"]["app_name"], "Creative Prompt API");
    assert_eq!(body["config"]["debug"], false);
}

#[tokio::test]
async fn test_root_and_liveness() {
    let app = build_app(MockChatClient::new(), MockImageGenerationClient::new(), None);

    let root = body_json(app.clone().oneshot(get("/")).await.unwrap()).await;
    assert_eq!(root["version"], env!("CARGO_PKG_VERSION"));

    let health = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["timestamp"].is_number());
}

#[tokio::test]
async fn test_logs_round_trip_by_request_id() {
    let store = Arc::new(InMemoryLogStore::new(Duration::from_secs(60)));
    let app = build_app(
        MockChatClient::new().with_response("An umbrella hat."),
        MockImageGenerationClient::new(),
        Some(store.clone()),
    );

    let response = app
        .clone()
        .oneshot(post_json(
            "/chat/message",
            json!({ "persona": "inventor", "query": "rain" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    wait_for_exchange(&store, &request_id).await;

    let response = app
        .oneshot(get(&format!("/logs?request_id={}", request_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["request"]["method"], "POST");
    assert_eq!(body["request"]["path"], "/chat/message");
    assert_eq!(body["request"]["body"]["query"], "rain");
    assert_eq!(body["response"]["status_code"], 200);
    assert_eq!(body["response"]["body"]["response"], "An umbrella hat.");
}

#[tokio::test]
async fn test_logs_unknown_request_id_is_not_found() {
    let store = Arc::new(InMemoryLogStore::new(Duration::from_secs(60)));
    let app = build_app(
        MockChatClient::new(),
        MockImageGenerationClient::new(),
        Some(store),
    );

    let response = app.oneshot(get("/logs?request_id=nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["detail"],
        "No logs found for request ID: nope"
    );
}

#[tokio::test]
async fn test_streamed_responses_are_logged_without_body() {
    let store = Arc::new(InMemoryLogStore::new(Duration::from_secs(60)));
    let app = build_app(
        MockChatClient::new().with_stream_chunks(&["a", "b"]),
        MockImageGenerationClient::new(),
        Some(store.clone()),
    );

    let response = app
        .oneshot(post_json(
            "/chat/message/stream",
            json!({ "persona": "translator", "query": "fine." }),
        ))
        .await
        .unwrap();
    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body.lines().count(), 2);

    wait_for_exchange(&store, &request_id).await;
    match store.get(&logs::response_key(&request_id)).await.unwrap() {
        Some(LogEntry::Response(log)) => assert_eq!(log.body, json!({ "streamed": true })),
        other => panic!("unexpected entry: {:?}", other),
    }
}

#[tokio::test]
async fn test_clear_logs_reports_count() {
    let store = Arc::new(InMemoryLogStore::new(Duration::from_secs(60)));
    let app = build_app(
        MockChatClient::new(),
        MockImageGenerationClient::new(),
        Some(store.clone()),
    );

    let response = app.clone().oneshot(get("/chat/services")).await.unwrap();
    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    wait_for_exchange(&store, &request_id).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let cleared: usize = body["message"]
        .as_str()
        .unwrap()
        .trim_start_matches("Cleared ")
        .trim_end_matches(" log entries")
        .parse()
        .unwrap();
    // The DELETE's own request entry may or may not have landed yet.
    assert!(cleared >= 2);
    assert!(store
        .get(&logs::request_key(&request_id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_logs_disabled_is_unavailable() {
    let app = build_app(MockChatClient::new(), MockImageGenerationClient::new(), None);

    let response = app.oneshot(get("/logs")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get("x-request-id").is_none());
}

#[tokio::test]
async fn test_failing_log_store_does_not_break_requests() {
    let app = build_app(
        MockChatClient::new().with_response("Still works."),
        MockImageGenerationClient::new(),
        Some(Arc::new(FailingLogStore)),
    );

    let response = app
        .oneshot(post_json(
            "/chat/message",
            json!({ "persona": "inventor", "query": "anything" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["response"], "Still works.");
}

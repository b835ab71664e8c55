//! End-to-end tests for the HTTP API.
//!
//! The router is exercised in-process with a scripted completion client, so
//! no network access or API key is needed.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum_test::TestServer;
use open_source_advisor::AppState;
use open_source_advisor::advisor::{AdvisorService, Instructions};
use open_source_advisor::llm::{CompletionClient, Message, UpstreamError};
use open_source_advisor::server::build_router;
use open_source_advisor::session::SessionStore;
use serde_json::{Value, json};
use tower::ServiceExt;

const INSTRUCTIONS: &str = "You recommend open-source alternatives.";

/// How the test client should behave.
#[derive(Clone, Copy)]
enum Mode {
    Answer,
    Fail,
    Panic,
}

struct TestClient {
    mode: Mode,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl TestClient {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> Vec<Message> {
        self.prompts.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl CompletionClient for TestClient {
    async fn complete(&self, prompt: &[Message]) -> Result<String, UpstreamError> {
        self.prompts.lock().unwrap().push(prompt.to_vec());
        match self.mode {
            Mode::Answer => Ok("LibreOffice is a mature open-source office suite.".to_string()),
            Mode::Fail => Err(UpstreamError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            }),
            Mode::Panic => panic!("completion client exploded"),
        }
    }
}

fn app_with(client: Arc<TestClient>, cors_origins: &[String]) -> axum::Router {
    let advisor = Arc::new(AdvisorService::new(
        SessionStore::new(),
        Instructions::new(INSTRUCTIONS),
        client,
    ));
    build_router(AppState { advisor }, cors_origins)
}

fn server_with(client: Arc<TestClient>) -> TestServer {
    TestServer::new(app_with(client, &[])).unwrap()
}

#[tokio::test]
async fn test_index_describes_endpoints() {
    let server = server_with(TestClient::new(Mode::Answer));

    let response = server.get("/").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "MiniMind Open Source Advisor API");
    assert_eq!(body["docs"], "/docs");
    assert_eq!(body["endpoints"]["chat"], "POST /chat");

    let docs = server.get("/docs").await;
    docs.assert_status_ok();
    assert!(docs.json::<Value>()["routes"].as_array().unwrap().len() >= 5);
}

#[tokio::test]
async fn test_chat_then_sessions_lists_id() {
    let server = server_with(TestClient::new(Mode::Answer));

    let response = server
        .post("/chat")
        .json(&json!({
            "question": "What is a good open-source alternative to Office?",
            "session_id": "s1"
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["session_id"], "s1");
    assert!(!body["answer"].as_str().unwrap().is_empty());

    let sessions: Value = server.get("/sessions").await.json();
    assert_eq!(sessions, json!({ "sessions": ["s1"] }));
}

#[tokio::test]
async fn test_chat_defaults_session_id() {
    let server = server_with(TestClient::new(Mode::Answer));

    let body: Value = server
        .post("/chat")
        .json(&json!({ "question": "Is Linux free?" }))
        .await
        .json();
    assert_eq!(body["session_id"], "default");

    let null_id: Value = server
        .post("/chat")
        .json(&json!({ "question": "And GnuCash?", "session_id": null }))
        .await
        .json();
    assert_eq!(null_id["session_id"], "default");
}

#[tokio::test]
async fn test_empty_session_id_is_its_own_session() {
    let client = TestClient::new(Mode::Answer);
    let server = server_with(Arc::clone(&client));

    server
        .post("/chat")
        .json(&json!({ "question": "Is Linux free?" }))
        .await
        .assert_status_ok();

    let body: Value = server
        .post("/chat")
        .json(&json!({ "question": "What about Element?", "session_id": "" }))
        .await
        .json();
    assert_eq!(body["session_id"], "");
    assert_eq!(client.last_prompt().len(), 2);

    let sessions: Value = server.get("/sessions").await.json();
    assert_eq!(sessions, json!({ "sessions": ["", "default"] }));
}

#[tokio::test]
async fn test_clear_history_resets_prompt() {
    let client = TestClient::new(Mode::Answer);
    let server = server_with(Arc::clone(&client));

    server
        .post("/chat")
        .json(&json!({ "question": "Tell me about Moodle", "session_id": "s1" }))
        .await
        .assert_status_ok();

    let cleared = server.delete("/history/s1").await;
    cleared.assert_status_ok();
    assert_eq!(
        cleared.json::<Value>(),
        json!({ "message": "History cleared for session: s1" })
    );

    server
        .post("/chat")
        .json(&json!({ "question": "And Jitsi?", "session_id": "s1" }))
        .await
        .assert_status_ok();

    assert_eq!(
        client.last_prompt(),
        vec![Message::system(INSTRUCTIONS), Message::user("And Jitsi?")]
    );
}

#[tokio::test]
async fn test_clear_unknown_session_succeeds() {
    let server = server_with(TestClient::new(Mode::Answer));

    let response = server.delete("/history/nobody").await;
    response.assert_status_ok();

    let sessions: Value = server.get("/sessions").await.json();
    assert_eq!(sessions, json!({ "sessions": [] }));
}

#[tokio::test]
async fn test_session_history_endpoint() {
    let server = server_with(TestClient::new(Mode::Answer));

    server
        .post("/chat")
        .json(&json!({ "question": "What is ClamAV?", "session_id": "av" }))
        .await
        .assert_status_ok();

    let body: Value = server.get("/sessions/av").await.json();
    assert_eq!(body["session_id"], "av");
    assert_eq!(body["messages"][0], json!({"role": "user", "content": "What is ClamAV?"}));
    assert_eq!(body["messages"][1]["role"], "assistant");

    let missing = server.get("/sessions/ghost").expect_failure().await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(missing.json::<Value>()["detail"], "Session not found: ghost");
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway_and_not_recorded() {
    let server = server_with(TestClient::new(Mode::Fail));

    let response = server
        .post("/chat")
        .json(&json!({ "question": "What is pfSense?", "session_id": "fw" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let detail = response.json::<Value>()["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Error processing question: "));
    assert!(detail.contains("invalid api key"));

    let history: Value = server.get("/sessions/fw").await.json();
    assert_eq!(history["messages"], json!([]));
}

#[tokio::test]
async fn test_invalid_bodies_are_client_errors() {
    let server = server_with(TestClient::new(Mode::Answer));

    let missing_field = server
        .post("/chat")
        .json(&json!({ "session_id": "s1" }))
        .expect_failure()
        .await;
    missing_field.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(missing_field.json::<Value>()["detail"].is_string());

    let sessions: Value = server.get("/sessions").await.json();
    assert_eq!(sessions, json!({ "sessions": [] }));
}

#[tokio::test]
async fn test_empty_question_is_answered() {
    let client = TestClient::new(Mode::Answer);
    let server = server_with(Arc::clone(&client));

    let response = server
        .post("/chat")
        .json(&json!({ "question": "", "session_id": "s" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["session_id"], "s");
    assert!(!body["answer"].as_str().unwrap().is_empty());

    let prompt = client.last_prompt();
    assert_eq!(prompt.last().map(|m| m.content.as_str()), Some(""));
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let server = server_with(TestClient::new(Mode::Panic));

    let response = server
        .post("/chat")
        .json(&json!({ "question": "Anything?" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>()["detail"],
        "completion client exploded"
    );

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_health_ignores_upstream_state() {
    for mode in [Mode::Answer, Mode::Fail] {
        let server = server_with(TestClient::new(mode));
        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "status": "healthy" }));
    }
}

#[tokio::test]
async fn test_cors_preflight_mirrors_origin_with_credentials() {
    let app = app_with(TestClient::new(Mode::Answer), &[]);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/chat")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
}

#[tokio::test]
async fn test_cors_origin_list_restricts() {
    let app = app_with(
        TestClient::new(Mode::Answer),
        &["https://advisor.example".to_string()],
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

//! HTTP tests: the router is bound to an ephemeral port and driven with reqwest.

mod common;

use std::sync::Arc;

use common::*;
use lexrag::server::build_router;
use lexrag::service::ServiceContext;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;

struct TestServer {
    base: String,
    service: Arc<ServiceContext>,
    _tmp: TempDir,
}

async fn start(fixture: &Fixture, tweak: impl FnOnce(&mut lexrag::config::Config)) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    tweak(&mut config);
    let service = Arc::new(ServiceContext::new(
        config,
        fixture.capabilities(),
        Default::default(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(Arc::clone(&service));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        service,
        _tmp: tmp,
    }
}

async fn seeded(fixture: &Fixture) -> TestServer {
    let server = start(fixture, |_| {}).await;
    server
        .service
        .ingest(&text_upload("acts.txt", &three_topic_document()))
        .await
        .unwrap();
    server
}

#[tokio::test]
async fn json_query_answers_from_corpus() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = seeded(&fixture).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .json(&serde_json::json!({
            "question": "what is the punishment for theft",
            "legal_area": "Criminal Law"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "Dataset");
    let answer = body["ai_answer"].as_str().unwrap();
    assert!(answer.contains("theft is punishable under section 379"));
    assert!(answer.contains("Legal area: Criminal Law"));
}

#[tokio::test]
async fn multipart_query_with_prior_question() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = seeded(&fixture).await;

    let form = Form::new()
        .text("question", "when are wages due")
        .text("history_pq", "what is a contract")
        .text("selected_language", "Marathi");
    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "Dataset");
    let answer = body["ai_answer"].as_str().unwrap();
    assert!(answer.contains("wages must be paid by the seventh day"));
    assert!(answer.contains("Previous question: what is a contract"));
    assert!(answer.contains("Answer (in Marathi)"));
}

#[tokio::test]
async fn multipart_upload_without_question_is_analysed() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let file = Part::bytes(b"The tenant shall pay rent monthly.".to_vec())
        .file_name("lease.txt")
        .mime_str("text/plain")
        .unwrap();
    let form = Form::new().text("question", "").part("file", file);
    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "AI Analysis");
    assert!(body["ai_answer"]
        .as_str()
        .unwrap()
        .contains("The tenant shall pay rent monthly."));
    assert_eq!(server.service.chunk_count(), 1);
}

#[tokio::test]
async fn escalated_answer_is_labelled_internet() {
    let fixture = Fixture::new(
        FakeGenerator::replying("Unclear."),
        FakeWebSearch::returning(Some("Theft is covered by Section 378.")),
    );
    let server = seeded(&fixture).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .json(&serde_json::json!({ "question": "what is theft" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["source"], "Internet");
    assert!(body["ai_answer"]
        .as_str()
        .unwrap()
        .contains("Theft is covered by Section 378."));
}

#[tokio::test]
async fn missing_boundary_is_a_client_error() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .header("content-type", "multipart/form-data")
        .body("irrelevant")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "missing_boundary");
}

#[tokio::test]
async fn invalid_json_is_a_client_error() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .header("content-type", "application/json")
        .body("{\"question\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_json");
}

#[tokio::test]
async fn missing_question_is_a_client_error() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .json(&serde_json::json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "missing_question");
}

#[tokio::test]
async fn unsupported_upload_type_is_rejected() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let file = Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name("scan.png")
        .mime_str("image/png")
        .unwrap();
    let form = Form::new().part("file", file);
    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unsupported_format");
    assert_eq!(server.service.chunk_count(), 0);
}

#[tokio::test]
async fn no_fallback_data_is_a_gateway_error() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .json(&serde_json::json!({ "question": "what is theft" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "no_fallback_data");

    // The server keeps serving after a failed request.
    let health = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |c| c.server.max_upload_bytes = 1024).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .header("content-type", "application/json")
        .body(vec![b' '; 8 * 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/query", server.base))
        .header("origin", "https://example.org")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
    let methods = resp.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    let headers = resp.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(headers.contains("content-type"));
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn cors_headers_on_answers_and_errors() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = seeded(&fixture).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query", server.base))
        .header("origin", "https://example.org")
        .json(&serde_json::json!({ "question": "what is the punishment for theft" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );

    let resp = client
        .post(format!("{}/query", server.base))
        .header("origin", "https://example.org")
        .json(&serde_json::json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "missing_question");
}

#[tokio::test]
async fn custom_query_path_is_served() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(Some("web")));
    let server = start(&fixture, |c| c.server.path = "/api/ask".to_string()).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/ask", server.base))
        .json(&serde_json::json!({ "question": "what is theft" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{}/query", server.base))
        .json(&serde_json::json!({ "question": "what is theft" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_chunk_count() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = seeded(&fixture).await;

    let resp = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunks"], 3);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let fixture = Fixture::new(FakeGenerator::echo(), FakeWebSearch::returning(None));
    let server = start(&fixture, |_| {}).await;

    let resp = reqwest::get(format!("{}/nowhere", server.base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

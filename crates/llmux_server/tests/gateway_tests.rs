/* Copyright 2023- The Binedge, Lda team. All rights reserved.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *     http://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! End-to-end tests for the gateway HTTP surface.
//!
//! Every test installs the same settings fixture into the shared cache, so
//! tests can run concurrently within one process. The streaming test runs
//! against a stub upstream bound to a loopback port that answers in the
//! runner's JSON-lines framing.

use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue};
use axum::routing::post;
use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use llmux_cerebras::CerebrasProvider;
use llmux_core::provider::Provider;
use llmux_core::settings::{Settings, SETTINGS};
use llmux_custom::CustomProvider;
use llmux_ollama::client::OllamaClient;
use llmux_ollama::OllamaProvider;
use llmux_server::{build_router, ProviderRegistry};

fn fixture_settings() -> Settings {
    let mut settings = Settings::default();
    settings.allowed_api_keys = vec!["test-key".to_string()];
    settings
}

async fn init_settings() {
    SETTINGS.write().await.init_with(fixture_settings());
}

async fn gateway(ollama_base: Option<String>) -> TestServer {
    init_settings().await;

    let settings = fixture_settings();
    let ollama: Arc<dyn Provider> = match ollama_base {
        Some(base) => Arc::new(OllamaProvider::with_client(OllamaClient::new(
            base,
            settings.timeout(),
        ))),
        None => Arc::new(OllamaProvider::from_settings(&settings)),
    };

    let registry = ProviderRegistry::new(
        Arc::new(CustomProvider::new()),
        ollama,
        Arc::new(CerebrasProvider::from_settings(&settings)),
    );

    TestServer::new(build_router(&registry, &settings)).expect("cannot instantiate TestServer")
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn chat_body() -> Value {
    json!({
        "model": "m",
        "messages": [{"role": "user", "content": "hi"}]
    })
}

/// Spawn a stub model runner that answers `/api/chat` with three content
/// records and a terminal record, one JSON object per line.
async fn spawn_stub_runner() -> String {
    async fn chat() -> ([(HeaderName, HeaderValue); 1], &'static str) {
        (
            [(
                HeaderName::from_static("content-type"),
                HeaderValue::from_static("application/x-ndjson"),
            )],
            concat!(
                "{\"message\":{\"content\":\"x\"},\"done\":false}\n",
                "{\"message\":{\"content\":\"x\"},\"done\":false}\n",
                "{\"message\":{\"content\":\"x\"},\"done\":false}\n",
                "{\"done\":true,\"done_reason\":\"stop\"}\n",
            ),
        )
    }

    let router = Router::new().route("/api/chat", post(chat));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("cannot bind stub runner");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn health_is_unauthenticated_and_correlated() {
    let server = gateway(None).await;

    let response = server.get("/healthz").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");

    // The correlation header resolves under either casing.
    let headers = response.headers();
    assert!(headers.get("x-request-id").is_some());
    assert!(headers.get("X-Request-Id").is_some());
}

#[tokio::test]
async fn wrong_auth_scheme_is_rejected_with_envelope() {
    let server = gateway(None).await;

    let response = server
        .post("/v1/chat/completions")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_static("Basic abc"),
        )
        .json(&chat_body())
        .await;

    response.assert_status_unauthorized();

    let headers = response.headers();
    assert_eq!(headers.get("www-authenticate").unwrap(), "Bearer");
    assert!(headers.get("x-request-id").is_some());

    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "auth_error");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn missing_and_unknown_tokens_are_rejected() {
    let server = gateway(None).await;

    let response = server.post("/v1/chat/completions").json(&chat_body()).await;
    response.assert_status_unauthorized();

    let (name, _) = bearer("test-key");
    let response = server
        .post("/v1/chat/completions")
        .add_header(name, HeaderValue::from_static("Bearer wrong-key"))
        .json(&chat_body())
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn unary_chat_on_custom_provider_succeeds() {
    let server = gateway(None).await;

    let (name, value) = bearer("test-key");
    let response = server
        .post("/v1/chat/completions")
        .add_header(name, value)
        .json(&chat_body())
        .await;

    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["object"], "chat.completion");
    assert!(body["created"].as_i64().unwrap() > 0);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert!(body["usage"]["prompt_tokens"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn stream_on_non_streaming_provider_is_501() {
    let server = gateway(None).await;

    let mut body = chat_body();
    body["stream"] = json!(true);

    let (name, value) = bearer("test-key");
    let response = server
        .post("/cerebras/v1/chat/completions")
        .add_header(name, value)
        .json(&body)
        .await;

    response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);

    let envelope: Value = response.json();
    assert_eq!(envelope["error"]["type"], "not_implemented");
}

#[tokio::test]
async fn streaming_chat_through_the_local_runner() {
    let upstream = spawn_stub_runner().await;
    let server = gateway(Some(upstream)).await;

    let mut body = chat_body();
    body["stream"] = json!(true);

    let (name, value) = bearer("test-key");
    let response = server
        .post("/ollama/v1/chat/completions")
        .add_header(name, value)
        .json(&body)
        .await;

    response.assert_status_ok();

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "text/event-stream");
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    assert!(headers.get("x-request-id").is_some());

    let text = response.text();
    assert!(text.ends_with("data: [DONE]\n\n"));

    let chunks: Vec<Value> = text
        .split("\n\n")
        .filter_map(|event| event.strip_prefix("data: "))
        .filter(|payload| *payload != "[DONE]")
        .map(|payload| serde_json::from_str(payload).unwrap())
        .collect();

    assert_eq!(chunks.len(), 4);

    let id = chunks[0]["id"].as_str().unwrap();
    assert!(id.starts_with("chatcmpl-"));
    for chunk in &chunks {
        assert_eq!(chunk["id"], id, "chunk ids must be stream-constant");
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["created"], chunks[0]["created"]);
    }

    for chunk in &chunks[..3] {
        assert_eq!(chunk["choices"][0]["delta"]["content"], "x");
        assert_eq!(chunk["choices"][0]["finish_reason"], Value::Null);
    }

    let last = &chunks[3];
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert!(last["choices"][0]["delta"].get("content").is_none());
}

#[tokio::test]
async fn embeddings_without_model_fail_validation() {
    let server = gateway(None).await;

    let (name, value) = bearer("test-key");
    let response = server
        .post("/v1/embeddings")
        .add_header(name, value)
        .json(&json!({"input": "hello"}))
        .await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let envelope: Value = response.json();
    assert_eq!(envelope["error"]["type"], "validation_error");
}

#[tokio::test]
async fn embeddings_on_custom_provider_respect_dimensions() {
    let server = gateway(None).await;

    let (name, value) = bearer("test-key");
    let response = server
        .post("/v1/embeddings")
        .add_header(name, value)
        .json(&json!({"model": "m", "input": ["a", "b"], "dimensions": 4}))
        .await;

    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["embedding"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"][1]["index"], 1);
}

#[tokio::test]
async fn chat_without_messages_fails_validation() {
    let server = gateway(None).await;

    let (name, value) = bearer("test-key");
    let response = server
        .post("/v1/chat/completions")
        .add_header(name, value)
        .json(&json!({"model": "m", "messages": []}))
        .await;

    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_namespace_is_404_with_envelope() {
    let server = gateway(None).await;

    let response = server.get("/nonsense/v1/models").await;
    response.assert_status_not_found();

    let envelope: Value = response.json();
    assert_eq!(envelope["error"]["type"], "not_found");
}

#[tokio::test]
async fn models_are_served_per_namespace() {
    let server = gateway(None).await;

    let (name, value) = bearer("test-key");
    let response = server
        .get("/v1/models")
        .add_header(name, value)
        .await;

    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["object"], "list");
    assert!(!body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["data"][0]["object"], "model");
}

#[tokio::test]
async fn supplied_correlation_id_is_echoed() {
    let server = gateway(None).await;

    let response = server
        .get("/healthz")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("caller-chosen-id"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "caller-chosen-id"
    );
}

#[tokio::test]
async fn security_headers_are_attached() {
    let server = gateway(None).await;

    let response = server.get("/healthz").await;
    let headers = response.headers();

    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("permissions-policy").unwrap(), "()");
}

#[tokio::test]
async fn cors_is_allowlist_gated() {
    init_settings().await;

    let mut settings = fixture_settings();
    settings.enable_cors = true;
    settings.cors.allow_origins = vec!["https://app.test".to_string()];

    let registry = ProviderRegistry::new(
        Arc::new(CustomProvider::new()),
        Arc::new(OllamaProvider::from_settings(&settings)),
        Arc::new(CerebrasProvider::from_settings(&settings)),
    );
    let server =
        TestServer::new(build_router(&registry, &settings)).expect("cannot instantiate TestServer");

    let allowed = server
        .get("/healthz")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://app.test"),
        )
        .await;
    allowed.assert_status_ok();
    assert_eq!(
        allowed
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://app.test"
    );

    // Unlisted origins get no CORS grant at all.
    let denied = server
        .get("/healthz")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("https://evil.test"),
        )
        .await;
    denied.assert_status_ok();
    assert!(denied
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn upstream_http_errors_become_502() {
    // A stub runner that always answers 500; explicit HTTP errors are never
    // masked by the localhost fallback.
    async fn broken() -> axum::http::StatusCode {
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    }

    let router = Router::new().route("/api/chat", post(broken));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let server = gateway(Some(format!("http://{addr}"))).await;

    let (name, value) = bearer("test-key");
    let response = server
        .post("/ollama/v1/chat/completions")
        .add_header(name, value)
        .json(&chat_body())
        .await;

    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);

    let envelope: Value = response.json();
    assert_eq!(envelope["error"]["type"], "provider_error");
    // Raw upstream detail stays out of the public payload.
    assert!(!envelope["error"]["message"]
        .as_str()
        .unwrap()
        .contains(&addr.to_string()));
}

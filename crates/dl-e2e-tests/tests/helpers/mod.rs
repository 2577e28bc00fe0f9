//! Shared test harness for E2E integration tests.
//!
//! Wires the real orchestrator, the real OpenAI-compatible client (pointed at
//! a wiremock server), and an in-memory SQLite driving log.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dl_pipeline::inference::{ImageSource, InferenceConfig, OpenAiVisionClient};
use dl_pipeline::orchestrator::{Orchestrator, OrchestratorConfig, RunRequest};
use dl_store::SqliteRecordStore;

/// End-to-end harness: mock inference provider + SQLite + orchestrator.
pub struct TestHarness {
    /// Mock Chat Completions endpoint.
    pub server: MockServer,
    /// Driving log backing the orchestrator.
    pub store: Arc<SqliteRecordStore>,
    /// Orchestrator under test.
    pub orchestrator: Arc<Orchestrator>,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(OrchestratorConfig::default(), 5).await
    }

    pub async fn with_config(config: OrchestratorConfig, timeout_secs: u64) -> Self {
        let server = MockServer::start().await;
        let client = OpenAiVisionClient::new(InferenceConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            timeout_secs,
            ..InferenceConfig::default()
        })
        .unwrap();
        let store = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(client), store.clone(), config));

        Self {
            server,
            store,
            orchestrator,
        }
    }

    /// Respond to every chat request with `content` as the assistant message.
    pub async fn reply_with(&self, content: &str) {
        self.respond(ResponseTemplate::new(200).set_body_json(chat_response(content)))
            .await;
    }

    /// Respond with `content` after `delay`.
    pub async fn reply_slowly(&self, content: &str, delay: Duration) {
        self.respond(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(content))
                .set_delay(delay),
        )
        .await;
    }

    /// Respond with an HTTP error.
    pub async fn fail_with(&self, status: u16, body: &str) {
        self.respond(ResponseTemplate::new(status).set_body_string(body))
            .await;
    }

    async fn respond(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Prompt text of every request the provider received, in order.
    pub async fn sent_prompts(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|req| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                body["messages"][0]["content"][0]["text"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
    }
}

/// Build a Chat Completions response body.
pub fn chat_response(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-e2e",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// A tiny JPEG-looking payload.
pub fn scene() -> RunRequest {
    RunRequest::new(ImageSource::Bytes(vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]))
}

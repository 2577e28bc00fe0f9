//! Vision-language inference client (OpenAI-compatible Chat Completions).
//!
//! Sends the prompt plus the scene image and returns the model's raw text.
//! The image always travels as a `data:image/jpeg;base64,...` URL, whatever
//! its real encoding.

use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Mime type written into every image data URL.
pub const IMAGE_MIME: &str = "image/jpeg";

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

/// Scene image handed to the inference service.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    pub async fn load(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match self {
            Self::Path(path) => tokio::fs::read(path).await.map(Cow::Owned),
            Self::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        }
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Path(path) => Some(path.as_path()),
            Self::Bytes(_) => None,
        }
    }
}

/// Encode image bytes as the data URL the chat API expects.
pub fn image_data_url(bytes: &[u8]) -> String {
    format!("data:{IMAGE_MIME};base64,{}", BASE64.encode(bytes))
}

/// External service that turns an image and a prompt into free text.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn infer(&self, image: &ImageSource, prompt: &str) -> Result<String, InferenceError>;

    /// Model or provider name (for logging).
    fn model_name(&self) -> &str;
}

/// Configuration for the Chat Completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Vision-capable model.
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token. Falls back to `OPENAI_API_KEY` when loaded from file.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Completion length cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tokens() -> u32 {
    300
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// Chat Completions response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible vision chat endpoint.
pub struct OpenAiVisionClient {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl OpenAiVisionClient {
    pub fn new(config: InferenceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    fn classify(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else if e.is_decode() || e.is_body() {
            InferenceError::Provider(e.to_string())
        } else {
            InferenceError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl InferenceService for OpenAiVisionClient {
    async fn infer(&self, image: &ImageSource, prompt: &str) -> Result<String, InferenceError> {
        let bytes = image.load().await?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_url(&bytes),
                        },
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.chars().take(MAX_ERROR_BODY).collect();
            tracing::warn!(status = %status, "inference provider returned non-200");
            return Err(match status.as_u16() {
                401 | 403 => InferenceError::Auth {
                    status: status.as_u16(),
                    body: text,
                },
                429 => InferenceError::Quota(text),
                code => InferenceError::Provider(format!("HTTP {code}: {text}")),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| self.classify(e))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| InferenceError::Provider("response contained no message content".into()))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_protocol::InferenceFailureKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn client_for(server: &MockServer, timeout_secs: u64) -> OpenAiVisionClient {
        client_at(server.uri(), timeout_secs)
    }

    fn client_at(base_url: String, timeout_secs: u64) -> OpenAiVisionClient {
        OpenAiVisionClient::new(InferenceConfig {
            base_url,
            model: "gpt-4o-mini".into(),
            api_key: Some("test-key".into()),
            timeout_secs,
            max_tokens: 300,
        })
        .unwrap()
    }

    fn png_bytes() -> ImageSource {
        ImageSource::Bytes(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a])
    }

    async fn mount(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn infer_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(
                serde_json::json!({"model": "gpt-4o-mini", "max_tokens": 300}),
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response(r#"{"strategy":"slow","reason":"rain"}"#)),
            )
            .mount(&server)
            .await;

        let reply = client_for(&server, 5)
            .infer(&png_bytes(), "prompt text")
            .await
            .unwrap();
        assert_eq!(reply, r#"{"strategy":"slow","reason":"rain"}"#);
    }

    #[tokio::test]
    async fn request_carries_prompt_and_jpeg_data_url() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(chat_response("ok")),
        )
        .await;

        let image = png_bytes();
        client_for(&server, 5)
            .infer(&image, "도로 상황을 분석하세요")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "도로 상황을 분석하세요");
        assert_eq!(content[1]["type"], "image_url");

        // PNG bytes still go out labeled as JPEG.
        let url = content[1]["image_url"]["url"].as_str().unwrap();
        let encoded = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let ImageSource::Bytes(original) = image else {
            unreachable!()
        };
        assert_eq!(BASE64.decode(encoded).unwrap(), original);
    }

    #[tokio::test]
    async fn unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"Incorrect API key"}}"#),
        )
        .await;

        let err = client_for(&server, 5)
            .infer(&png_bytes(), "p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Auth);
        assert!(err.to_string().contains("Incorrect API key"));
    }

    #[tokio::test]
    async fn rate_limited_is_quota_error() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(429).set_body_string("slow down")).await;

        let err = client_for(&server, 5)
            .infer(&png_bytes(), "p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Quota);
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(503).set_body_string("overloaded")).await;

        let err = client_for(&server, 5)
            .infer(&png_bytes(), "p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Provider);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn empty_choices_is_provider_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
        )
        .await;

        let err = client_for(&server, 5)
            .infer(&png_bytes(), "p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Provider);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(chat_response("late"))
                .set_delay(Duration::from_secs(5)),
        )
        .await;

        // Client timeout is 1s, mock delays 5s → timeout
        let err = client_for(&server, 1)
            .infer(&png_bytes(), "p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Timeout);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        // Nothing listens on port 1.
        let client = client_at("http://127.0.0.1:1".into(), 2);

        let err = client.infer(&png_bytes(), "p").await.unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Network);
    }

    #[tokio::test]
    async fn missing_image_file_is_image_error() {
        let server = MockServer::start().await;
        let image = ImageSource::Path("/nonexistent/scene.jpg".into());

        let err = client_for(&server, 2).infer(&image, "p").await.unwrap_err();
        assert_eq!(err.kind(), InferenceFailureKind::Image);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_loads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scene.jpg");
        tokio::fs::write(&file, b"jpeg-bytes").await.unwrap();

        let image = ImageSource::Path(file);
        assert_eq!(image.load().await.unwrap().as_ref(), b"jpeg-bytes");
        assert!(image.path().is_some());
    }

    #[test]
    fn config_defaults() {
        let config = InferenceConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_tokens, 300);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn data_url_is_always_jpeg() {
        assert_eq!(image_data_url(b"abc"), "data:image/jpeg;base64,YWJj");
    }
}

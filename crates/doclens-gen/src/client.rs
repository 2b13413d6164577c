//! OpenAI-compatible generation client.
//!
//! Talks to the Responses API of OpenAI or any compatible endpoint:
//!
//! - POST `{base_url}/responses`
//! - Request: `{"model": "...", "input": "..."}`
//! - Response: `{"output": [{"content": [{"type": "output_text", "text": "..."}]}]}`
//!
//! All `output_text` parts of the reply are concatenated into the generated
//! string. Non-message output items (reasoning traces and the like) carry no
//! content parts and are skipped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};
use crate::generator::Generator;

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Default timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default max retries
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Configuration for the OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// API key (optional for self-hosted endpoints)
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl OpenAiConfig {
    /// Create config for the hosted OpenAI API
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create config from environment variables
    ///
    /// - `DOCLENS_OPENAI_BASE_URL` - API base URL (default: https://api.openai.com/v1)
    /// - `DOCLENS_OPENAI_API_KEY` - API key, falling back to `OPENAI_API_KEY`
    /// - `DOCLENS_OPENAI_MODEL` - model name (default: gpt-5-nano)
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("DOCLENS_OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let api_key = std::env::var("DOCLENS_OPENAI_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        let model =
            std::env::var("DOCLENS_OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        Self {
            base_url,
            api_key,
            model,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Request body for the Responses endpoint
#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: String,
}

/// Reply from the Responses endpoint
#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

/// One output item; reasoning items carry no content
#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

/// One content part of a message output item
#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    part_type: String,
    #[serde(default)]
    text: String,
}

/// Client for OpenAI-compatible Responses endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenError::Unavailable(format!("HTTP client error: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Create a client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    /// Get the responses endpoint URL
    fn responses_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        // Handle both /v1 and non-/v1 URLs
        if base.ends_with("/v1") {
            format!("{}/responses", base)
        } else {
            format!("{}/v1/responses", base)
        }
    }

    /// Send the request with retry logic
    async fn request_with_retry(&self, input: &str) -> Result<String> {
        let mut last_error = None;
        let mut retry_delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 0..=self.config.max_retries {
            match self.send_request(input).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    // Don't retry on auth errors, unknown models, or
                    // malformed replies
                    if matches!(
                        e,
                        GenError::Auth(_) | GenError::InvalidModel(_) | GenError::InvalidResponse(_)
                    ) {
                        return Err(e);
                    }

                    if attempt < self.config.max_retries {
                        if let GenError::RateLimited {
                            retry_after: Some(secs),
                        } = e
                        {
                            retry_delay = Duration::from_secs(secs);
                        }
                        tokio::time::sleep(retry_delay).await;
                        retry_delay *= 2;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenError::Unavailable("Request failed after retries".into())))
    }

    /// Send a single request to the endpoint
    async fn send_request(&self, input: &str) -> Result<String> {
        let url = self.responses_url();
        let request_body = ResponsesRequest {
            model: self.config.model.clone(),
            input: input.to_string(),
        };

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body);

        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GenError::Unavailable("Request timed out".into())
            } else if e.is_connect() {
                GenError::Unavailable(format!("Connection failed: {}", e))
            } else {
                GenError::Unavailable(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();

        match status {
            StatusCode::OK => {
                let reply: ResponsesReply = response
                    .json()
                    .await
                    .map_err(|e| GenError::InvalidResponse(format!("Invalid reply body: {}", e)))?;
                let text = output_text(reply);
                if text.trim().is_empty() {
                    return Err(GenError::InvalidResponse("Reply carried no output text".into()));
                }
                Ok(text)
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(GenError::Auth(format!("Authentication failed: {}", body)))
            }
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                Err(GenError::InvalidModel(format!("Model not found: {}", body)))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(GenError::RateLimited { retry_after })
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => Err(
                GenError::Unavailable("Service temporarily unavailable".into()),
            ),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(GenError::Unavailable(format!(
                    "Request failed with status {}: {}",
                    status, body
                )))
            }
        }
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.request_with_retry(prompt).await
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout_secs", &self.config.timeout_secs)
            .field("max_retries", &self.config.max_retries)
            .finish()
    }
}

/// Concatenate the `output_text` parts of a reply.
fn output_text(reply: ResponsesReply) -> String {
    let mut text = String::new();
    for item in reply.output {
        for part in item.content {
            if part.part_type == "output_text" {
                text.push_str(&part.text);
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Create a mock Responses reply, with a reasoning item in front of the
    /// message like the hosted API emits
    fn mock_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "resp_1",
            "model": "test-model",
            "output": [
                {"type": "reasoning", "summary": []},
                {
                    "type": "message",
                    "content": [{"type": "output_text", "text": text}]
                }
            ]
        })
    }

    fn test_config(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(&ResponsesRequest {
                model: "test-model".into(),
                input: "Write docs".into(),
            }))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("A docstring.")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        let result = client.generate("Write docs").await;

        assert_eq!(result.unwrap(), "A docstring.");
    }

    #[tokio::test]
    async fn test_output_parts_are_concatenated() {
        let server = MockServer::start().await;

        let reply = serde_json::json!({
            "output": [{
                "type": "message",
                "content": [
                    {"type": "output_text", "text": "First "},
                    {"type": "refusal", "refusal": "nope"},
                    {"type": "output_text", "text": "second"}
                ]
            }]
        });
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        assert_eq!(client.generate("p").await.unwrap(), "First second");
    }

    #[tokio::test]
    async fn test_no_change_sentinel_passes_through_verbatim() {
        let server = MockServer::start().await;

        // The client never interprets reply text; the fan-out layer owns
        // the "-1" filtering.
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("-1")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        assert_eq!(client.generate("p").await.unwrap(), "-1");
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        let result = client.generate("p").await;

        assert!(matches!(result, Err(GenError::Auth(_))));
    }

    #[tokio::test]
    async fn test_model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Model not found"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        let result = client.generate("p").await;

        assert!(matches!(result, Err(GenError::InvalidModel(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_reports_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "60")
                    .set_body_string("Rate limited"),
            )
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.max_retries = 0;
        let client = OpenAiClient::new(config).unwrap();

        match client.generate("p").await {
            Err(GenError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(60)),
            other => panic!("Expected rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("Recovered.")))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        assert_eq!(client.generate("p").await.unwrap(), "Recovered.");
    }

    #[tokio::test]
    async fn test_no_auth_header_for_keyless_endpoints() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_reply("ok")))
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.api_key = None;
        let client = OpenAiClient::new(config).unwrap();

        assert!(client.generate("p").await.is_ok());
    }

    #[tokio::test]
    async fn test_reply_without_text_is_invalid() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"output": [{"type": "reasoning"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(test_config(&server)).unwrap();
        let result = client.generate("p").await;

        assert!(matches!(result, Err(GenError::InvalidResponse(_))));
    }

    #[test]
    fn test_responses_url_joining() {
        let base = |url: &str| OpenAiClient::new(OpenAiConfig {
            base_url: url.into(),
            api_key: None,
            model: "m".into(),
            timeout_secs: 5,
            max_retries: 0,
        })
        .unwrap();

        assert_eq!(
            base("https://api.openai.com/v1").responses_url(),
            "https://api.openai.com/v1/responses"
        );
        assert_eq!(
            base("http://localhost:8000").responses_url(),
            "http://localhost:8000/v1/responses"
        );
        assert_eq!(
            base("http://localhost:8000/v1/").responses_url(),
            "http://localhost:8000/v1/responses"
        );
    }

    #[test]
    fn test_config_openai_defaults() {
        let config = OpenAiConfig::openai("sk-test");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.api_key, Some("sk-test".into()));
        assert_eq!(config.model, "gpt-5-nano");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 3);
    }
}

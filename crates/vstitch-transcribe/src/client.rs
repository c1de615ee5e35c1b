//! Transcription function HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{TranscribeError, TranscribeResult};
use crate::types::{TranscriptionRequest, TRANSCRIPTION_FIELD};

/// Turns a stored media file into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the object at `storage_path`.
    async fn transcribe(&self, storage_path: &str) -> TranscribeResult<String>;
}

/// Configuration for the transcription client.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Base URL of the functions host
    pub base_url: String,
    /// Function name, appended as `/functions/v1/{name}`
    pub function_name: String,
    /// Bearer token, if the host requires one
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            function_name: "whisper-transcribe".to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
        }
    }
}

impl TranscriptionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> TranscribeResult<Self> {
        let base_url = std::env::var("TRANSCRIPTION_BASE_URL")
            .map_err(|_| TranscribeError::config_error("TRANSCRIPTION_BASE_URL not set"))?;

        Ok(Self {
            base_url,
            function_name: std::env::var("TRANSCRIPTION_FUNCTION")
                .unwrap_or_else(|_| "whisper-transcribe".to_string()),
            api_key: std::env::var("TRANSCRIPTION_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("TRANSCRIPTION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        })
    }

    /// Full URL of the function endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/functions/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.function_name
        )
    }
}

/// Client for the transcription function.
pub struct TranscriptionClient {
    http: Client,
    config: TranscriptionConfig,
}

impl TranscriptionClient {
    /// Create a new client.
    pub fn new(config: TranscriptionConfig) -> TranscribeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vstitch-transcribe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TranscribeError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> TranscribeResult<Self> {
        Self::new(TranscriptionConfig::from_env()?)
    }

    pub fn config(&self) -> &TranscriptionConfig {
        &self.config
    }

    fn invalid_response(&self) -> TranscribeError {
        TranscribeError::InvalidResponse(format!(
            "Invalid or missing transcription data from function '{}'.",
            self.config.function_name
        ))
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, storage_path: &str) -> TranscribeResult<String> {
        let url = self.config.endpoint();
        info!(
            "Invoking function '{}' for path: {}",
            self.config.function_name, storage_path
        );

        let mut request = self.http.post(&url).json(&TranscriptionRequest {
            storage_path: storage_path.to_string(),
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TranscribeError::FunctionFailed {
                function: self.config.function_name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let text = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get(TRANSCRIPTION_FIELD)?.as_str().map(str::to_string));

        match text {
            Some(text) => {
                debug!("Transcription received ({} chars)", text.len());
                Ok(text)
            }
            None => {
                warn!(
                    "Unexpected response from {}: {}",
                    self.config.function_name, body
                );
                Err(self.invalid_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> TranscriptionClient {
        TranscriptionClient::new(TranscriptionConfig {
            base_url: server.uri(),
            api_key: api_key.map(str::to_string),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.function_name, "whisper-transcribe");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(
            config.endpoint(),
            "http://localhost:54321/functions/v1/whisper-transcribe"
        );
    }

    #[tokio::test]
    async fn test_transcribe_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/whisper-transcribe"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({"storagePath": "user-1/a.mp4"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"transcription": "hello world"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server, Some("secret"))
            .transcribe("user-1/a.mp4")
            .await
            .unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_missing_text_field_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hi"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .transcribe("user-1/a.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::InvalidResponse(_)));
        assert!(err
            .to_string()
            .contains("Invalid or missing transcription data"));
    }

    #[tokio::test]
    async fn test_non_string_text_field_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"transcription": 42})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, None).transcribe("a.mp4").await.unwrap_err();
        assert!(matches!(err, TranscribeError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, None).transcribe("a.mp4").await.unwrap_err();
        match err {
            TranscribeError::FunctionFailed { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::{GenerationError, ServiceError, ServiceResult};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Turns a prompt into a single text completion
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    config: GenerationConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GenerationConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build Gemini HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::NotConfigured {
                setting: "generation.api_key",
            })?;

        let url = self.generate_url();
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!(
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "Calling Gemini"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| GenerationError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(GenerationError::Api {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|source| GenerationError::InvalidResponse { source })?;

        body.into_text()
    }
}

// Internal Gemini API types

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn into_text(self) -> Result<String, GenerationError> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::EmptyCompletion {
                block_reason: self.prompt_feedback.and_then(|f| f.block_reason),
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
    };
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct FakeGemini {
        requests: Mutex<Vec<(String, Option<String>, serde_json::Value)>>,
    }

    async fn generate_content(
        State(fake): State<Arc<FakeGemini>>,
        Path(model_action): Path<String>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Response {
        let key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        fake.requests
            .lock()
            .unwrap()
            .push((model_action.clone(), key, body.clone()));

        let prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        match prompt.as_str() {
            "overloaded" => (StatusCode::SERVICE_UNAVAILABLE, "The model is overloaded.")
                .into_response(),
            "garbled" => (StatusCode::OK, "<html>upstream proxy error</html>").into_response(),
            "blocked" => Json(serde_json::json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            }))
            .into_response(),
            _ => Json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            { "text": "===START===\nOverall Score: 8/10\n" },
                            { "text": "===END===" }
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }))
            .into_response(),
        }
    }

    async fn start() -> (Arc<FakeGemini>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let fake = Arc::new(FakeGemini::default());

        let app = Router::new()
            .route("/v1beta/models/{model_action}", post(generate_content))
            .with_state(fake.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (fake, base_url)
    }

    fn client(base_url: &str, api_key: Option<&str>) -> GeminiClient {
        GeminiClient::new(GenerationConfig {
            base_url: format!("{}/", base_url),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let (fake, base_url) = start().await;
        let client = client(&base_url, Some("gemini-key"));

        let text = client.generate("Grade this answer sheet").await.unwrap();

        assert_eq!(text, "===START===\nOverall Score: 8/10\n===END===");
        let requests = fake.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (model_action, key, body) = &requests[0];
        assert_eq!(model_action, "gemini-2.5-flash:generateContent");
        assert_eq!(key.as_deref(), Some("gemini-key"));
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "Grade this answer sheet"
        );
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_body() {
        let (_fake, base_url) = start().await;
        let client = client(&base_url, Some("gemini-key"));

        let err = client.generate("overloaded").await.unwrap_err();

        match err {
            GenerationError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "The model is overloaded.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_completion() {
        let (_fake, base_url) = start().await;
        let client = client(&base_url, Some("gemini-key"));

        let err = client.generate("blocked").await.unwrap_err();

        assert!(matches!(
            err,
            GenerationError::EmptyCompletion { block_reason: Some(ref r) } if r == "SAFETY"
        ));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_invalid_response() {
        let (fake, base_url) = start().await;
        let client = client(&base_url, Some("gemini-key"));

        let err = client.generate("garbled").await.unwrap_err();

        assert!(matches!(err, GenerationError::InvalidResponse { .. }));
        assert_eq!(fake.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_request() {
        let (fake, base_url) = start().await;
        let client = client(&base_url, None);

        let err = tokio_test::assert_err!(client.generate("Grade this").await);

        assert!(matches!(err, GenerationError::NotConfigured { .. }));
        assert!(fake.requests.lock().unwrap().is_empty());
    }
}

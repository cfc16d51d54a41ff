//! Google Gemini `generateContent` client
//!
//! Implements the LlmClient trait for Gemini's REST API. One request, one
//! response: no streaming and no automatic retry, since a failed breakdown
//! goes straight back to the user.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};
use crate::config::LlmConfig;

/// Header carrying the API key (keeps it out of URLs and logs)
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API client
pub struct GeminiClient {
    model: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl GeminiClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "GeminiClient::from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    /// Full URL of the generateContent endpoint
    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the request body for the Gemini API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let max_tokens = request.max_tokens.min(self.max_tokens);

        let mut generation_config = serde_json::json!({
            "maxOutputTokens": max_tokens,
        });
        if let Some(temperature) = request.temperature {
            generation_config["temperature"] = serde_json::json!(temperature);
        }
        if request.json_output {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }

        serde_json::json!({
            "contents": [{
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": generation_config,
        })
    }

    /// Parse the Gemini API response
    fn parse_response(&self, api_response: GeminiResponse) -> CompletionResponse {
        debug!(candidates = api_response.candidates.len(), "parse_response: called");
        let candidate = api_response.candidates.into_iter().next();

        let (content, finish_reason) = match candidate {
            Some(c) => {
                let text = c
                    .content
                    .and_then(|content| content.parts.into_iter().find_map(|p| p.text));
                (text, c.finish_reason)
            }
            None => (None, None),
        };

        let usage = api_response
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            finish_reason,
            usage,
        }
    }
}

/// Pull `error.message` out of a Gemini error body
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<GeminiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, credential: &str, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let body = self.build_request_body(&request);

        let mut key = HeaderValue::from_str(credential)
            .map_err(|_| LlmError::InvalidCredential("API key contains characters that aren't allowed".to_string()))?;
        key.set_sensitive(true);

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            debug!("complete: rate limited (429)");
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            warn!(status = status.as_u16(), %message, "complete: API error");
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let api_response: GeminiResponse = serde_json::from_str(&text)?;
        let response = self.parse_response(api_response);
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            finish_reason = ?response.finish_reason,
            "complete: success"
        );
        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient {
            model: "gemini-test".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            http: Client::new(),
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_from_config_trims_base_url() {
        let config = LlmConfig {
            base_url: "http://localhost:9999/".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::from_config(&config).unwrap();
        assert!(client.endpoint().starts_with("http://localhost:9999/v1beta/models/"));
    }

    #[test]
    fn test_build_request_body_json_mode() {
        let request = CompletionRequest::new("Break this down", 1024).with_temperature(0.7).json();
        let body = client().build_request_body(&request);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Break this down");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_build_request_body_minimal() {
        let body = client().build_request_body(&CompletionRequest::new("Say \"ok\"", 10));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 10);
        assert!(body["generationConfig"].get("temperature").is_none());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_max_tokens_capped() {
        let body = client().build_request_body(&CompletionRequest::new("x", 5000));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_parse_response_takes_first_text_part() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "{\"task_summary\":\"x\"}"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 80}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        let response = client().parse_response(parsed);

        assert_eq!(response.content.as_deref(), Some("{\"task_summary\":\"x\"}"));
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage.input_tokens, 120);
        assert_eq!(response.usage.output_tokens, 80);
    }

    #[test]
    fn test_parse_response_without_candidates() {
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        let response = client().parse_response(parsed);
        assert_eq!(response.content, None);
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("API key not valid."));
        assert_eq!(error_message("<html>"), None);
        assert_eq!(error_message(r#"{"error": {"message": ""}}"#), None);
    }
}

//! Request/response types for the text-generation capability

use tracing::debug;

/// A completion request - one prompt in, text out
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Full prompt text
    pub prompt: String,

    /// Output length cap
    pub max_tokens: u32,

    /// Sampling temperature; `None` leaves the provider default
    pub temperature: Option<f32>,

    /// Ask the provider for a JSON-formatted reply
    pub json_output: bool,
}

impl CompletionRequest {
    /// Plain-text request with the provider's default sampling
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        debug!(max_tokens, "CompletionRequest::new: called");
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature: None,
            json_output: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Completion response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Text of the first candidate, if any
    pub content: Option<String>,

    /// Provider's finish reason, verbatim
    pub finish_reason: Option<String>,

    /// Token usage for logging
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Response carrying just text
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

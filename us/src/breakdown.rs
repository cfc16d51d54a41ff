//! Task breakdown: prompt, request, reply validation and failure taxonomy
//!
//! A breakdown is one round trip to the generation API. The reply must be a
//! JSON object with a summary, a non-empty list of steps and an optional
//! encouragement line; anything else is a parse failure rather than a
//! partially accepted plan.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmError};

/// Instructions sent ahead of the user's text
pub const BREAKDOWN_PROMPT: &str = r#"You are helping someone with task paralysis break down an overwhelming task into manageable steps.

## Rules

1. **Each step must be completable in 15 minutes or less**
2. **Step 1 must be TRIVIALLY easy** - lower the activation energy to almost zero
3. **Be specific and concrete** - no vague advice like "make a plan"
4. **No decisions in step 1** - just simple physical action
5. **Use physical action verbs**: grab, open, write, walk, type, click
6. **5-7 steps maximum** - more than that is overwhelming
7. **Acknowledge the emotional reality** - this person is stuck, be kind

## Output Format

Return valid JSON only, no markdown formatting:

{
  "task_summary": "Brief 3-5 word summary of the task",
  "steps": [
    "Step 1 description - the easiest possible starting action",
    "Step 2 description",
    "Step 3 description",
    "Step 4 description",
    "Step 5 description"
  ],
  "encouragement": "One brief encouraging sentence"
}

## Examples of Good First Steps

- "Open a new Google Doc and type today's date at the top"
- "Get your phone and set a 15-minute timer"
- "Walk to where you keep [item] and put it on your desk"
- "Open [app/website] - don't do anything yet, just open it"
- "Grab a piece of paper and a pen"

## Examples of Bad First Steps (too much activation energy)

- "Make a list of everything you need to do" (requires thinking)
- "Decide which approach to take" (requires decision)
- "Research the best way to..." (open-ended)
- "Organize your materials" (vague)

---

Task the user is stuck on:
"#;

/// Used when the reply carries no encouragement
pub const DEFAULT_ENCOURAGEMENT: &str = "You've got this!";

/// Where users manage their Gemini API keys
pub const API_KEY_URL: &str = "https://aistudio.google.com/apikey";

/// Prompt for the credential check
const CHECK_PROMPT: &str = "Say \"ok\"";

/// Output cap for the credential check
const CHECK_MAX_TOKENS: u32 = 10;

/// Build the full prompt with the user's text appended verbatim
pub fn build_prompt(user_task: &str) -> String {
    format!("{}{}", BREAKDOWN_PROMPT, user_task)
}

/// A parsed breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub task_summary: String,
    pub steps: Vec<String>,
    pub encouragement: String,
}

#[derive(Debug, Deserialize)]
struct RawBreakdown {
    task_summary: String,
    steps: Vec<String>,
    encouragement: Option<String>,
}

/// Failure category, in classification precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidKey,
    RateLimited,
    NetworkError,
    ParseError,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidKey => "INVALID_KEY",
            Self::RateLimited => "RATE_LIMITED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A classified breakdown failure with a detail string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakdownError {
    #[error("Invalid API key: {0}")]
    InvalidKey(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("{0}")]
    Unknown(String),
}

impl BreakdownError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidKey(d) | Self::RateLimited(d) | Self::Network(d) | Self::Parse(d) | Self::Unknown(d) => d,
        }
    }

    /// Message shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidKey(details) => format!(
                "That API key doesn't seem to work. Double-check it at:\n{}\n\n(Error: {})",
                API_KEY_URL, details
            ),
            Self::RateLimited(_) => {
                "Google's servers are busy. Wait a moment and try again.\n\nThis usually resolves in a few seconds."
                    .to_string()
            }
            Self::Network(_) => "Couldn't connect. Check your internet connection and try again.".to_string(),
            Self::Parse(_) => "Got an unexpected response. Please try again.\n\n\
                               If this keeps happening, the task description might need to be clearer."
                .to_string(),
            Self::Unknown(details) => format!("Something went wrong. Please try again.\n\n(Error: {})", details),
        }
    }
}

/// Map an HTTP status to its failure category, if it has a dedicated one
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    match status {
        400 | 401 | 403 => Some(ErrorKind::InvalidKey),
        429 => Some(ErrorKind::RateLimited),
        _ => None,
    }
}

impl From<LlmError> for BreakdownError {
    fn from(err: LlmError) -> Self {
        debug!(error = %err, "BreakdownError::from: classifying");
        if let LlmError::InvalidCredential(detail) = err {
            return Self::InvalidKey(detail);
        }
        if let Some(status) = err.status() {
            return match classify_status(status) {
                Some(ErrorKind::InvalidKey) => match err {
                    LlmError::ApiError { message, .. } => Self::InvalidKey(message),
                    other => Self::InvalidKey(other.to_string()),
                },
                Some(_) => Self::RateLimited("Rate limited".to_string()),
                None => match err {
                    LlmError::ApiError { message, .. } => Self::Unknown(message),
                    other => Self::Unknown(other.to_string()),
                },
            };
        }
        if err.is_transport() {
            return Self::Network(err.to_string());
        }
        match err {
            LlmError::InvalidResponse(_) | LlmError::Json(_) | LlmError::Network(_) => Self::Parse(err.to_string()),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Remove an optional surrounding code fence
pub fn strip_code_fence(text: &str) -> &str {
    let mut cleaned = text.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }

    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    cleaned.trim()
}

/// Parse and validate a reply body
pub fn parse_breakdown(text: &str) -> Result<Breakdown, BreakdownError> {
    debug!(text_len = text.len(), "parse_breakdown: called");
    let cleaned = strip_code_fence(text);

    let raw: RawBreakdown = serde_json::from_str(cleaned).map_err(|e| BreakdownError::Parse(e.to_string()))?;

    if raw.task_summary.is_empty() {
        return Err(BreakdownError::Parse("Invalid response structure: empty task_summary".to_string()));
    }
    if raw.steps.is_empty() {
        return Err(BreakdownError::Parse("Invalid response structure: no steps".to_string()));
    }
    if raw.steps.iter().any(String::is_empty) {
        return Err(BreakdownError::Parse("Invalid response structure: empty step".to_string()));
    }

    let encouragement = raw
        .encouragement
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_ENCOURAGEMENT.to_string());

    Ok(Breakdown {
        task_summary: raw.task_summary,
        steps: raw.steps,
        encouragement,
    })
}

/// Client that turns task descriptions into breakdowns
#[derive(Clone)]
pub struct BreakdownClient {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for BreakdownClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakdownClient")
            .field("model", &self.llm.model())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl BreakdownClient {
    /// Client with the reference settings (1024 tokens, temperature 0.7)
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let defaults = LlmConfig::default();
        Self {
            llm,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self {
            llm,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Request a breakdown for the user's task
    pub async fn breakdown(&self, credential: &str, user_task: &str) -> Result<Breakdown, BreakdownError> {
        info!(task_len = user_task.len(), model = %self.llm.model(), "Requesting breakdown");
        let request = CompletionRequest::new(build_prompt(user_task), self.max_tokens)
            .with_temperature(self.temperature)
            .json();

        let response = self.llm.complete(credential, request).await.map_err(|e| {
            warn!(error = %e, "breakdown: request failed");
            BreakdownError::from(e)
        })?;

        let text = response
            .content
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BreakdownError::Parse("Empty response from API".to_string()))?;

        let breakdown = parse_breakdown(&text)?;
        info!(steps = breakdown.steps.len(), summary = %breakdown.task_summary, "Breakdown received");
        Ok(breakdown)
    }

    /// Check a credential with a minimal request; all error detail is dropped
    pub async fn check_credential(&self, credential: &str) -> bool {
        debug!("check_credential: called");
        let request = CompletionRequest::new(CHECK_PROMPT, CHECK_MAX_TOKENS);
        match self.llm.complete(credential, request).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "check_credential: rejected");
                false
            }
        }
    }
}

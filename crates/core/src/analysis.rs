//! Document analysis through an OpenAI-compatible chat completion endpoint

use doc_model::Preferences;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::suggestion::{parse_response, SuggestionRecord};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

pub const API_KEY_VAR: &str = "REDPEN_API_KEY";
pub const BASE_URL_VAR: &str = "REDPEN_BASE_URL";
pub const MODEL_VAR: &str = "REDPEN_MODEL";

const SYSTEM_PROMPT: &str = "\
You are a meticulous document reviewer. Read the document and report concrete \
problems with its content, structure, wording, and formatting. \
Answer only with blocks in exactly this format, one block per finding:

---ANNOTATION---
TYPE: content | structure | language | format
SEVERITY: high | medium | low
PAGE: <page number>
TITLE: <short title>
DESCRIPTION: <what is wrong>
SUGGESTION: <how to fix it>
SELECTED: <a short verbatim quote from the page the finding refers to>
---ANNOTATION---

Keep every field on a single line. Quote SELECTED text exactly as it appears in the document.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis is not configured: {0}")]
    Configuration(String),

    #[error("invalid analysis input: {0}")]
    Validation(String),

    #[error("analysis request failed: {0}")]
    Request(String),

    #[error("could not parse analysis response: {0}")]
    Parse(String),
}

/// Endpoint, credentials and sampling settings for one analysis call
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl AnalysisConfig {
    /// Build from stored preferences, overridden by `REDPEN_*` variables
    pub fn from_env(preferences: &Preferences) -> Self {
        Self::from_lookup(preferences, |key| std::env::var(key).ok())
    }

    /// Same as [`AnalysisConfig::from_env`] with an explicit variable lookup
    pub fn from_lookup(
        preferences: &Preferences,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Self {
            api_key: var(API_KEY_VAR),
            base_url: var(BASE_URL_VAR)
                .or_else(|| preferences.analysis_base_url.clone())
                .unwrap_or(defaults.base_url),
            model: var(MODEL_VAR)
                .or_else(|| preferences.analysis_model.clone())
                .unwrap_or(defaults.model),
            ..defaults
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn require_api_key(&self) -> Result<&str, AnalysisError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AnalysisError::Configuration(format!("{API_KEY_VAR} is not set")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self { role: role.to_owned(), content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Review request for one document
    pub fn for_document(config: &AnalysisConfig, document_name: &str, text: &str) -> Self {
        let user = format!(
            "Please review the following document.\n\nDocument name: {document_name}\n\nDocument content:\n{text}"
        );
        Self {
            model: config.model.clone(),
            messages: vec![ChatMessage::new("system", SYSTEM_PROMPT), ChatMessage::new("user", user)],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().and_then(|choice| choice.message.content.as_deref())
    }
}

/// Anything able to answer a chat completion request
pub trait CompletionClient {
    fn complete(
        &self,
        config: &AnalysisConfig,
        request: &ChatRequest,
    ) -> Result<ChatResponse, AnalysisError>;
}

/// Blocking HTTP client for `POST {base}/chat/completions`
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    agent: ureq::Agent,
}

impl Default for ChatCompletionsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCompletionsClient {
    pub fn new() -> Self {
        Self { agent: ureq::agent() }
    }
}

impl CompletionClient for ChatCompletionsClient {
    fn complete(
        &self,
        config: &AnalysisConfig,
        request: &ChatRequest,
    ) -> Result<ChatResponse, AnalysisError> {
        let api_key = config.require_api_key()?;
        let url = config.completions_url();
        let body =
            serde_json::to_string(request).map_err(|e| AnalysisError::Request(e.to_string()))?;

        tracing::debug!(%url, model = %request.model, "sending analysis request");

        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_string(&body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let detail = resp.into_string().unwrap_or_default();
                    AnalysisError::Request(format!("HTTP {code}: {}", detail.trim()))
                }
                ureq::Error::Transport(transport) => AnalysisError::Request(transport.to_string()),
            })?;

        let body = resp.into_string().map_err(|e| AnalysisError::Request(e.to_string()))?;

        serde_json::from_str::<ChatResponse>(&body).map_err(|e| AnalysisError::Parse(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub suggestions: Vec<SuggestionRecord>,
    pub usage: Option<TokenUsage>,
}

/// Ask the model to review `text` and parse its suggestions
pub fn analyze_document<C: CompletionClient + ?Sized>(
    client: &C,
    config: &AnalysisConfig,
    text: &str,
    document_name: &str,
) -> Result<AnalysisOutcome, AnalysisError> {
    if text.trim().is_empty() {
        return Err(AnalysisError::Validation("document text is empty".to_owned()));
    }
    config.require_api_key()?;

    let request = ChatRequest::for_document(config, document_name, text);
    let response = client.complete(config, &request)?;

    let content = response
        .first_content()
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AnalysisError::Parse("response carried no message content".to_owned()))?;

    let suggestions = parse_response(content)?;
    tracing::info!(
        document = document_name,
        suggestions = suggestions.len(),
        "analysis complete"
    );

    Ok(AnalysisOutcome { suggestions, usage: response.usage })
}

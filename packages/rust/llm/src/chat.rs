//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use dossier_shared::{DossierError, LanguageModelConfig, Result};

use crate::{CompletionRequest, LanguageModel};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("Dossier/", env!("CARGO_PKG_VERSION"));

/// Longest error body we carry into an error message.
const ERROR_BODY_LIMIT: usize = 300;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for `POST {api_base}/chat/completions` with bearer auth.
pub struct ChatCompletionsClient {
    config: LanguageModelConfig,
    client: Client,
}

impl ChatCompletionsClient {
    /// Build a client. Credentials are checked later by [`LanguageModel::ensure_configured`].
    pub fn new(config: LanguageModelConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    /// One HTTP round trip, no retries.
    async fn send_once(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DossierError::Network(format!("model request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DossierError::Network(format!("failed to read model body: {e}")))?;

        if !status.is_success() {
            return Err(DossierError::Provider {
                status: status.as_u16(),
                message: truncate(&text, ERROR_BODY_LIMIT),
            });
        }

        parse_completion(&text)
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn ensure_configured(&self) -> Result<()> {
        self.config.validate()
    }

    #[instrument(skip_all, fields(model = %self.config.model, max_tokens = request.max_tokens))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let max_attempts = self.config.retry_attempts.saturating_add(1);
        let mut attempt = 1;

        loop {
            match self.send_once(request).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "completion received");
                    return Ok(text);
                }
                Err(e) if is_transient(&e) && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "model call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Rate limiting, server faults and transport errors are worth another try.
fn is_transient(err: &DossierError) -> bool {
    match err {
        DossierError::Network(_) => true,
        DossierError::Provider { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

/// Pull `choices[0].message.content` out of a response body.
fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| DossierError::InvalidResponse(format!("malformed completion payload: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| DossierError::InvalidResponse("completion has no message content".into()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

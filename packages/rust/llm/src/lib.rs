//! Language-model access for Dossier.
//!
//! The pipeline only sees the [`LanguageModel`] trait. The shipped client
//! speaks the OpenAI-compatible chat-completions protocol (OpenRouter by default).

pub mod chat;

pub use chat::ChatCompletionsClient;

use async_trait::async_trait;

use dossier_shared::Result;

/// One completion call: a system prompt, a user prompt, and sampling limits.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Check credentials before a run starts. Failure is run-fatal.
    fn ensure_configured(&self) -> Result<()>;

    /// Run one completion and return the raw text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

//! Grounded answer generation over hosted or local LLMs.

mod error;
mod prompt;
mod provider;
mod settings;

pub use error::LlmError;
pub use prompt::{build_rag_prompt, SYSTEM_MESSAGE};
pub use provider::LlmProvider;
pub use settings::{AnswerMode, ChatCompletionConfig, LlmSettings, OllamaConfig, OnlineProvider};

use docrag_core::types::ContextRecord;
use tracing::info;

/// Reuses one HTTP client across questions.
pub struct AnswerGenerator {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl AnswerGenerator {
    pub fn new(settings: LlmSettings) -> Self {
        Self { client: reqwest::Client::new(), settings }
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Answers `question` using only `contexts`, in the order given.
    pub async fn generate(&self, question: &str, contexts: &[ContextRecord], mode: AnswerMode) -> Result<String, LlmError> {
        let provider = LlmProvider::for_mode(&self.settings, mode)?;
        let prompt = build_rag_prompt(question, contexts);
        info!(provider = provider.name(), contexts = contexts.len(), "generating answer");
        provider.complete(&self.client, &prompt).await
    }
}

/// One-shot form of [`AnswerGenerator::generate`].
pub async fn generate_answer(
    question: &str,
    contexts: &[ContextRecord],
    mode: AnswerMode,
    settings: &LlmSettings,
) -> Result<String, LlmError> {
    AnswerGenerator::new(settings.clone()).generate(question, contexts, mode).await
}

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::error::LlmError;
use crate::prompt::SYSTEM_MESSAGE;
use crate::settings::{AnswerMode, ChatCompletionConfig, LlmSettings, OllamaConfig, OnlineProvider};

/// A configured backend, ready to send prompts.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmProvider {
    Groq(ChatCompletionConfig),
    OpenRouter(ChatCompletionConfig),
    Ollama(OllamaConfig),
}

impl LlmProvider {
    /// Picks the backend for `mode`, failing early when it cannot be used.
    pub fn for_mode(settings: &LlmSettings, mode: AnswerMode) -> Result<Self, LlmError> {
        let provider = match (mode, settings.online) {
            (AnswerMode::Offline, _) => LlmProvider::Ollama(settings.ollama.clone()),
            (AnswerMode::Online, OnlineProvider::Groq) => LlmProvider::Groq(settings.groq.clone()),
            (AnswerMode::Online, OnlineProvider::OpenRouter) => LlmProvider::OpenRouter(settings.openrouter.clone()),
        };
        provider.check()?;
        Ok(provider)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Groq(_) => "groq",
            LlmProvider::OpenRouter(_) => "openrouter",
            LlmProvider::Ollama(_) => "ollama",
        }
    }

    fn check(&self) -> Result<(), LlmError> {
        match self {
            LlmProvider::Groq(c) | LlmProvider::OpenRouter(c) => {
                if c.resolve_api_key().is_none() {
                    return Err(LlmError::NotConfigured(format!("{} not set", c.api_key_env)));
                }
            }
            LlmProvider::Ollama(c) => {
                if !c.enabled {
                    return Err(LlmError::NotConfigured(
                        "offline LLM (Ollama) is disabled; set llm.ollama.enabled = true".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub async fn complete(&self, client: &reqwest::Client, prompt: &str) -> Result<String, LlmError> {
        match self {
            LlmProvider::Groq(c) | LlmProvider::OpenRouter(c) => chat_completion(client, c, prompt).await,
            LlmProvider::Ollama(c) => ollama_generate(client, c, prompt).await,
        }
    }
}

async fn chat_completion(client: &reqwest::Client, config: &ChatCompletionConfig, prompt: &str) -> Result<String, LlmError> {
    let api_key = config
        .resolve_api_key()
        .ok_or_else(|| LlmError::NotConfigured(format!("{} not set", config.api_key_env)))?;
    let mut body = json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_MESSAGE },
            { "role": "user", "content": prompt },
        ],
    });
    if let Some(t) = config.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(m) = config.max_tokens {
        body["max_tokens"] = json!(m);
    }

    debug!(endpoint = %config.endpoint, model = %config.model, "chat completion request");
    let response = client
        .post(&config.endpoint)
        .bearer_auth(api_key)
        .timeout(Duration::from_secs(config.timeout_secs))
        .json(&body)
        .send()
        .await?;

    let status = response.status().as_u16();
    if status != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api { status, body });
    }
    let resp: serde_json::Value = response.json().await?;
    parse_chat_completion(&resp)
}

async fn ollama_generate(client: &reqwest::Client, config: &OllamaConfig, prompt: &str) -> Result<String, LlmError> {
    let url = format!("{}/api/generate", config.endpoint.trim_end_matches('/'));
    let body = json!({ "model": config.model, "prompt": prompt, "stream": false });

    debug!(url = %url, model = %config.model, "ollama request");
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(config.timeout_secs))
        .json(&body)
        .send()
        .await?;

    let status = response.status().as_u16();
    if status != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api { status, body });
    }
    let resp: serde_json::Value = response.json().await?;
    parse_ollama(&resp)
}

pub(crate) fn parse_chat_completion(resp: &serde_json::Value) -> Result<String, LlmError> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".into()))
}

pub(crate) fn parse_ollama(resp: &serde_json::Value) -> Result<String, LlmError> {
    resp["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::Parse("missing response".into()))
}

//! `[llm]` configuration section.
//!
//! API keys are read from the config value first and then from the variable
//! named by `api_key_env`, so keys can stay out of `config.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineProvider {
    #[default]
    Groq,
    OpenRouter,
}

/// OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionConfig {
    pub fn groq() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".into(),
            model: "llama-3.1-8b-instant".into(),
            api_key: None,
            api_key_env: "GROQ_API_KEY".into(),
            timeout_secs: 30,
            temperature: Some(0.3),
            max_tokens: Some(1024),
        }
    }

    pub fn openrouter() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".into(),
            model: "x-ai/grok-beta".into(),
            api_key: None,
            api_key_env: "OPENROUTER_API_KEY".into(),
            timeout_secs: 30,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Non-empty key from config or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self { enabled: false, endpoint: "http://localhost:11434".into(), model: "llama3.2".into(), timeout_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub online: OnlineProvider,
    pub groq: ChatCompletionConfig,
    pub openrouter: ChatCompletionConfig,
    pub ollama: OllamaConfig,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            online: OnlineProvider::default(),
            groq: ChatCompletionConfig::groq(),
            openrouter: ChatCompletionConfig::openrouter(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// Where an answer is generated: a hosted provider or the local Ollama server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    #[default]
    Online,
    Offline,
}

impl FromStr for AnswerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" => Ok(AnswerMode::Online),
            "offline" => Ok(AnswerMode::Offline),
            other => Err(format!("unknown answer mode '{other}' (expected online or offline)")),
        }
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnswerMode::Online => "online",
            AnswerMode::Offline => "offline",
        })
    }
}

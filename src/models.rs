//! Data models and structures
//!
//! Defines the HTTP payloads, the provider-agnostic generation types and the
//! runtime configuration.

use crate::ai::openai::client::DEFAULT_BASE_URL;
use crate::logs::DEFAULT_MAX_ENTRIES;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Body of `POST /chat/message` and `POST /chat/message/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "prompt")]
    pub persona: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub persona: String,
    pub image_url: Option<String>,
}

/// One call to the chat-completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Output of the single-shot pipeline. `image_url` is only ever set for the
/// curator persona.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub response: String,
    pub image_url: Option<String>,
}

impl GenerationResult {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            image_url: None,
        }
    }
}

/// One NDJSON line of the streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StreamFrame {
    Chunk { chunk: String, persona: String },
    Error { error: String },
}

impl StreamFrame {
    pub fn is_error(&self) -> bool {
        matches!(self, StreamFrame::Error { .. })
    }

    pub fn to_ndjson_line(&self) -> String {
        // Both variants only hold strings, serialization cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub provider: String,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppSettings,
    pub llm: LlmSettings,
    pub image: ImageSettings,
    pub logs: LogSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub description: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub timeout: Duration,
    pub retry: RetrySettings,
    pub stream_idle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(4000),
            max_delay: Duration::from_millis(10_000),
            multiplier: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub size: String,
    pub quality: String,
    pub style: String,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let stream_idle_secs: u64 = parse_var(&lookup, "STREAM_IDLE_TIMEOUT_SECS", 120)?;

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(|| "Creative Prompt API".to_string()),
                description: lookup("APP_DESCRIPTION").unwrap_or_else(|| {
                    "Three imaginative LLM-powered assistants behind one HTTP API".to_string()
                }),
                version: env!("CARGO_PKG_VERSION").to_string(),
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "PORT", 8000)?,
                debug: parse_var(&lookup, "DEBUG", false)?,
            },
            llm: LlmSettings {
                api_key: api_key.clone(),
                base_url: base_url.clone(),
                model: lookup("CHAT_MODEL").unwrap_or_else(|| "gpt-4".to_string()),
                temperature: parse_var(&lookup, "TEMPERATURE", 0.7)?,
                max_tokens: parse_var(&lookup, "MAX_TOKENS", 1500)?,
                top_p: parse_var(&lookup, "TOP_P", 1.0)?,
                frequency_penalty: parse_var(&lookup, "FREQUENCY_PENALTY", 0.0)?,
                presence_penalty: parse_var(&lookup, "PRESENCE_PENALTY", 0.0)?,
                timeout: Duration::from_secs(parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 60)?),
                retry: RetrySettings {
                    attempts: parse_var(&lookup, "RETRY_ATTEMPTS", 3)?,
                    base_delay: Duration::from_millis(parse_var(
                        &lookup,
                        "RETRY_BASE_DELAY_MS",
                        4000,
                    )?),
                    max_delay: Duration::from_millis(parse_var(
                        &lookup,
                        "RETRY_MAX_DELAY_MS",
                        10_000,
                    )?),
                    multiplier: Duration::from_millis(parse_var(
                        &lookup,
                        "RETRY_MULTIPLIER_MS",
                        1000,
                    )?),
                },
                stream_idle_timeout: (stream_idle_secs > 0)
                    .then(|| Duration::from_secs(stream_idle_secs)),
            },
            image: ImageSettings {
                api_key,
                base_url,
                model: lookup("IMAGE_MODEL").unwrap_or_else(|| "dall-e-3".to_string()),
                size: lookup("IMAGE_SIZE").unwrap_or_else(|| "1024x1024".to_string()),
                quality: lookup("IMAGE_QUALITY").unwrap_or_else(|| "standard".to_string()),
                style: lookup("IMAGE_STYLE").unwrap_or_else(|| "vivid".to_string()),
            },
            logs: LogSettings {
                enabled: parse_var(&lookup, "LOG_STORE_ENABLED", true)?,
                ttl: Duration::from_secs(parse_var(&lookup, "LOG_TTL_SECS", 604_800)?),
                max_entries: parse_var(&lookup, "LOG_MAX_ENTRIES", DEFAULT_MAX_ENTRIES)?,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid value for {}: {}", key, e))),
        None => Ok(default),
    }
}

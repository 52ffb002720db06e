use super::client::{OpenAiHttpClient, CHAT_COMPLETIONS_PATH};
use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ErrorEnvelope,
};
use crate::ai::{ChatService, TextStream};
use crate::error::{AsyncProcessingError, LlmError};
use crate::models::{GenerationRequest, LlmSettings, ModelInfo, RetrySettings};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use std::fmt::Display;
use std::time::Duration;
use tokio_retry::RetryIf;

pub struct OpenAiChatClient {
    http: OpenAiHttpClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    retry: RetrySettings,
}

impl OpenAiChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Self::new_with_client(settings, reqwest::Client::new())
    }

    pub fn new_with_client(settings: &LlmSettings, client: reqwest::Client) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| Error::Configuration("OpenAI API key is required".to_string()))?;
        if settings.model.trim().is_empty() {
            return Err(Error::Configuration("OpenAI model is required".to_string()));
        }

        Ok(Self {
            http: OpenAiHttpClient::new_with_client(
                api_key,
                settings.base_url.clone(),
                settings.timeout,
                client,
            ),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
            frequency_penalty: settings.frequency_penalty,
            presence_penalty: settings.presence_penalty,
            retry: settings.retry.clone(),
        })
    }

    fn build_request(&self, request: &GenerationRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(&request.system_prompt),
                ChatMessage::user(&request.user_message),
            ],
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stream,
        }
    }

    async fn complete_once(&self, request: &ChatCompletionRequest) -> Result<String> {
        let response = self
            .http
            .post(CHAT_COMPLETIONS_PATH, request)
            .await
            .map_err(|e| LlmError::Service(format!("Failed to reach OpenAI: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Service(format!("Failed to read OpenAI response: {}", e)))?;

        if !status.is_success() {
            tracing::error!("OpenAI API error (status {}): {}", status, body);
            return Err(map_status(status, &body).into());
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse OpenAI response: {}\nBody: {}", e, body);
            LlmError::Service(format!("Failed to parse OpenAI response: {}", e))
        })?;

        parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LlmError::Service("Empty response from OpenAI".to_string()).into())
    }
}

#[async_trait]
impl ChatService for OpenAiChatClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_request(request, false);

        RetryIf::spawn(
            backoff(&self.retry),
            || self.complete_once(&body),
            |e: &Error| {
                let transient = e.is_transient();
                if transient {
                    tracing::warn!("Chat completion attempt failed: {}. Will retry...", e);
                }
                transient
            },
        )
        .await
        .map_err(|e| {
            tracing::error!("Chat completion failed: {}", e);
            e
        })
    }

    async fn complete_stream(&self, request: &GenerationRequest) -> Result<TextStream> {
        let body = self.build_request(request, true);

        let open = async {
            let response = self
                .http
                .post_streaming(CHAT_COMPLETIONS_PATH, &body)
                .await
                .map_err(|e| {
                    Error::from(LlmError::Service(format!("Failed to reach OpenAI: {}", e)))
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!("OpenAI streaming error (status {}): {}", status, body);
                return Err(Error::from(map_status(status, &body)));
            }
            Ok::<_, Error>(response)
        };

        // The request timeout covers everything up to the response headers.
        let limit = self.http.timeout();
        let response = tokio::time::timeout(limit, open).await.map_err(|_| {
            tracing::error!("OpenAI did not open the stream within {:?}", limit);
            AsyncProcessingError::Timeout(format!(
                "no response from OpenAI within {:?}",
                limit
            ))
        })??;

        Ok(Box::pin(sse_text_stream(response.bytes_stream())))
    }

    async fn validate_connection(&self) -> Result<()> {
        let probe = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user("test")],
            temperature: self.temperature,
            max_tokens: 1,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stream: false,
        };

        let response = self
            .http
            .post(CHAT_COMPLETIONS_PATH, &probe)
            .await
            .map_err(|e| LlmError::Service(format!("Connection test failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(map_status(status, &body).into())
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            provider: "openai".to_string(),
        }
    }
}

/// Delays between attempts. The n-th retry waits `multiplier * 2^(n-1)`,
/// clamped to `[base_delay, max_delay]`, so the floor dominates early on.
pub(crate) fn backoff(settings: &RetrySettings) -> impl Iterator<Item = Duration> {
    let RetrySettings {
        attempts,
        base_delay,
        max_delay,
        multiplier,
    } = settings.clone();

    (0..attempts.saturating_sub(1)).map(move |retry| {
        let exponential = 2u32
            .checked_pow(retry as u32)
            .and_then(|factor| multiplier.checked_mul(factor))
            .unwrap_or(max_delay);
        exponential.clamp(base_delay, max_delay.max(base_delay))
    })
}

fn map_status(status: StatusCode, body: &str) -> LlmError {
    let detail = ErrorEnvelope::parse(body)
        .and_then(|error| error.message)
        .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication(detail),
        _ => LlmError::Api {
            status: status.as_u16(),
            message: detail,
        },
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(raw: &[u8]) -> Result<SseLine> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
        AsyncProcessingError::Streaming(format!("Malformed stream chunk: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(LlmError::Service(
            error
                .describe()
                .unwrap_or_else(|| "Provider reported an error mid-stream".to_string()),
        )
        .into());
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(SseLine::Delta)
        .unwrap_or(SseLine::Skip))
}

/// Decode an OpenAI server-sent-event body into text deltas. Ends at
/// `[DONE]` or when the body closes.
pub(crate) fn sse_text_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    async_stream::try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        while !done {
            let next = match bytes.next().await {
                Some(next) => next,
                None => break,
            };
            let chunk = next.map_err(|e| {
                Error::from(AsyncProcessingError::ConnectionClosed(format!(
                    "Stream interrupted: {}",
                    e
                )))
            })?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(&line)? {
                    SseLine::Delta(text) => {
                        yield text;
                    }
                    SseLine::Done => {
                        done = true;
                        break;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        if !done && !buffer.is_empty() {
            if let SseLine::Delta(text) = parse_sse_line(&buffer)? {
                yield text;
            }
        }
    }
}

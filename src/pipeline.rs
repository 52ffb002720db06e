//! Query pipeline shared by every persona
//!
//! The single-shot path hides provider failures behind the persona's
//! fallback message. The streaming path surfaces them as a terminal error
//! frame instead.

use crate::ai::{ChatService, ImageGenerationService};
use crate::error::AsyncProcessingError;
use crate::models::{GenerationRequest, GenerationResult, StreamFrame};
use crate::persona::PersonaDefinition;
use crate::Error;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const IMAGE_PROMPT_LABEL: &str = "🌠 Image Prompt: ";

pub struct QueryPipeline {
    chat: Arc<dyn ChatService>,
    image: Arc<dyn ImageGenerationService>,
    stream_idle_timeout: Option<Duration>,
}

impl QueryPipeline {
    pub fn new(chat: Arc<dyn ChatService>, image: Arc<dyn ImageGenerationService>) -> Self {
        Self {
            chat,
            image,
            stream_idle_timeout: None,
        }
    }

    /// Bound the wait for each streamed delta. `None` waits forever.
    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn chat(&self) -> &Arc<dyn ChatService> {
        &self.chat
    }

    pub async fn run(&self, definition: &PersonaDefinition, query: &str) -> GenerationResult {
        let request = build_request(definition, query);

        let text = match self.chat.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                error!(persona = %definition.persona, "Error processing query: {}", e);
                return GenerationResult::text(definition.fallback_message);
            }
        };

        if !definition.persona.generates_images() {
            return GenerationResult::text(text);
        }

        let image_url = match extract_image_prompt(&text) {
            Some(prompt) => {
                info!(
                    "Generating image for prompt: {}...",
                    prompt.chars().take(50).collect::<String>()
                );
                match self.image.generate_image(&prompt).await {
                    Ok(url) => url,
                    Err(e) => {
                        warn!("Image generation failed, returning text only: {}", e);
                        None
                    }
                }
            }
            None => {
                debug!("No image prompt found in response");
                None
            }
        };

        GenerationResult {
            response: text,
            image_url,
        }
    }

    /// Relay provider deltas as frames. The returned stream owns everything
    /// it needs; dropping it drops the upstream response.
    pub fn run_stream(
        &self,
        definition: &PersonaDefinition,
        query: &str,
    ) -> impl Stream<Item = StreamFrame> + Send + 'static {
        let chat = self.chat.clone();
        let request = build_request(definition, query);
        let persona = definition.persona.key().to_string();
        let idle_timeout = self.stream_idle_timeout;

        async_stream::stream! {
            match chat.complete_stream(&request).await {
                Err(e) => {
                    error!(persona = %persona, "Failed to open stream: {}", e);
                    yield error_frame(&e);
                }
                Ok(mut deltas) => loop {
                    let next = match idle_timeout {
                        Some(limit) => match tokio::time::timeout(limit, deltas.next()).await {
                            Ok(item) => item,
                            Err(_) => Some(Err(Error::AsyncProcessing(
                                AsyncProcessingError::Timeout(format!(
                                    "no data from provider within {:?}",
                                    limit
                                )),
                            ))),
                        },
                        None => deltas.next().await,
                    };

                    match next {
                        Some(Ok(chunk)) => {
                            yield StreamFrame::Chunk {
                                chunk,
                                persona: persona.clone(),
                            };
                        }
                        Some(Err(e)) => {
                            error!(persona = %persona, "Error while streaming: {}", e);
                            yield error_frame(&e);
                            break;
                        }
                        None => break,
                    }
                },
            }
        }
    }
}

fn build_request(definition: &PersonaDefinition, query: &str) -> GenerationRequest {
    GenerationRequest {
        system_prompt: definition.system_prompt.to_string(),
        user_message: definition.format_user_message(query),
        temperature: definition.temperature,
        max_tokens: None,
    }
}

fn error_frame(error: &Error) -> StreamFrame {
    let message = match error {
        Error::AsyncProcessing(e) => format!("Processing error: {}", e),
        other => format!("An unexpected error occurred: {}", other),
    };
    StreamFrame::Error { error: message }
}

/// Text after the image prompt label, up to the next blank line.
pub fn extract_image_prompt(text: &str) -> Option<String> {
    let start = text.find(IMAGE_PROMPT_LABEL)? + IMAGE_PROMPT_LABEL.len();
    let rest = &text[start..];
    let end = rest.find("\n\n").unwrap_or(rest.len());

    let prompt = rest[..end].trim();
    if prompt.is_empty() {
        None
    } else {
        Some(prompt.to_string())
    }
}

//! AI service integration for text and image generation
//!
//! Provider capabilities are split into two traits so the pipeline can be
//! driven by OpenAI in production and by mocks in tests.

pub mod mock;
pub mod openai;

pub use mock::{MockChatClient, MockImageGenerationClient, MockImageReply, MockReply};
pub use openai::{OpenAiChatClient, OpenAiImageClient};

use crate::models::{GenerationRequest, ModelInfo};
use crate::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Incremental text deltas from a streaming completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Single-shot completion. Implementations retry transient failures.
    async fn complete(&self, request: &GenerationRequest) -> Result<String>;

    /// Streaming completion. Never retried once opened.
    async fn complete_stream(&self, request: &GenerationRequest) -> Result<TextStream>;

    /// Cheap round trip used by the health endpoint.
    async fn validate_connection(&self) -> Result<()>;

    fn model_info(&self) -> ModelInfo;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Returns `Ok(None)` when generation was skipped (no prompt or no
    /// credentials), an error when the provider call failed.
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>>;
}

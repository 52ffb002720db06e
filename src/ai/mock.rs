use super::{ChatService, ImageGenerationService, TextStream};
use crate::error::{AsyncProcessingError, LlmError};
use crate::models::{GenerationRequest, ModelInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Scripted outcome of one `complete` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(LlmError),
}

#[derive(Debug, Clone, Default)]
struct StreamScript {
    open_error: Option<LlmError>,
    chunks: Vec<String>,
    error_after_chunks: Option<AsyncProcessingError>,
    stall_after_chunks: bool,
}

/// Sets its flag once the stream holding it has been dropped.
struct DropFlag(Arc<Mutex<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        *self.0.lock().unwrap() = true;
    }
}

#[derive(Clone)]
pub struct MockChatClient {
    replies: Arc<Mutex<Vec<MockReply>>>,
    stream: Arc<Mutex<StreamScript>>,
    health_error: Arc<Mutex<Option<LlmError>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    call_count: Arc<Mutex<usize>>,
    stream_call_count: Arc<Mutex<usize>>,
    stream_dropped: Arc<Mutex<bool>>,
    model: String,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            stream: Arc::new(Mutex::new(StreamScript::default())),
            health_error: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            stream_call_count: Arc::new(Mutex::new(0)),
            stream_dropped: Arc::new(Mutex::new(false)),
            model: "mock-model".to_string(),
        }
    }

    pub fn with_response(self, response: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(MockReply::Text(response.to_string()));
        self
    }

    pub fn with_failure(self, error: LlmError) -> Self {
        self.replies.lock().unwrap().push(MockReply::Fail(error));
        self
    }

    pub fn with_stream_chunks(self, chunks: &[&str]) -> Self {
        self.stream.lock().unwrap().chunks = chunks.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Fail the stream after the scripted chunks have been delivered.
    pub fn with_stream_error(self, error: AsyncProcessingError) -> Self {
        self.stream.lock().unwrap().error_after_chunks = Some(error);
        self
    }

    /// Fail before the stream opens.
    pub fn with_stream_open_error(self, error: LlmError) -> Self {
        self.stream.lock().unwrap().open_error = Some(error);
        self
    }

    /// Keep the stream open forever once the scripted chunks are delivered.
    pub fn with_stalled_stream(self) -> Self {
        self.stream.lock().unwrap().stall_after_chunks = true;
        self
    }

    pub fn with_health_error(self, error: LlmError) -> Self {
        *self.health_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn get_stream_call_count(&self) -> usize {
        *self.stream_call_count.lock().unwrap()
    }

    pub fn get_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Whether the last stream handed out has been dropped by its consumer.
    pub fn stream_was_dropped(&self) -> bool {
        *self.stream_dropped.lock().unwrap()
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatService for MockChatClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        self.requests.lock().unwrap().push(request.clone());

        let replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok(format!("Mock response to: {}", request.user_message));
        }

        let index = (*count - 1) % replies.len();
        match &replies[index] {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Fail(error) => Err(Error::Llm(error.clone())),
        }
    }

    async fn complete_stream(&self, request: &GenerationRequest) -> Result<TextStream> {
        *self.stream_call_count.lock().unwrap() += 1;
        self.requests.lock().unwrap().push(request.clone());

        let script = self.stream.lock().unwrap().clone();
        if let Some(error) = script.open_error {
            return Err(Error::Llm(error));
        }

        *self.stream_dropped.lock().unwrap() = false;
        let guard = DropFlag(self.stream_dropped.clone());

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for chunk in script.chunks {
                yield Ok(chunk);
            }
            if let Some(error) = script.error_after_chunks {
                yield Err(Error::AsyncProcessing(error));
            } else if script.stall_after_chunks {
                futures::future::pending::<()>().await;
            }
        }))
    }

    async fn validate_connection(&self) -> Result<()> {
        match self.health_error.lock().unwrap().clone() {
            Some(error) => Err(Error::Llm(error)),
            None => Ok(()),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model: self.model.clone(),
            temperature: 0.7,
            max_tokens: 1500,
            provider: "mock".to_string(),
        }
    }
}

/// Scripted outcome of one `generate_image` call.
#[derive(Debug, Clone)]
pub enum MockImageReply {
    Url(String),
    Skipped,
    Fail(String),
}

#[derive(Clone)]
pub struct MockImageGenerationClient {
    replies: Arc<Mutex<Vec<MockImageReply>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_image_url(self, url: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(MockImageReply::Url(url.to_string()));
        self
    }

    pub fn with_skipped(self) -> Self {
        self.replies.lock().unwrap().push(MockImageReply::Skipped);
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(MockImageReply::Fail(message.to_string()));
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn get_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        self.prompts.lock().unwrap().push(prompt.to_string());

        let replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok(Some("https://mock-images.example.com/dream.png".to_string()));
        }

        let index = (*count - 1) % replies.len();
        match &replies[index] {
            MockImageReply::Url(url) => Ok(Some(url.clone())),
            MockImageReply::Skipped => Ok(None),
            MockImageReply::Fail(message) => Err(Error::ImageGeneration(message.clone())),
        }
    }
}

use super::client::{OpenAiHttpClient, IMAGE_GENERATIONS_PATH};
use super::types::{ErrorEnvelope, ImageGenerationRequest, ImageGenerationResponse};
use crate::ai::ImageGenerationService;
use crate::models::ImageSettings;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Longest prompt (in characters) submitted to the image API.
pub const MAX_PROMPT_CHARS: usize = 3800;

pub struct OpenAiImageClient {
    /// `None` when no API key is configured; generation is then skipped.
    http: Option<OpenAiHttpClient>,
    model: String,
    size: String,
    quality: String,
    style: String,
}

impl OpenAiImageClient {
    pub fn new(settings: &ImageSettings) -> Self {
        Self::new_with_client(settings, reqwest::Client::new())
    }

    pub fn new_with_client(settings: &ImageSettings, client: reqwest::Client) -> Self {
        let http = settings.api_key.clone().map(|api_key| {
            OpenAiHttpClient::new_with_client(
                api_key,
                settings.base_url.clone(),
                Duration::from_secs(120),
                client,
            )
        });

        Self {
            http,
            model: settings.model.clone(),
            size: settings.size.clone(),
            quality: settings.quality.clone(),
            style: settings.style.clone(),
        }
    }
}

/// Truncate, terminate with punctuation and append the rendering style.
pub fn format_prompt(prompt: &str) -> String {
    let mut prompt = if prompt.chars().count() > MAX_PROMPT_CHARS {
        tracing::warn!(
            "Prompt too long ({} chars), truncating",
            prompt.chars().count()
        );
        prompt.chars().take(MAX_PROMPT_CHARS).collect()
    } else {
        prompt.to_string()
    };

    if !prompt.ends_with(['.', '!', '?']) {
        prompt.push('.');
    }

    format!("{} {}", prompt, prompts::IMAGE_STYLE_SUFFIX.trim())
}

#[async_trait]
impl ImageGenerationService for OpenAiImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
        let http = match &self.http {
            Some(http) if !prompt.trim().is_empty() => http,
            _ => {
                tracing::warn!("Missing prompt or API key for image generation");
                return Ok(None);
            }
        };

        let formatted = format_prompt(prompt);
        tracing::debug!(
            "Sending image generation request with prompt: {}...",
            formatted.chars().take(50).collect::<String>()
        );

        let request = ImageGenerationRequest {
            model: self.model.clone(),
            prompt: formatted,
            n: 1,
            size: self.size.clone(),
            quality: self.quality.clone(),
            style: self.style.clone(),
        };

        let response = http
            .post(IMAGE_GENERATIONS_PATH, &request)
            .await
            .map_err(|e| Error::ImageGeneration(format!("Unexpected error: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::ImageGeneration(format!("Error reading API response: {}", e)))?;

        if !status.is_success() {
            let detail = ErrorEnvelope::parse(&body)
                .and_then(|error| error.describe())
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::error!("Image generation failed: {}", detail);
            tracing::debug!("Full error response: {}", body);
            return Err(Error::ImageGeneration(format!(
                "Failed to generate image: {}",
                detail
            )));
        }

        let parsed: ImageGenerationResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Error parsing image response: {}", e);
            tracing::debug!("Response content: {}", body);
            Error::ImageGeneration("Error parsing API response".to_string())
        })?;

        match parsed.data.into_iter().next().and_then(|image| image.url) {
            Some(url) => Ok(Some(url)),
            None => {
                tracing::warn!("No image URL in the response: {}", body);
                Err(Error::ImageGeneration(
                    "No image URL in the response".to_string(),
                ))
            }
        }
    }
}

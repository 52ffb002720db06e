use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const IMAGE_GENERATIONS_PATH: &str = "/v1/images/generations";

/// Thin authenticated wrapper shared by the chat and image clients.
///
/// Status handling is left to callers: the chat and image APIs map
/// failures to different error families.
#[derive(Clone)]
pub struct OpenAiHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiHttpClient {
    pub fn new_with_client(
        api_key: String,
        base_url: String,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body and hand back the raw response.
    pub async fn post<Req: Serialize>(
        &self,
        path: &str,
        request: &Req,
    ) -> std::result::Result<Response, reqwest::Error> {
        self.send(path, request, Some(self.timeout)).await
    }

    /// Like [`post`](Self::post) but without the whole-request timeout, for
    /// responses that stay open while the provider streams. Callers bound
    /// the wait for response headers themselves.
    pub async fn post_streaming<Req: Serialize>(
        &self,
        path: &str,
        request: &Req,
    ) -> std::result::Result<Response, reqwest::Error> {
        self.send(path, request, None).await
    }

    async fn send<Req: Serialize>(
        &self,
        path: &str,
        request: &Req,
        timeout: Option<Duration>,
    ) -> std::result::Result<Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder.send().await.map_err(|e| {
            tracing::error!("Failed to send request to OpenAI: {}", e);
            e
        })
    }
}

//! Application wiring: provider clients, dispatcher, log store and server.

use crate::ai::{ChatService, ImageGenerationService, OpenAiChatClient, OpenAiImageClient};
use crate::dispatch::ChatDispatcher;
use crate::logs::{InMemoryLogStore, LogStore};
use crate::models::Config;
use crate::persona::PersonaRegistry;
use crate::pipeline::QueryPipeline;
use crate::server::{self, AppState};
use crate::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Owns the configured services and serves the HTTP API.
pub struct App {
    config: Config,
    state: AppState,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub chat: Arc<dyn ChatService>,
    pub image: Arc<dyn ImageGenerationService>,
    pub log_store: Option<Arc<dyn LogStore>>,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests that need to inject
    /// mocks.
    pub fn with_services(services: AppServices, config: Config) -> Self {
        let pipeline = QueryPipeline::new(services.chat, services.image)
            .with_stream_idle_timeout(config.llm.stream_idle_timeout);
        let dispatcher = ChatDispatcher::new(PersonaRegistry::new(), Arc::new(pipeline));
        let state = AppState::new(
            Arc::new(dispatcher),
            services.log_store,
            config.app.clone(),
        );

        Self { config, state }
    }

    /// Construct an app backed by OpenAI from an explicit configuration.
    pub fn new(config: Config) -> Result<Self> {
        // Reuse one HTTP connection pool across provider clients.
        let http_client = reqwest::Client::new();

        let chat = OpenAiChatClient::new_with_client(&config.llm, http_client.clone())?;
        info!("Chat provider: OpenAI (model: {})", config.llm.model);

        let image = OpenAiImageClient::new_with_client(&config.image, http_client);
        info!("Image provider: OpenAI (model: {})", config.image.model);

        let log_store: Option<Arc<dyn LogStore>> = if config.logs.enabled {
            info!(
                "Request logging enabled (retention: {}s, max entries: {})",
                config.logs.ttl.as_secs(),
                config.logs.max_entries
            );
            Some(Arc::new(InMemoryLogStore::with_capacity(
                config.logs.ttl,
                config.logs.max_entries,
            )))
        } else {
            info!("Request logging disabled");
            None
        };

        Ok(Self::with_services(
            AppServices {
                chat: Arc::new(chat),
                image: Arc::new(image),
                log_store,
            },
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> Router {
        server::create_router(self.state.clone())
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let bind_address = format!("{}:{}", self.config.app.host, self.config.app.port);
        let listener = TcpListener::bind(&bind_address).await?;
        info!("{} listening on http://{}", self.config.app.name, bind_address);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        info!("Server shut down gracefully");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

use super::error::{ApiError, ApiResult};
use super::extract::ApiJson;
use super::state::AppState;
use crate::logs::{self, LogStore};
use crate::models::{ChatRequest, ChatResponse};
use crate::persona::PersonaSummary;
use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const DEFAULT_LOG_LIMIT: usize = 100;

fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to the {}!", state.settings.name),
        "description": state.settings.description,
        "personas": state.dispatcher.available(),
        "version": state.settings.version,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": epoch_seconds(),
        "version": state.settings.version,
    }))
}

pub async fn chat_message(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let handler = state.dispatcher.create_handler(&request.persona)?;
    info!(persona = %request.persona, "Processing chat message");

    let result = handler.run(&request.query).await;

    Ok(Json(ChatResponse {
        response: result.response,
        persona: request.persona,
        image_url: result.image_url,
    }))
}

pub async fn chat_message_stream(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> ApiResult<Response> {
    let handler = state.dispatcher.create_handler(&request.persona)?;
    info!(persona = %request.persona, "Processing streaming chat message");

    let lines = handler
        .run_stream(&request.query)
        .map(|frame| Ok::<_, Infallible>(frame.to_ndjson_line()));

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

pub async fn chat_services(State(state): State<AppState>) -> Json<Value> {
    let registry = state.dispatcher.registry();

    let details: Map<String, Value> = registry
        .definitions()
        .iter()
        .map(|definition| {
            (
                definition.persona.key().to_string(),
                json!(PersonaSummary::from(definition)),
            )
        })
        .collect();

    Json(json!({
        "services": registry.available(),
        "service_details": details,
    }))
}

pub async fn chat_health(State(state): State<AppState>) -> Json<Value> {
    let chat = state.dispatcher.pipeline().chat();
    let model_info = chat.model_info();
    let started = Instant::now();
    let timestamp = epoch_seconds();

    let llm_provider = match chat.validate_connection().await {
        Ok(()) => json!({
            "status": "healthy",
            "provider": model_info.provider,
            "model": model_info.model,
            "response_time": started.elapsed().as_secs_f64(),
            "timestamp": timestamp,
        }),
        Err(e) => json!({
            "status": "unhealthy",
            "provider": model_info.provider,
            "model": model_info.model,
            "error": e.to_string(),
            "timestamp": epoch_seconds(),
        }),
    };

    let services = state.dispatcher.available();
    Json(json!({
        "status": "healthy",
        "llm_provider": llm_provider,
        "service_count": services.len(),
        "available_services": services,
    }))
}

pub async fn chat_model_info(State(state): State<AppState>) -> Json<Value> {
    let model_info = state.dispatcher.pipeline().chat().model_info();

    Json(json!({
        "model_info": model_info,
        "config": {
            "app_name": state.settings.name,
            "app_version": state.settings.version,
            "debug": state.settings.debug,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub request_id: Option<String>,
    pub path: Option<String>,
    pub limit: Option<usize>,
}

fn require_store(state: &AppState) -> ApiResult<&Arc<dyn LogStore>> {
    state
        .log_store
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Request logging is disabled"))
}

pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Value>> {
    let store = require_store(&state)?;

    if let Some(request_id) = query.request_id {
        let exchange = logs::find_exchange(&**store, &request_id)
            .await
            .map_err(|e| ApiError::internal(format!("Error retrieving logs: {}", e)))?
            .ok_or_else(|| {
                ApiError::not_found(format!("No logs found for request ID: {}", request_id))
            })?;
        return Ok(Json(json!(exchange)));
    }

    let exchanges = logs::recent_exchanges(
        &**store,
        query.path.as_deref(),
        query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
    )
    .await
    .map_err(|e| ApiError::internal(format!("Error retrieving logs: {}", e)))?;

    Ok(Json(json!(exchanges)))
}

pub async fn clear_logs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let store = require_store(&state)?;

    let cleared = logs::clear_all(&**store)
        .await
        .map_err(|e| ApiError::internal(format!("Error clearing logs: {}", e)))?;

    Ok(Json(json!({
        "message": format!("Cleared {} log entries", cleared)
    })))
}

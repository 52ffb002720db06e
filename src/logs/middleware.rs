use super::{LogEntry, LogStore, RequestLog, ResponseLog};
use crate::server::ApiError;
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Matches axum's default extractor limit.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;
const MAX_RAW_RESPONSE_CHARS: usize = 1000;

/// Middleware recording every exchange in the log store.
///
/// Store writes run in spawned tasks so a slow or failing store never
/// delays or fails the request itself.
pub async fn record_exchange(
    State(store): State<Arc<dyn LogStore>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(request_id = %request_id, "Failed to read request body: {}", e);
            return ApiError::payload_too_large("Failed to read request body").into_response();
        }
    };

    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();

    spawn_write(
        store.clone(),
        LogEntry::Request(RequestLog {
            request_id: request_id.clone(),
            method: method.clone(),
            path: path.clone(),
            query_params: Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
                .map(|Query(params)| params)
                .unwrap_or_default(),
            headers: header_snapshot(&parts.headers),
            client_ip,
            body: request_body_snapshot(&bytes),
            timestamp: Utc::now(),
        }),
    );

    let response = next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await;

    let (mut parts, body) = response.into_parts();
    let (body, body_log) = if is_ndjson(&parts.headers) {
        (body, json!({ "streamed": true }))
    } else {
        match to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                let snapshot = response_body_snapshot(&bytes);
                (Body::from(bytes), snapshot)
            }
            Err(e) => {
                warn!(request_id = %request_id, "Failed to read response body: {}", e);
                (
                    Body::empty(),
                    json!({ "error": "Failed to read response body" }),
                )
            }
        }
    };

    let process_time = started.elapsed().as_secs_f64();
    let status = parts.status.as_u16();

    spawn_write(
        store,
        LogEntry::Response(ResponseLog {
            request_id: request_id.clone(),
            status_code: status,
            headers: header_snapshot(&parts.headers),
            body: body_log,
            process_time,
            timestamp: Utc::now(),
        }),
    );

    info!(
        "RequestID: {} | Method: {} | Path: {} | Status: {} | Duration: {:.3}s",
        request_id, method, path, status, process_time
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}

fn spawn_write(store: Arc<dyn LogStore>, entry: LogEntry) {
    tokio::spawn(async move {
        if let Err(e) = store.put(entry).await {
            warn!("Failed to store log entry: {}", e);
        }
    });
}

fn is_ndjson(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-ndjson"))
}

fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = if name == AUTHORIZATION {
                "[redacted]"
            } else {
                value.to_str().ok()?
            };
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn request_body_snapshot(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return json!({});
    }
    let text = String::from_utf8_lossy(bytes);
    serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }))
}

fn response_body_snapshot(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return json!({});
    }
    let text = String::from_utf8_lossy(bytes);
    serde_json::from_str(&text).unwrap_or_else(|_| {
        let mut raw: String = text.chars().take(MAX_RAW_RESPONSE_CHARS).collect();
        if text.chars().count() > MAX_RAW_RESPONSE_CHARS {
            raw.push_str("...");
        }
        json!({ "raw": raw })
    })
}

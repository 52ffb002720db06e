//! Request/response log store
//!
//! Every HTTP exchange is recorded as two entries, `request:<id>` and
//! `response:<id>`, which expire after the configured retention window.

pub mod memory;
pub mod middleware;

pub use memory::{InMemoryLogStore, DEFAULT_MAX_ENTRIES};
pub use middleware::record_exchange;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const REQUEST_PREFIX: &str = "request:";
pub const RESPONSE_PREFIX: &str = "response:";

pub fn request_key(request_id: &str) -> String {
    format!("{}{}", REQUEST_PREFIX, request_id)
}

pub fn response_key(request_id: &str) -> String {
    format!("{}{}", RESPONSE_PREFIX, request_id)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestLog {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub query_params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub client_ip: Option<String>,
    pub body: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseLog {
    pub request_id: String,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Seconds between receiving the request and producing the response.
    pub process_time: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LogEntry {
    Request(RequestLog),
    Response(ResponseLog),
}

impl LogEntry {
    pub fn key(&self) -> String {
        match self {
            LogEntry::Request(log) => request_key(&log.request_id),
            LogEntry::Response(log) => response_key(&log.request_id),
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            LogEntry::Request(log) => &log.request_id,
            LogEntry::Response(log) => &log.request_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Request(log) => log.timestamp,
            LogEntry::Response(log) => log.timestamp,
        }
    }
}

/// Expiring key-value storage for log entries.
///
/// Absence (never written or expired) is `Ok(None)`, never an error.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn put(&self, entry: LogEntry) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<LogEntry>>;

    async fn scan(&self, prefix: &str) -> Result<Vec<LogEntry>>;

    /// Returns how many live entries were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}

/// A request entry paired with its response, as served by `GET /logs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogExchange {
    pub request: LogEntry,
    pub response: Option<LogEntry>,
}

/// Look up both halves of one exchange. `None` when the request is unknown.
pub async fn find_exchange(store: &dyn LogStore, request_id: &str) -> Result<Option<LogExchange>> {
    let request = match store.get(&request_key(request_id)).await? {
        Some(entry) => entry,
        None => return Ok(None),
    };
    let response = store.get(&response_key(request_id)).await?;

    Ok(Some(LogExchange { request, response }))
}

/// Newest-first exchanges, optionally restricted to paths containing `path`.
pub async fn recent_exchanges(
    store: &dyn LogStore,
    path: Option<&str>,
    limit: usize,
) -> Result<Vec<LogExchange>> {
    let mut requests: Vec<LogEntry> = store
        .scan(REQUEST_PREFIX)
        .await?
        .into_iter()
        .filter(|entry| match (entry, path) {
            (LogEntry::Request(log), Some(fragment)) => log.path.contains(fragment),
            (LogEntry::Request(_), None) => true,
            (LogEntry::Response(_), _) => false,
        })
        .collect();

    requests.sort_by_key(|entry| std::cmp::Reverse(entry.timestamp()));
    requests.truncate(limit);

    let mut exchanges = Vec::with_capacity(requests.len());
    for request in requests {
        let response = store.get(&response_key(request.request_id())).await?;
        exchanges.push(LogExchange { request, response });
    }

    Ok(exchanges)
}

/// Remove every request and response entry.
pub async fn clear_all(store: &dyn LogStore) -> Result<usize> {
    let requests = store.delete_prefix(REQUEST_PREFIX).await?;
    let responses = store.delete_prefix(RESPONSE_PREFIX).await?;
    Ok(requests + responses)
}

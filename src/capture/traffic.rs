//! Traffic log filled from browser network events

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// A single captured HTTP transaction
#[derive(Debug, Clone, Serialize)]
pub struct TrafficEntry {
    /// Sequence number, starting at 1
    pub id: u64,
    /// Timestamp of the request
    pub started_at: DateTime<Utc>,
    /// Request method
    pub method: String,
    /// Full request URL
    pub url: String,
    /// Request headers
    pub request_headers: Vec<(String, String)>,
    /// Request body (if captured)
    pub request_body: Option<String>,
    /// Response status code (None while no response was seen)
    pub status_code: Option<u16>,
    /// Response status text as reported by the browser
    pub status_text: Option<String>,
    /// Protocol reported for the response, e.g. `h2`
    pub http_version: Option<String>,
    /// Response headers
    pub response_headers: Vec<(String, String)>,
    /// Response MIME type
    pub mime_type: Option<String>,
    /// Response size in bytes as transferred
    pub response_size: u64,
    /// Response body, once loading finished and the browser handed it over
    pub response_body: Option<String>,
    /// Whether `response_body` is base64 (binary content)
    pub response_body_base64: bool,
    /// Time between request and response in milliseconds
    pub elapsed_ms: u64,
}

impl TrafficEntry {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: 0,
            started_at: Utc::now(),
            method: method.into(),
            url: url.into(),
            request_headers: Vec::new(),
            request_body: None,
            status_code: None,
            status_text: None,
            http_version: None,
            response_headers: Vec::new(),
            mime_type: None,
            response_size: 0,
            response_body: None,
            response_body_base64: false,
            elapsed_ms: 0,
        }
    }
}

/// Response half of a transaction
#[derive(Debug, Clone, Default)]
pub struct ResponseRecord {
    pub status: u16,
    pub status_text: String,
    pub protocol: Option<String>,
    pub headers: Vec<(String, String)>,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Default)]
struct TrafficState {
    entries: Vec<TrafficEntry>,
    /// Browser request id -> index of its latest entry and send time
    pending: HashMap<String, (usize, Instant)>,
}

/// Thread-safe traffic log keyed by the browser's request ids
#[derive(Debug, Clone, Default)]
pub struct TrafficLog {
    state: Arc<Mutex<TrafficState>>,
}

impl TrafficLog {
    /// Create a new empty traffic log
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outgoing request, returns the entry ID. A request id seen
    /// again (redirect hop) starts a new entry.
    pub fn record_request(&self, request_id: &str, mut entry: TrafficEntry) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        entry.id = state.entries.len() as u64 + 1;
        let id = entry.id;
        let index = state.entries.len();
        state.entries.push(entry);
        state
            .pending
            .insert(request_id.to_string(), (index, Instant::now()));
        id
    }

    /// Attaches a response to the latest entry with this request id.
    /// Returns false if the request was never seen.
    pub fn record_response(&self, request_id: &str, response: ResponseRecord) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(&(index, sent_at)) = state.pending.get(request_id) else {
            return false;
        };
        let Some(entry) = state.entries.get_mut(index) else {
            return false;
        };
        entry.status_code = Some(response.status);
        entry.status_text = Some(response.status_text);
        entry.http_version = response.protocol;
        entry.response_headers = response.headers;
        entry.mime_type = Some(response.mime_type);
        entry.response_size = response.size;
        entry.elapsed_ms = sent_at.elapsed().as_millis() as u64;
        true
    }

    /// Attaches a response body to the latest entry with this request id.
    /// Returns false if the request was never seen.
    pub fn record_body(&self, request_id: &str, body: String, base64: bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(&(index, _)) = state.pending.get(request_id) else {
            return false;
        };
        let Some(entry) = state.entries.get_mut(index) else {
            return false;
        };
        entry.response_body = Some(body);
        entry.response_body_base64 = base64;
        true
    }

    /// Get all entries in request order
    pub fn entries(&self) -> Vec<TrafficEntry> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clone()
    }

    /// Get the total number of entries
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

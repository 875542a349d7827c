//! HAR 1.2 export for captured traffic
//!
//! The document borrows from the captured entries; nothing is copied until
//! serialization.

use crate::error::Result;
use hyper::StatusCode;
use serde::Serialize;
use url::Url;

use super::traffic::TrafficEntry;

const HAR_VERSION: &str = "1.2";

#[derive(Serialize)]
struct Har<'a> {
    log: Log<'a>,
}

#[derive(Serialize)]
struct Log<'a> {
    version: &'static str,
    creator: Creator,
    entries: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Creator {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Entry<'a> {
    started_date_time: String,
    time: f64,
    request: Request<'a>,
    response: Response<'a>,
    cache: Empty,
    timings: Timings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    method: &'a str,
    url: &'a str,
    http_version: &'a str,
    headers: Vec<NameValue<'a>>,
    query_string: Vec<NameValue<'a>>,
    headers_size: i64,
    body_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_data: Option<PostData<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Response<'a> {
    status: u16,
    status_text: &'a str,
    http_version: &'a str,
    headers: Vec<NameValue<'a>>,
    content: Content<'a>,
    #[serde(rename = "redirectURL")]
    redirect_url: &'a str,
    headers_size: i64,
    body_size: i64,
}

#[derive(Serialize)]
struct NameValue<'a> {
    name: std::borrow::Cow<'a, str>,
    value: std::borrow::Cow<'a, str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostData<'a> {
    mime_type: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Content<'a> {
    size: i64,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct Timings {
    send: f64,
    wait: f64,
    receive: f64,
}

/// Serializes traffic entries as a pretty-printed HAR 1.2 document
pub fn to_har(entries: &[TrafficEntry]) -> Result<Vec<u8>> {
    let har = Har {
        log: Log {
            version: HAR_VERSION,
            creator: Creator {
                name: "utc",
                version: env!("CARGO_PKG_VERSION"),
            },
            entries: entries.iter().map(to_entry).collect(),
        },
    };
    Ok(serde_json::to_vec_pretty(&har)?)
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn pairs(headers: &[(String, String)]) -> Vec<NameValue<'_>> {
    headers
        .iter()
        .map(|(name, value)| NameValue {
            name: name.as_str().into(),
            value: value.as_str().into(),
        })
        .collect()
}

fn query_pairs(url: &str) -> Vec<NameValue<'static>> {
    let Ok(parsed) = Url::parse(url) else {
        return Vec::new();
    };
    parsed
        .query_pairs()
        .map(|(name, value)| NameValue {
            name: name.into_owned().into(),
            value: value.into_owned().into(),
        })
        .collect()
}

/// Reason phrase for a status; empty while no response has been seen
fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("")
}

fn to_entry(entry: &TrafficEntry) -> Entry<'_> {
    let status = entry.status_code.unwrap_or(0);
    let http_version = entry.http_version.as_deref().unwrap_or("HTTP/1.1");
    let elapsed = entry.elapsed_ms as f64;
    let response_size = entry.response_size as i64;

    let post_data = entry.request_body.as_deref().map(|text| PostData {
        mime_type: find_header(&entry.request_headers, "content-type")
            .unwrap_or("application/x-www-form-urlencoded"),
        text,
    });

    Entry {
        started_date_time: entry.started_at.to_rfc3339(),
        time: elapsed,
        request: Request {
            method: &entry.method,
            url: &entry.url,
            http_version,
            headers: pairs(&entry.request_headers),
            query_string: query_pairs(&entry.url),
            headers_size: -1,
            body_size: entry.request_body.as_ref().map_or(-1, |b| b.len() as i64),
            post_data,
        },
        response: Response {
            status,
            status_text: entry
                .status_text
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| reason_phrase(status)),
            http_version,
            headers: pairs(&entry.response_headers),
            content: Content {
                size: response_size,
                mime_type: entry
                    .mime_type
                    .as_deref()
                    .or_else(|| find_header(&entry.response_headers, "content-type"))
                    .unwrap_or("application/octet-stream"),
                text: entry.response_body.as_deref(),
                encoding: entry
                    .response_body
                    .as_ref()
                    .filter(|_| entry.response_body_base64)
                    .map(|_| "base64"),
            },
            redirect_url: find_header(&entry.response_headers, "location").unwrap_or(""),
            headers_size: -1,
            body_size: response_size,
        },
        cache: Empty {},
        timings: Timings {
            send: 0.0,
            wait: elapsed,
            receive: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn har_document_has_log_and_entries() {
        let mut entry = TrafficEntry::new("GET", "https://example.com/search?q=rust&page=2");
        entry.status_code = Some(302);
        entry.response_headers = vec![("Location".to_string(), "/results".to_string())];

        let bytes = to_har(&[entry]).expect("har");
        let har: serde_json::Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(har["log"]["version"], "1.2");
        let first = &har["log"]["entries"][0];
        assert_eq!(first["request"]["method"], "GET");
        assert_eq!(first["request"]["queryString"][0]["name"], "q");
        assert_eq!(first["request"]["queryString"][1]["value"], "2");
        assert_eq!(first["response"]["status"], 302);
        assert_eq!(first["response"]["statusText"], "Found");
        assert_eq!(first["response"]["redirectURL"], "/results");
    }

    #[test]
    fn pending_request_has_zero_status() {
        let entry = TrafficEntry::new("POST", "https://example.com/api");
        let bytes = to_har(&[entry]).expect("har");
        let har: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(har["log"]["entries"][0]["response"]["status"], 0);
        assert_eq!(har["log"]["entries"][0]["response"]["statusText"], "");
        assert_eq!(har["log"]["entries"][0]["request"]["bodySize"], -1);
    }

    #[test]
    fn response_body_becomes_content_text() {
        let mut page = TrafficEntry::new("GET", "https://example.com/");
        page.status_code = Some(200);
        page.mime_type = Some("text/html".to_string());
        page.response_body = Some("<html></html>".to_string());

        let mut image = TrafficEntry::new("GET", "https://example.com/logo.png");
        image.status_code = Some(200);
        image.response_body = Some("iVBORw0KGgo=".to_string());
        image.response_body_base64 = true;

        let bytes = to_har(&[page, image]).expect("har");
        let har: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        let entries = &har["log"]["entries"];

        assert_eq!(entries[0]["response"]["content"]["text"], "<html></html>");
        assert!(entries[0]["response"]["content"].get("encoding").is_none());
        assert_eq!(entries[1]["response"]["content"]["text"], "iVBORw0KGgo=");
        assert_eq!(entries[1]["response"]["content"]["encoding"], "base64");
    }

    #[test]
    fn missing_body_omits_content_text() {
        let entry = TrafficEntry::new("GET", "https://example.com/stream");
        let bytes = to_har(&[entry]).expect("har");
        let har: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        let content = &har["log"]["entries"][0]["response"]["content"];
        assert!(content.get("text").is_none());
        assert!(content.get("encoding").is_none());
    }
}

//! HAR 1.2 serialization for captured network traffic (spec.md §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NetworkLogEntry {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub request_headers: HashMap<String, String>,
    pub response_headers: HashMap<String, String>,
    pub request_body: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarLog {
    pub log: HarLogBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarLogBody {
    pub version: String,
    pub creator: HarCreator,
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarCreator {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarEntry {
    #[serde(rename = "startedDateTime")]
    pub started_date_time: String,
    pub time: f64,
    pub request: HarRequest,
    pub response: HarResponse,
    pub timings: HarTimings,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<HarHeader>,
    #[serde(rename = "postData", skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarPostData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarResponse {
    pub status: u16,
    pub headers: Vec<HarHeader>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarTimings {
    pub wait: f64,
}

/// Converts an in-memory log of paired request/response entries into a
/// HAR 1.2 document.
pub fn to_har(entries: &[NetworkLogEntry]) -> HarLog {
    let har_entries = entries
        .iter()
        .map(|entry| HarEntry {
            started_date_time: entry.timestamp.to_rfc3339(),
            time: entry.duration.as_secs_f64() * 1000.0,
            request: HarRequest {
                method: entry.method.clone(),
                url: entry.url.clone(),
                headers: headers_to_har(&entry.request_headers),
                post_data: entry.request_body.as_ref().map(|body| HarPostData {
                    mime_type: "application/octet-stream".to_string(),
                    text: body.clone(),
                }),
            },
            response: HarResponse {
                status: entry.status,
                headers: headers_to_har(&entry.response_headers),
            },
            timings: HarTimings {
                wait: entry.duration.as_secs_f64() * 1000.0,
            },
        })
        .collect();

    HarLog {
        log: HarLogBody {
            version: "1.2".to_string(),
            creator: HarCreator {
                name: "AutoQA Artifact Capture".to_string(),
                version: "1.0.0".to_string(),
            },
            entries: har_entries,
        },
    }
}

fn headers_to_har(headers: &HashMap<String, String>) -> Vec<HarHeader> {
    let mut pairs: Vec<HarHeader> = headers
        .iter()
        .map(|(name, value)| HarHeader {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();
    pairs.sort_by(|a, b| a.name.cmp(&b.name));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_creator_block_exactly() {
        let har = to_har(&[]);
        let json = serde_json::to_value(&har).unwrap();
        assert_eq!(json["log"]["version"], "1.2");
        assert_eq!(json["log"]["creator"]["name"], "AutoQA Artifact Capture");
        assert_eq!(json["log"]["creator"]["version"], "1.0.0");
    }

    #[test]
    fn round_trips_a_single_entry() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        let entries = vec![NetworkLogEntry {
            url: "https://example.com".to_string(),
            method: "GET".to_string(),
            status: 200,
            request_headers: HashMap::new(),
            response_headers: headers,
            request_body: None,
            timestamp: Utc::now(),
            duration: Duration::from_millis(150),
        }];
        let har = to_har(&entries);
        assert_eq!(har.log.entries.len(), 1);
        assert_eq!(har.log.entries[0].response.status, 200);
        assert!((har.log.entries[0].time - 150.0).abs() < 0.001);
    }
}

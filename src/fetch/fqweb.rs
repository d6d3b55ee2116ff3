//! Single-chapter adapter for the fqweb relay.
//!
//! `GET {base}/chapter?item_id={id}` answers a flat envelope
//! `{data: {code: "0", content, chapter_title?}}` — string status code and no
//! inner payload object, unlike the jingluo schema.

use super::{ApiClient, FetchError, FetchedChapter, SingleSource};
use serde::Deserialize;

const NAME: &str = "fqweb";
pub const DEFAULT_BASE_URL: &str = "http://fqweb.jingluo.love";

/// fqweb relay adapter.
pub struct FqwebSource {
    base_url: String,
}

impl FqwebSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for FqwebSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Inner>,
}

#[derive(Debug, Deserialize)]
struct Inner {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    chapter_title: Option<String>,
}

/// Decode a response body into the raw chapter payload.
fn parse_response(body: &str, id: &str) -> Result<FetchedChapter, FetchError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            endpoint: NAME.to_string(),
            reason: e.to_string(),
        })?;
    let inner = envelope.data.ok_or_else(|| FetchError::MalformedResponse {
        endpoint: NAME.to_string(),
        reason: "missing data field".to_string(),
    })?;
    match inner.code.as_deref() {
        Some("0") | None => {}
        Some(code) => {
            return Err(FetchError::MalformedResponse {
                endpoint: NAME.to_string(),
                reason: format!("api code {}", code),
            });
        }
    }
    if inner.content.trim().is_empty() {
        return Err(FetchError::EmptyContent {
            endpoint: NAME.to_string(),
            id: id.to_string(),
        });
    }
    Ok(FetchedChapter {
        title: inner.chapter_title.filter(|t| !t.trim().is_empty()),
        content: inner.content,
    })
}

impl SingleSource for FqwebSource {
    fn fetch_chapter(&self, client: &ApiClient, id: &str) -> Result<FetchedChapter, FetchError> {
        let url = format!("{}/chapter?item_id={}", self.base_url, id);
        let response = client.get(&url).map_err(|e| FetchError::Network {
            url: url.clone(),
            source: e,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                endpoint: NAME.to_string(),
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().map_err(|e| FetchError::BodyRead {
            endpoint: NAME.to_string(),
            source: e,
        })?;
        parse_response(&body, id)
    }
}

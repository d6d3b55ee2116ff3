//! Batch adapter for the bulk content API.
//!
//! `POST {base}/api/batch` with `{"item_ids": [...]}` answers
//! `{code, data: {id: {title, content}, ...}}`. The response map may cover any
//! subset of the requested ids; callers treat missing entries as per-id
//! failures. An optional access token is sent as an Authorization header.

use super::{ApiClient, BatchSource, FetchError, FetchedChapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NAME: &str = "batch-api";
pub const DEFAULT_BASE_URL: &str = "http://api.jingluo.love";

/// Bulk content API adapter.
pub struct BatchApiSource {
    base_url: String,
    token: Option<String>,
}

impl BatchApiSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
        }
    }
}

impl Default for BatchApiSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    item_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: Option<HashMap<String, Item>>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
}

/// Decode a response body into an id → payload map.
fn parse_response(body: &str) -> Result<HashMap<String, FetchedChapter>, FetchError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            endpoint: NAME.to_string(),
            reason: e.to_string(),
        })?;
    if envelope.code != 0 {
        return Err(FetchError::MalformedResponse {
            endpoint: NAME.to_string(),
            reason: format!(
                "api code {}{}",
                envelope.code,
                envelope
                    .msg
                    .as_deref()
                    .map(|m| format!(": {}", m))
                    .unwrap_or_default()
            ),
        });
    }
    let data = envelope.data.ok_or_else(|| FetchError::MalformedResponse {
        endpoint: NAME.to_string(),
        reason: "missing data field".to_string(),
    })?;
    Ok(data
        .into_iter()
        .map(|(id, item)| {
            (
                id,
                FetchedChapter {
                    title: item.title.filter(|t| !t.trim().is_empty()),
                    content: item.content,
                },
            )
        })
        .collect())
}

impl BatchSource for BatchApiSource {
    fn fetch_batch(
        &self,
        client: &ApiClient,
        ids: &[String],
    ) -> Result<HashMap<String, FetchedChapter>, FetchError> {
        let url = format!("{}/api/batch", self.base_url);
        let request = Request { item_ids: ids };
        let response = client
            .post_json(&url, &request, self.token.as_deref())
            .map_err(|e| FetchError::Network {
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
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_map() -> Result<(), FetchError> {
        let body = r#"{
            "code": 0,
            "data": {
                "7101": {"title": "第1章", "content": "<p>一</p>"},
                "7103": {"content": "<p>三</p>"}
            }
        }"#;
        let map = parse_response(body)?;
        assert_eq!(map.len(), 2);
        assert_eq!(map["7101"].title.as_deref(), Some("第1章"));
        assert!(map["7103"].title.is_none());
        assert!(!map.contains_key("7102"));
        Ok(())
    }

    #[test]
    fn empty_map_is_valid() -> Result<(), FetchError> {
        let map = parse_response(r#"{"code":0,"data":{}}"#)?;
        assert!(map.is_empty());
        Ok(())
    }

    #[test]
    fn nonzero_code_is_malformed() {
        let body = r#"{"code":5,"msg":"rate limited"}"#;
        let err = parse_response(body).unwrap_err();
        match err {
            FetchError::MalformedResponse { reason, .. } => {
                assert!(reason.contains("rate limited"));
            }
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn missing_data_is_malformed() {
        assert!(matches!(
            parse_response(r#"{"code":0}"#),
            Err(FetchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn request_body_shape() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let json = serde_json::to_string(&Request { item_ids: &ids }).unwrap();
        assert_eq!(json, r#"{"item_ids":["a","b"]}"#);
    }
}

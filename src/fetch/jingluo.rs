//! Single-chapter adapter for the jingluo content relay.
//!
//! `GET {base}/content?item_id={id}` answers `{code, data: {content, title?}}`
//! with `code == 0` on success.

use super::{ApiClient, FetchError, FetchedChapter, SingleSource};
use serde::Deserialize;

const NAME: &str = "jingluo";
pub const DEFAULT_BASE_URL: &str = "http://fan.jingluo.love";

/// jingluo relay adapter. The base URL is configurable because the relay moves
/// hosts from time to time.
pub struct JingluoSource {
    base_url: String,
}

impl JingluoSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for JingluoSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: Option<Payload>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    title: Option<String>,
}

/// Decode a response body into the raw chapter payload.
fn parse_response(body: &str, id: &str) -> Result<FetchedChapter, FetchError> {
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
    let payload = envelope.data.ok_or_else(|| FetchError::MalformedResponse {
        endpoint: NAME.to_string(),
        reason: "missing data field".to_string(),
    })?;
    if payload.content.trim().is_empty() {
        return Err(FetchError::EmptyContent {
            endpoint: NAME.to_string(),
            id: id.to_string(),
        });
    }
    Ok(FetchedChapter {
        title: payload.title.filter(|t| !t.trim().is_empty()),
        content: payload.content,
    })
}

impl SingleSource for JingluoSource {
    fn fetch_chapter(&self, client: &ApiClient, id: &str) -> Result<FetchedChapter, FetchError> {
        let url = format!("{}/content?item_id={}", self.base_url, id);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_success_with_title() -> Result<(), FetchError> {
        let body = r#"{"code":0,"data":{"content":"<p>正文</p>","title":"第1章"}}"#;
        let chapter = parse_response(body, "7101")?;
        assert_eq!(chapter.title.as_deref(), Some("第1章"));
        assert_eq!(chapter.content, "<p>正文</p>");
        Ok(())
    }

    #[test]
    fn parse_success_without_title() -> Result<(), FetchError> {
        let body = r#"{"code":0,"data":{"content":"正文"}}"#;
        let chapter = parse_response(body, "7101")?;
        assert!(chapter.title.is_none());
        Ok(())
    }

    #[test]
    fn nonzero_code_is_malformed() {
        let body = r#"{"code":110,"msg":"book offline"}"#;
        let err = parse_response(body, "7101").unwrap_err();
        match err {
            FetchError::MalformedResponse { endpoint, reason } => {
                assert_eq!(endpoint, "jingluo");
                assert!(reason.contains("110"));
                assert!(reason.contains("book offline"));
            }
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn blank_content_is_empty_content() {
        let body = r#"{"code":0,"data":{"content":"   "}}"#;
        assert!(matches!(
            parse_response(body, "7101"),
            Err(FetchError::EmptyContent { id, .. }) if id == "7101"
        ));
    }

    #[test]
    fn missing_data_is_malformed() {
        let body = r#"{"code":0}"#;
        assert!(matches!(
            parse_response(body, "7101"),
            Err(FetchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_response("<html>gateway error</html>", "7101"),
            Err(FetchError::MalformedResponse { .. })
        ));
    }
}

//! Shared error type for content-source fetching.
//!
//! Every variant except [FetchError::NoEndpoints] describes a per-chapter,
//! retryable outcome; the retry coordinator feeds the affected ids back into
//! the next round.

use thiserror::Error;

/// Fetch error for HTTP transport, response decoding, and per-source cases.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {endpoint} at {url}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        url: String,
    },

    #[error("Failed to read response body from {endpoint}: {source}")]
    BodyRead {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("{endpoint} returned no content for chapter {id}.")]
    EmptyContent { endpoint: String, id: String },

    #[error("No content endpoints are registered; nothing can be fetched.")]
    NoEndpoints,
}

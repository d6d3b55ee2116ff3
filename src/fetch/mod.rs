//! Content-source adapters and fetch strategies. Adapter traits, shared
//! client, endpoint registry, and the batch/single fetchers.

mod batch;
mod client;
mod error;
mod registry;
mod single;

pub mod batch_api;
pub mod fqweb;
pub mod jingluo;

pub use batch::{fetch_batch, BatchOutcome};
pub use client::{ApiClient, ApiClientBuilder};
pub use error::FetchError;
pub use registry::{BatchEndpoint, HealthSnapshot, Registry, RegistryBuilder, SingleEndpoint};
pub use single::fetch_single;

use std::collections::HashMap;

/// Raw chapter payload returned by a source adapter, before cleanup.
#[derive(Debug, Clone)]
pub struct FetchedChapter {
    /// Title reported by the source, when its envelope carries one.
    pub title: Option<String>,
    /// Raw (possibly HTML-tagged) chapter content.
    pub content: String,
}

/// A source able to return exactly one chapter per request.
///
/// Each adapter owns its response-envelope schema and normalizes it into
/// [FetchedChapter]; adding a source means adding an adapter, not editing a
/// dispatch chain.
pub trait SingleSource: Send + Sync {
    fn fetch_chapter(&self, client: &ApiClient, id: &str) -> Result<FetchedChapter, FetchError>;
}

/// A source able to return many chapters in a single request.
///
/// The returned map may cover any subset of the requested ids; the batch
/// fetcher treats missing or empty entries as per-id failures.
pub trait BatchSource: Send + Sync {
    fn fetch_batch(
        &self,
        client: &ApiClient,
        ids: &[String],
    ) -> Result<HashMap<String, FetchedChapter>, FetchError>;
}

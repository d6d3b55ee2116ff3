//! Ordered catalog of content endpoints with advisory health counters.
//!
//! Endpoint order is fixed at construction and is the fallback priority used
//! by the single fetcher. Health counters are updated by the fetchers after
//! every attempt but never consulted to reorder or exclude endpoints; they
//! feed the diagnostic report only.

use super::error::FetchError;
use super::{BatchSource, SingleSource};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Sentinel for "no request observed yet" in the latency counter.
const NO_LATENCY: u64 = u64::MAX;

/// Mutable health telemetry for one endpoint. Atomics so worker threads can
/// record through a shared reference.
#[derive(Debug)]
struct Health {
    consecutive_errors: AtomicU32,
    total_errors: AtomicU64,
    last_latency_ms: AtomicU64,
}

impl Health {
    fn new() -> Self {
        Self {
            consecutive_errors: AtomicU32::new(0),
            total_errors: AtomicU64::new(0),
            last_latency_ms: AtomicU64::new(NO_LATENCY),
        }
    }

    fn record_success(&self, latency: Duration) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
        self.last_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.consecutive_errors.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> (u32, u64, Option<u64>) {
        let latency = match self.last_latency_ms.load(Ordering::Relaxed) {
            NO_LATENCY => None,
            ms => Some(ms),
        };
        (
            self.consecutive_errors.load(Ordering::Relaxed),
            self.total_errors.load(Ordering::Relaxed),
            latency,
        )
    }
}

/// Point-in-time view of one endpoint's health counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub name: String,
    pub capability: &'static str,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub last_latency_ms: Option<u64>,
}

/// A registered single-chapter endpoint: adapter plus health counters.
pub struct SingleEndpoint {
    name: String,
    adapter: Box<dyn SingleSource>,
    health: Health,
}

impl SingleEndpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adapter passthrough. Callers record the outcome afterwards.
    pub fn fetch_chapter(
        &self,
        client: &super::ApiClient,
        id: &str,
    ) -> Result<super::FetchedChapter, FetchError> {
        self.adapter.fetch_chapter(client, id)
    }

    pub fn record_success(&self, latency: Duration) {
        self.health.record_success(latency);
    }

    pub fn record_failure(&self) {
        self.health.record_failure();
    }
}

/// The registered batch-capable endpoint: adapter plus health counters.
pub struct BatchEndpoint {
    name: String,
    adapter: Box<dyn BatchSource>,
    health: Health,
}

impl BatchEndpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adapter passthrough. Callers record the outcome afterwards.
    pub fn fetch_batch(
        &self,
        client: &super::ApiClient,
        ids: &[String],
    ) -> Result<std::collections::HashMap<String, super::FetchedChapter>, FetchError> {
        self.adapter.fetch_batch(client, ids)
    }

    pub fn record_success(&self, latency: Duration) {
        self.health.record_success(latency);
    }

    pub fn record_failure(&self) {
        self.health.record_failure();
    }
}

/// Ordered catalog of content endpoints. Read-only after construction apart
/// from the health counters.
pub struct Registry {
    batch: Option<BatchEndpoint>,
    single: Vec<SingleEndpoint>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Single-chapter endpoints in registration (fallback-priority) order.
    pub fn single_endpoints(&self) -> &[SingleEndpoint] {
        &self.single
    }

    /// The batch-capable endpoint, if one is registered.
    pub fn batch_endpoint(&self) -> Option<&BatchEndpoint> {
        self.batch.as_ref()
    }

    /// Health counters for every endpoint, batch first. Diagnostic only.
    pub fn health_report(&self) -> Vec<HealthSnapshot> {
        let mut report = Vec::new();
        if let Some(batch) = &self.batch {
            let (consecutive, total, latency) = batch.health.snapshot();
            report.push(HealthSnapshot {
                name: batch.name.clone(),
                capability: "batch",
                consecutive_errors: consecutive,
                total_errors: total,
                last_latency_ms: latency,
            });
        }
        for endpoint in &self.single {
            let (consecutive, total, latency) = endpoint.health.snapshot();
            report.push(HealthSnapshot {
                name: endpoint.name.clone(),
                capability: "single",
                consecutive_errors: consecutive,
                total_errors: total,
                last_latency_ms: latency,
            });
        }
        report
    }
}

/// Builder for [Registry]. Construction fails when no endpoint is registered:
/// with neither a batch nor a single source there is no fetch strategy.
#[derive(Default)]
pub struct RegistryBuilder {
    batch: Option<BatchEndpoint>,
    single: Vec<SingleEndpoint>,
}

impl RegistryBuilder {
    /// Register the batch-capable endpoint. Last call wins.
    pub fn batch(mut self, name: impl Into<String>, adapter: Box<dyn BatchSource>) -> Self {
        self.batch = Some(BatchEndpoint {
            name: name.into(),
            adapter,
            health: Health::new(),
        });
        self
    }

    /// Append a single-chapter endpoint; registration order is fallback order.
    pub fn single(mut self, name: impl Into<String>, adapter: Box<dyn SingleSource>) -> Self {
        self.single.push(SingleEndpoint {
            name: name.into(),
            adapter,
            health: Health::new(),
        });
        self
    }

    pub fn build(self) -> Result<Registry, FetchError> {
        if self.batch.is_none() && self.single.is_empty() {
            return Err(FetchError::NoEndpoints);
        }
        Ok(Registry {
            batch: self.batch,
            single: self.single,
        })
    }
}

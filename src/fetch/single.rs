//! Single-chapter fetch strategy: walk the registry's single endpoints in
//! priority order until one yields usable content.

use super::registry::Registry;
use super::ApiClient;
use crate::model::{ChapterResult, ChapterTask};
use crate::text::clean_content;
use std::time::Instant;

/// Fetch one chapter through the fallback chain. First success wins; the
/// remaining endpoints are not tried. Returns `None` when every endpoint is
/// exhausted — a normal, retryable outcome for the coordinator.
pub fn fetch_single(
    client: &ApiClient,
    registry: &Registry,
    task: &ChapterTask,
    indent: &str,
) -> Option<ChapterResult> {
    for endpoint in registry.single_endpoints() {
        let started = Instant::now();
        match endpoint.fetch_chapter(client, &task.id) {
            Ok(raw) => {
                let content = clean_content(&raw.content, indent);
                if content.is_empty() {
                    endpoint.record_failure();
                    continue;
                }
                endpoint.record_success(started.elapsed());
                return Some(ChapterResult {
                    id: task.id.clone(),
                    index: task.index,
                    title: task.title.clone(),
                    source_title: raw.title,
                    content,
                    source: endpoint.name().to_string(),
                });
            }
            Err(_) => endpoint.record_failure(),
        }
    }
    None
}

//! Batch fetch strategy: fixed-size slicing into groups and concurrent
//! sub-chunk requests, merged into per-id successes and failures.

use super::registry::BatchEndpoint;
use super::{ApiClient, FetchedChapter};
use crate::model::{ChapterResult, ChapterTask};
use crate::text::clean_content;
use std::collections::HashMap;
use std::time::Instant;

/// Outcome of one batch pass: cleaned results plus the tasks that must fall
/// back to single fetching.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub fetched: Vec<ChapterResult>,
    pub failed: Vec<ChapterTask>,
}

/// Fetch `tasks` through the batch endpoint.
///
/// Ids are sliced into consecutive groups of at most `batch_size`; each group
/// is split into at most `workers` sub-chunks of roughly equal size and one
/// request is issued per sub-chunk on its own thread. A sub-chunk whose
/// request fails contributes all of its ids as failures; it never aborts the
/// whole batch. Slicing is purely positional — results are keyed by id, so
/// order within a group has no effect.
pub fn fetch_batch(
    client: &ApiClient,
    endpoint: &BatchEndpoint,
    tasks: &[ChapterTask],
    batch_size: usize,
    workers: usize,
    indent: &str,
) -> BatchOutcome {
    let batch_size = batch_size.max(1);
    let workers = workers.max(1);
    let mut outcome = BatchOutcome::default();

    for group in tasks.chunks(batch_size) {
        let per_chunk = group.len().div_ceil(workers).max(1);
        let sub_chunks: Vec<&[ChapterTask]> = group.chunks(per_chunk).collect();

        let responses: Vec<Option<HashMap<String, FetchedChapter>>> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = sub_chunks
                    .iter()
                    .map(|chunk| {
                        scope.spawn(move || {
                            let ids: Vec<String> =
                                chunk.iter().map(|t| t.id.clone()).collect();
                            let started = Instant::now();
                            match endpoint.fetch_batch(client, &ids) {
                                Ok(map) => {
                                    endpoint.record_success(started.elapsed());
                                    Some(map)
                                }
                                Err(_) => {
                                    endpoint.record_failure();
                                    None
                                }
                            }
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or(None))
                    .collect()
            });

        let mut merged: HashMap<String, FetchedChapter> = HashMap::new();
        for map in responses.into_iter().flatten() {
            merged.extend(map);
        }

        for task in group {
            match merged.remove(&task.id) {
                Some(raw) if !raw.content.trim().is_empty() => {
                    let content = clean_content(&raw.content, indent);
                    if content.is_empty() {
                        outcome.failed.push(task.clone());
                        continue;
                    }
                    outcome.fetched.push(ChapterResult {
                        id: task.id.clone(),
                        index: task.index,
                        title: task.title.clone(),
                        source_title: raw.title,
                        content,
                        source: endpoint.name().to_string(),
                    });
                }
                _ => outcome.failed.push(task.clone()),
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{BatchSource, FetchError, Registry};
    use std::sync::{Arc, Mutex};

    fn task(id: &str, index: u32) -> ChapterTask {
        ChapterTask {
            id: id.to_string(),
            index,
            title: format!("第{}章", index + 1),
        }
    }

    /// Returns content for every requested id except the configured omissions;
    /// records the size of every request it receives.
    struct PartialBatch {
        omit: Vec<String>,
        request_sizes: Arc<Mutex<Vec<usize>>>,
    }

    impl PartialBatch {
        fn omitting(omit: &[&str]) -> Self {
            Self {
                omit: omit.iter().map(|s| s.to_string()).collect(),
                request_sizes: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl BatchSource for PartialBatch {
        fn fetch_batch(
            &self,
            _: &ApiClient,
            ids: &[String],
        ) -> Result<HashMap<String, FetchedChapter>, FetchError> {
            if let Ok(mut sizes) = self.request_sizes.lock() {
                sizes.push(ids.len());
            }
            Ok(ids
                .iter()
                .filter(|id| !self.omit.contains(id))
                .map(|id| {
                    (
                        id.clone(),
                        FetchedChapter {
                            title: None,
                            content: format!("<p>content {}</p>", id),
                        },
                    )
                })
                .collect())
        }
    }

    struct FailingBatch;
    impl BatchSource for FailingBatch {
        fn fetch_batch(
            &self,
            _: &ApiClient,
            _: &[String],
        ) -> Result<HashMap<String, FetchedChapter>, FetchError> {
            Err(FetchError::HttpStatus {
                endpoint: "bulk".into(),
                status: 502,
                url: "http://example/api/batch".into(),
            })
        }
    }

    fn client() -> ApiClient {
        ApiClient::builder()
            .jitter_ms(0, 0)
            .build()
            .expect("client")
    }

    #[test]
    fn partial_response_fails_exactly_the_missing_ids() {
        let tasks: Vec<ChapterTask> = (0..5).map(|i| task(&format!("c{}", i), i)).collect();
        let registry = Registry::builder()
            .batch("bulk", Box::new(PartialBatch::omitting(&["c2"])))
            .build()
            .expect("registry");
        let endpoint = registry.batch_endpoint().expect("batch endpoint");

        let outcome = fetch_batch(&client(), endpoint, &tasks, 10, 2, "    ");
        assert_eq!(outcome.fetched.len(), 4);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].id, "c2");
    }

    #[test]
    fn results_carry_cleaned_content_and_source_name() {
        let tasks = vec![task("c0", 0)];
        let registry = Registry::builder()
            .batch("bulk", Box::new(PartialBatch::omitting(&[])))
            .build()
            .expect("registry");
        let endpoint = registry.batch_endpoint().expect("batch endpoint");

        let outcome = fetch_batch(&client(), endpoint, &tasks, 4, 2, "    ");
        assert_eq!(outcome.fetched.len(), 1);
        assert_eq!(outcome.fetched[0].content, "    content c0");
        assert_eq!(outcome.fetched[0].source, "bulk");
        assert_eq!(outcome.fetched[0].index, 0);
    }

    #[test]
    fn groups_and_sub_chunks_respect_the_size_bounds() {
        let tasks: Vec<ChapterTask> = (0..10).map(|i| task(&format!("c{}", i), i)).collect();
        let adapter = PartialBatch::omitting(&[]);
        let sizes = Arc::clone(&adapter.request_sizes);
        let registry = Registry::builder()
            .batch("bulk", Box::new(adapter))
            .build()
            .expect("registry");
        let endpoint = registry.batch_endpoint().expect("batch endpoint");

        let outcome = fetch_batch(&client(), endpoint, &tasks, 4, 2, "    ");
        assert_eq!(outcome.fetched.len(), 10);
        assert!(outcome.failed.is_empty());

        // 10 ids in groups of <= 4 (4+4+2), each group in <= 2 sub-chunks of
        // roughly equal size: no request carries more than 2 ids.
        let sizes = sizes.lock().expect("sizes");
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        assert!(sizes.iter().all(|&n| n >= 1 && n <= 2), "sizes: {:?}", sizes);
        let report = registry.health_report();
        assert_eq!(report[0].total_errors, 0);
    }

    #[test]
    fn failed_sub_chunk_fails_its_ids_not_the_batch() {
        let tasks: Vec<ChapterTask> = (0..6).map(|i| task(&format!("c{}", i), i)).collect();
        let registry = Registry::builder()
            .batch("bulk", Box::new(FailingBatch))
            .build()
            .expect("registry");
        let endpoint = registry.batch_endpoint().expect("batch endpoint");

        let outcome = fetch_batch(&client(), endpoint, &tasks, 3, 2, "    ");
        assert!(outcome.fetched.is_empty());
        assert_eq!(outcome.failed.len(), 6);
        let report = registry.health_report();
        assert!(report[0].total_errors >= 2);
    }

    #[test]
    fn markup_only_content_counts_as_failure() {
        struct MarkupOnly;
        impl BatchSource for MarkupOnly {
            fn fetch_batch(
                &self,
                _: &ApiClient,
                ids: &[String],
            ) -> Result<HashMap<String, FetchedChapter>, FetchError> {
                Ok(ids
                    .iter()
                    .map(|id| {
                        (
                            id.clone(),
                            FetchedChapter {
                                title: None,
                                content: "<article></article>".to_string(),
                            },
                        )
                    })
                    .collect())
            }
        }
        let tasks = vec![task("c0", 0)];
        let registry = Registry::builder()
            .batch("bulk", Box::new(MarkupOnly))
            .build()
            .expect("registry");
        let endpoint = registry.batch_endpoint().expect("batch endpoint");

        let outcome = fetch_batch(&client(), endpoint, &tasks, 4, 2, "    ");
        assert!(outcome.fetched.is_empty());
        assert_eq!(outcome.failed.len(), 1);
    }
}

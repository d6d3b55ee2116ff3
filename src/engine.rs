//! Retry coordinator: drives the batch phase and bounded worker-pool rounds
//! over a shrinking to-do set until it is empty, the round cap is reached, or
//! the run is cancelled.
//!
//! Workers never touch shared results directly: each worker reports
//! `(task, outcome)` over a channel to the reducer loop, which owns the
//! assembler and the failure list exclusively. After every round the engine
//! flushes — full document rewrite, resume snapshot, then progress save — so
//! an interrupted run loses at most the round in flight.

use crate::assembler::Assembler;
use crate::fetch::{fetch_batch, fetch_single, ApiClient, Registry};
use crate::model::{BookInfo, ChapterResult, ChapterTask};
use crate::progress::ProgressStore;
use crate::text::DEFAULT_INDENT;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Shared cancellation flag. Checked between rounds and between task pulls;
/// requests already in flight run to completion and their results are kept.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine knobs, merged from config file and CLI flags by the caller.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Worker-pool width for both batch sub-chunks and single-fetch rounds.
    pub workers: usize,
    /// Maximum ids per bulk request group.
    pub batch_size: usize,
    /// Fixed sleep between retry rounds.
    pub round_backoff: Duration,
    /// Round cap for the single-fetch phase. `None` retries until done.
    pub max_rounds: Option<u32>,
    /// Skip the batch phase even when a batch endpoint is registered.
    pub use_batch: bool,
    /// Paragraph indent applied by content cleanup.
    pub indent: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: 5,
            batch_size: 20,
            round_backoff: Duration::from_secs(2),
            max_rounds: None,
            use_batch: true,
            indent: DEFAULT_INDENT.to_string(),
        }
    }
}

/// File locations for one run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// The rendered output document.
    pub output: PathBuf,
    /// Progress file: JSON array of captured chapter ids.
    pub status: PathBuf,
    /// Resume snapshot: the assembler's cumulative result set.
    pub snapshot: PathBuf,
}

/// Per-run observer hooks and cancellation.
pub struct RunOptions<'a> {
    /// Called with (captured, total) as chapters complete.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    pub cancel: CancelToken,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self {
            progress: None,
            cancel: CancelToken::new(),
        }
    }
}

/// What a run accomplished.
#[derive(Debug)]
pub struct RunSummary {
    /// Chapters in the task list handed to the engine.
    pub total: usize,
    /// Chapters already captured before this run started.
    pub already_done: usize,
    /// Chapters resolved during this run.
    pub fetched: usize,
    /// Tasks still unresolved when the run ended.
    pub unresolved: Vec<ChapterTask>,
    /// Single-fetch rounds executed.
    pub rounds: u32,
    pub cancelled: bool,
    /// True when `max_rounds` stopped the run with work remaining.
    pub gave_up: bool,
}

/// Flush failures. Progress-file errors are deliberately absent: they are
/// logged and the in-memory set stays authoritative (the run continues).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write resume snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The chapter acquisition engine. Holds borrowed collaborators; all run
/// state lives on the stack of [Engine::run].
pub struct Engine<'a> {
    client: &'a ApiClient,
    registry: &'a Registry,
    options: EngineOptions,
}

impl<'a> Engine<'a> {
    pub fn new(client: &'a ApiClient, registry: &'a Registry, options: EngineOptions) -> Self {
        Self {
            client,
            registry,
            options,
        }
    }

    /// Acquire every chapter in `tasks` that is not already captured.
    ///
    /// Loads progress and the resume snapshot, runs the batch phase (when a
    /// batch endpoint exists), then single-fetch rounds until the to-do set is
    /// empty, the round cap is hit, or the token is cancelled. When every id
    /// is already captured the run performs zero fetches and leaves all files
    /// untouched.
    pub fn run(
        &self,
        book: &BookInfo,
        tasks: &[ChapterTask],
        paths: &RunPaths,
        run: &RunOptions<'_>,
    ) -> Result<RunSummary, EngineError> {
        let total = tasks.len();
        let mut progress_store = ProgressStore::load(&paths.status);

        // Rehydrate the assembler, then drop progress ids with no snapshot
        // entry behind them so those chapters re-fetch.
        let restored = Assembler::load_snapshot(&paths.snapshot);
        let snapshot_ids: HashSet<&str> = restored.iter().map(|r| r.id.as_str()).collect();
        progress_store.retain(|id| snapshot_ids.contains(id));
        let mut assembler = Assembler::new(book.clone());
        for result in restored {
            assembler.record(result);
        }

        let mut todo: Vec<ChapterTask> = tasks
            .iter()
            .filter(|t| !progress_store.contains(&t.id))
            .cloned()
            .collect();
        let already_done = total - todo.len();
        let mut fetched = 0usize;

        let report = |captured: usize| {
            if let Some(progress) = run.progress {
                progress(captured as u32, total as u32);
            }
        };
        report(already_done);

        if todo.is_empty() {
            return Ok(RunSummary {
                total,
                already_done,
                fetched: 0,
                unresolved: Vec::new(),
                rounds: 0,
                cancelled: run.cancel.is_cancelled(),
                gave_up: false,
            });
        }

        // Batch phase: one pass, failures fall through to the single rounds.
        if self.options.use_batch && !run.cancel.is_cancelled() {
            if let Some(endpoint) = self.registry.batch_endpoint() {
                let outcome = fetch_batch(
                    self.client,
                    endpoint,
                    &todo,
                    self.options.batch_size,
                    self.options.workers,
                    &self.options.indent,
                );
                fetched += outcome.fetched.len();
                for result in outcome.fetched {
                    assembler.record(result);
                }
                todo = outcome.failed;
                self.flush(&assembler, &mut progress_store, paths)?;
                report(already_done + fetched);
            }
        }

        let workers = self.options.workers.max(1);
        let mut rounds = 0u32;
        let mut gave_up = false;

        while !todo.is_empty() {
            if run.cancel.is_cancelled() {
                break;
            }
            if let Some(cap) = self.options.max_rounds {
                if rounds >= cap {
                    gave_up = true;
                    break;
                }
            }
            rounds += 1;

            let queue = Mutex::new(VecDeque::from(todo.clone()));
            let (tx, rx) = mpsc::channel::<(ChapterTask, Option<ChapterResult>)>();
            let mut failures: Vec<ChapterTask> = Vec::new();

            std::thread::scope(|scope| {
                for _ in 0..workers.min(todo.len()) {
                    let tx = tx.clone();
                    let queue = &queue;
                    let cancel = &run.cancel;
                    let client = self.client;
                    let registry = self.registry;
                    let indent = self.options.indent.as_str();
                    scope.spawn(move || loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let task = match queue.lock() {
                            Ok(mut q) => q.pop_front(),
                            Err(_) => None,
                        };
                        let Some(task) = task else { break };
                        let result = fetch_single(client, registry, &task, indent);
                        if tx.send((task, result)).is_err() {
                            break;
                        }
                    });
                }
                drop(tx);

                // Reducer: sole owner of the assembler and failure list.
                for (task, result) in rx {
                    match result {
                        Some(result) => {
                            assembler.record(result);
                            fetched += 1;
                            report(already_done + fetched);
                        }
                        None => failures.push(task),
                    }
                }
            });

            // Tasks never pulled because of cancellation are failures too.
            if let Ok(mut q) = queue.lock() {
                failures.extend(q.drain(..));
            }

            self.flush(&assembler, &mut progress_store, paths)?;
            todo = failures;

            if !todo.is_empty() && !run.cancel.is_cancelled() {
                let capped = self.options.max_rounds.is_some_and(|cap| rounds >= cap);
                if !capped {
                    std::thread::sleep(self.options.round_backoff);
                }
            }
        }

        Ok(RunSummary {
            total,
            already_done,
            fetched,
            unresolved: todo,
            rounds,
            cancelled: run.cancel.is_cancelled(),
            gave_up,
        })
    }

    /// Full rewrite of the output document and snapshot, then progress save.
    /// Ids are marked done only after their content is durably written; a
    /// progress-save failure is logged and the run continues.
    fn flush(
        &self,
        assembler: &Assembler,
        progress: &mut ProgressStore,
        paths: &RunPaths,
    ) -> Result<(), EngineError> {
        std::fs::write(&paths.output, assembler.render()).map_err(|e| EngineError::Output {
            path: paths.output.clone(),
            source: e,
        })?;
        assembler
            .save_snapshot(&paths.snapshot)
            .map_err(|e| EngineError::Snapshot {
                path: paths.snapshot.clone(),
                source: e,
            })?;
        for id in assembler.recorded_ids() {
            progress.mark_done(id);
        }
        if let Err(e) = progress.save() {
            eprintln!("Warning: {}", e);
        }
        Ok(())
    }
}

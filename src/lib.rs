//! tomatodl: CLI downloader for Fanqie (Tomato) web novels. Acquires chapter
//! text from several unreliable content APIs through a batch/single fallback
//! chain with bounded-concurrency retry rounds and resumable progress, and
//! writes one ordered plain-text document.

pub mod assembler;
pub mod cli;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod model;
pub mod progress;
pub mod text;

// Re-exports for CLI and consumers.
pub use assembler::Assembler;
pub use engine::{
    CancelToken, Engine, EngineError, EngineOptions, RunOptions, RunPaths, RunSummary,
};
pub use fetch::{
    ApiClient, ApiClientBuilder, BatchSource, FetchError, FetchedChapter, Registry, SingleSource,
};
pub use model::{BookInfo, ChapterResult, ChapterTask, Manifest, ManifestError};
pub use progress::{ProgressError, ProgressStore};

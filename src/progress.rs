//! Durable record of chapter ids already captured, enabling resumable runs.
//!
//! The persisted form is a JSON array of chapter-id strings. Loading tolerates
//! an absent or corrupt file by degrading to "download everything"; saving
//! writes a temp file in the same directory and renames it over the target so
//! a crash leaves either the old or the new version intact.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors persisting the progress file. Callers log these and continue; the
/// in-memory set stays authoritative for the rest of the run.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Cannot write progress file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Set of chapter ids confirmed captured. Append-only within a run.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    done: HashSet<String>,
}

impl ProgressStore {
    /// Load the persisted set. An absent file yields an empty set; an
    /// unreadable or corrupt file warns and yields an empty set.
    pub fn load(path: &Path) -> Self {
        let done = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<Vec<String>>(&text) {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    eprintln!(
                        "Warning: progress file {} is corrupt ({}); starting over.",
                        path.display(),
                        e
                    );
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                eprintln!(
                    "Warning: cannot read progress file {} ({}); starting over.",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            done,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.done.contains(id)
    }

    /// Mark a chapter id captured. Returns true if it was newly added.
    pub fn mark_done(&mut self, id: &str) -> bool {
        self.done.insert(id.to_string())
    }

    /// Drop ids not accepted by the predicate. Used once at startup to
    /// reconcile against the resume snapshot; never called mid-run.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.done.retain(|id| keep(id));
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Persist the set atomically (temp file + rename). Ids are sorted so the
    /// file is deterministic for a given set.
    pub fn save(&self) -> Result<(), ProgressError> {
        let mut ids: Vec<&str> = self.done.iter().map(String::as_str).collect();
        ids.sort_unstable();
        let json = serde_json::to_string(&ids).map_err(|e| ProgressError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let tmp = temp_sibling(&self.path);
        std::fs::write(&tmp, json).map_err(|e| ProgressError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ProgressError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Temp path next to `path` so the final rename stays on one filesystem.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

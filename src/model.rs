//! Canonical data model for a download run.
//!
//! The chapter catalog is resolved externally and handed to this tool as a
//! JSON manifest; the engine and all fetchers use these types as the single
//! source of truth.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Book-level header metadata, written once at the top of the output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One unit of fetch work. Immutable once the manifest is resolved.
///
/// `index` is the 0-based ordering position of the chapter for the life of a
/// run; `id` is the backend's chapter identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterTask {
    pub id: String,
    pub index: u32,
    /// Placeholder title from the catalog (e.g. "第3章 ...").
    pub title: String,
}

/// One successfully fetched chapter. Created once per fetch; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterResult {
    pub id: String,
    pub index: u32,
    /// Catalog title for this chapter.
    pub title: String,
    /// Title reported by the content source, when the source carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    /// Cleaned chapter text (see [crate::text::clean_content]).
    pub content: String,
    /// Name of the endpoint that produced the content.
    pub source: String,
}

impl ChapterResult {
    /// Title used when rendering: the catalog title, or the source title when
    /// the catalog carries none. The engine never invents titles.
    pub fn display_title(&self) -> &str {
        if !self.title.trim().is_empty() {
            return &self.title;
        }
        match self.source_title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.title,
        }
    }
}

/// Errors loading or validating a manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Cannot read manifest {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Manifest has no chapters.")]
    Empty,

    #[error("Manifest contains duplicate chapter id '{id}'.")]
    DuplicateId { id: String },

    #[error("Manifest contains duplicate chapter index {index}.")]
    DuplicateIndex { index: u32 },

    #[error("Manifest chapter '{id}' has an empty id.")]
    IncompleteChapter { id: String },
}

/// One chapter entry in the manifest. `index` defaults to list position.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestChapter {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// External collaborator handoff: book metadata plus the ordered chapter list.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub book: BookInfo,
    pub chapters: Vec<ManifestChapter>,
}

impl Manifest {
    /// Load and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| ManifestError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Validate and convert into fetch tasks. Ids and indices must be unique;
    /// missing indices default to list position.
    pub fn into_tasks(self) -> Result<(BookInfo, Vec<ChapterTask>), ManifestError> {
        if self.chapters.is_empty() {
            return Err(ManifestError::Empty);
        }
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_indices: HashSet<u32> = HashSet::new();
        let mut tasks = Vec::with_capacity(self.chapters.len());
        for (pos, ch) in self.chapters.into_iter().enumerate() {
            if ch.id.trim().is_empty() {
                return Err(ManifestError::IncompleteChapter { id: ch.id });
            }
            let index = ch.index.unwrap_or(pos as u32);
            if !seen_ids.insert(ch.id.clone()) {
                return Err(ManifestError::DuplicateId { id: ch.id });
            }
            if !seen_indices.insert(index) {
                return Err(ManifestError::DuplicateIndex { index });
            }
            tasks.push(ChapterTask {
                id: ch.id,
                index,
                title: ch.title,
            });
        }
        Ok((self.book, tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest_json() -> &'static str {
        r#"{
            "title": "斗破凡尘",
            "author": "青山客",
            "description": "少年自乡野而出。",
            "chapters": [
                {"id": "7101", "title": "第1章 山村少年"},
                {"id": "7102", "title": "第2章 拜师"},
                {"id": "7103", "title": "第3章 下山"}
            ]
        }"#
    }

    #[test]
    fn manifest_parses_and_defaults_indices() -> Result<(), ManifestError> {
        let m: Manifest = serde_json::from_str(sample_manifest_json()).unwrap();
        let (book, tasks) = m.into_tasks()?;
        assert_eq!(book.title, "斗破凡尘");
        assert_eq!(book.author, "青山客");
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].index, 0);
        assert_eq!(tasks[2].index, 2);
        assert_eq!(tasks[1].id, "7102");
        Ok(())
    }

    #[test]
    fn manifest_explicit_indices_win() -> Result<(), ManifestError> {
        let json = r#"{
            "title": "T", "author": "A",
            "chapters": [
                {"id": "a", "title": "one", "index": 5},
                {"id": "b", "title": "two", "index": 3}
            ]
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        let (_, tasks) = m.into_tasks()?;
        assert_eq!(tasks[0].index, 5);
        assert_eq!(tasks[1].index, 3);
        Ok(())
    }

    #[test]
    fn manifest_rejects_duplicate_id() {
        let json = r#"{
            "title": "T", "author": "A",
            "chapters": [
                {"id": "a", "title": "one"},
                {"id": "a", "title": "two"}
            ]
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            m.into_tasks(),
            Err(ManifestError::DuplicateId { id }) if id == "a"
        ));
    }

    #[test]
    fn manifest_rejects_duplicate_index() {
        let json = r#"{
            "title": "T", "author": "A",
            "chapters": [
                {"id": "a", "title": "one", "index": 1},
                {"id": "b", "title": "two", "index": 1}
            ]
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            m.into_tasks(),
            Err(ManifestError::DuplicateIndex { index: 1 })
        ));
    }

    #[test]
    fn manifest_rejects_empty_chapter_list() {
        let json = r#"{"title": "T", "author": "A", "chapters": []}"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert!(matches!(m.into_tasks(), Err(ManifestError::Empty)));
    }

    #[test]
    fn manifest_rejects_blank_id() {
        let json = r#"{
            "title": "T", "author": "A",
            "chapters": [{"id": "  ", "title": "one"}]
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            m.into_tasks(),
            Err(ManifestError::IncompleteChapter { .. })
        ));
    }

    #[test]
    fn display_title_prefers_catalog_title() {
        let r = ChapterResult {
            id: "1".into(),
            index: 0,
            title: "第1章 山村少年".into(),
            source_title: Some("山村少年".into()),
            content: "    正文".into(),
            source: "jingluo".into(),
        };
        assert_eq!(r.display_title(), "第1章 山村少年");
    }

    #[test]
    fn display_title_falls_back_to_source_title() {
        let r = ChapterResult {
            id: "1".into(),
            index: 0,
            title: "".into(),
            source_title: Some("山村少年".into()),
            content: String::new(),
            source: "jingluo".into(),
        };
        assert_eq!(r.display_title(), "山村少年");
    }

    #[test]
    fn chapter_result_round_trips_json() {
        let r = ChapterResult {
            id: "7101".into(),
            index: 4,
            title: "第5章".into(),
            source_title: None,
            content: "    第一段\n    第二段".into(),
            source: "fqweb".into(),
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("source_title"));
        let back: ChapterResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}

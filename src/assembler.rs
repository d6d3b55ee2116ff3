//! Order-preserving result assembly.
//!
//! Results arrive keyed by position index, possibly out of order and across
//! multiple retry rounds. Rendering always walks the full cumulative set in
//! ascending index order — the output document is a full rewrite, never an
//! append, so a late-arriving low-index chapter lands ahead of chapters that
//! were captured earlier.

use crate::model::{BookInfo, ChapterResult};
use std::collections::BTreeMap;
use std::path::Path;

/// Accumulates per-chapter results keyed by index.
#[derive(Debug)]
pub struct Assembler {
    book: BookInfo,
    entries: BTreeMap<u32, ChapterResult>,
}

impl Assembler {
    pub fn new(book: BookInfo) -> Self {
        Self {
            book,
            entries: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the entry at the result's index. Recording the same
    /// content twice is a no-op; different content overwrites (last write
    /// wins). Returns true when the entry was added or changed.
    pub fn record(&mut self, result: ChapterResult) -> bool {
        match self.entries.get(&result.index) {
            Some(existing) if *existing == result => false,
            _ => {
                self.entries.insert(result.index, result);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_index(&self, index: u32) -> bool {
        self.entries.contains_key(&index)
    }

    /// Ids of every recorded chapter, ascending by index.
    pub fn recorded_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|r| r.id.as_str())
    }

    /// Render the full output document: header block, then every recorded
    /// chapter in ascending index order, separated by blank lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("小说名: {}\n", self.book.title));
        out.push_str(&format!("作者: {}\n", self.book.author));
        if let Some(description) = &self.book.description {
            out.push_str(&format!("内容简介: {}\n", description));
        }
        out.push('\n');
        for result in self.entries.values() {
            out.push_str(result.display_title());
            out.push('\n');
            out.push_str(&result.content);
            out.push_str("\n\n");
        }
        out
    }

    /// Persist the cumulative result set beside the output document so a
    /// restarted run can rebuild this assembler without re-fetching.
    pub fn save_snapshot(&self, path: &Path) -> std::io::Result<()> {
        let results: Vec<&ChapterResult> = self.entries.values().collect();
        let json = serde_json::to_string(&results)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp = crate::progress::temp_sibling(path);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    /// Load a snapshot written by [Assembler::save_snapshot]. An absent or
    /// corrupt file yields an empty list (the affected chapters re-fetch).
    pub fn load_snapshot(path: &Path) -> Vec<ChapterResult> {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(results) => results,
                Err(e) => {
                    eprintln!(
                        "Warning: resume snapshot {} is corrupt ({}); affected chapters will re-download.",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                eprintln!(
                    "Warning: cannot read resume snapshot {} ({}); affected chapters will re-download.",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> BookInfo {
        BookInfo {
            title: "测试书".into(),
            author: "作者甲".into(),
            description: Some("简介一句。".into()),
        }
    }

    fn result(id: &str, index: u32, content: &str) -> ChapterResult {
        ChapterResult {
            id: id.to_string(),
            index,
            title: format!("第{}章", index + 1),
            source_title: None,
            content: content.to_string(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn render_sorts_by_index_regardless_of_arrival_order() {
        let mut forward = Assembler::new(book());
        forward.record(result("a", 0, "    一"));
        forward.record(result("b", 1, "    二"));
        forward.record(result("c", 2, "    三"));

        let mut shuffled = Assembler::new(book());
        shuffled.record(result("c", 2, "    三"));
        shuffled.record(result("a", 0, "    一"));
        shuffled.record(result("b", 1, "    二"));

        assert_eq!(forward.render(), shuffled.render());
        let rendered = forward.render();
        let first = rendered.find("第1章").unwrap();
        let second = rendered.find("第2章").unwrap();
        let third = rendered.find("第3章").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn render_writes_header_once_then_chapters() {
        let mut assembler = Assembler::new(book());
        assembler.record(result("a", 0, "    正文"));
        let rendered = assembler.render();
        assert!(rendered.starts_with("小说名: 测试书\n作者: 作者甲\n内容简介: 简介一句。\n\n"));
        assert!(rendered.ends_with("第1章\n    正文\n\n"));
    }

    #[test]
    fn render_omits_missing_description() {
        let assembler = Assembler::new(BookInfo {
            title: "T".into(),
            author: "A".into(),
            description: None,
        });
        let rendered = assembler.render();
        assert!(!rendered.contains("内容简介"));
    }

    #[test]
    fn gaps_are_simply_absent() {
        let mut assembler = Assembler::new(book());
        assembler.record(result("a", 0, "    一"));
        assembler.record(result("c", 5, "    六"));
        assert_eq!(assembler.len(), 2);
        let rendered = assembler.render();
        assert!(rendered.contains("第1章"));
        assert!(rendered.contains("第6章"));
        assert!(!rendered.contains("第2章"));
    }

    #[test]
    fn recording_identical_content_is_a_no_op() {
        let mut assembler = Assembler::new(book());
        assert!(assembler.record(result("a", 0, "    一")));
        assert!(!assembler.record(result("a", 0, "    一")));
        assert_eq!(assembler.len(), 1);
    }

    #[test]
    fn recording_different_content_overwrites() {
        let mut assembler = Assembler::new(book());
        assembler.record(result("a", 0, "    旧"));
        assert!(assembler.record(result("a", 0, "    新")));
        assert_eq!(assembler.len(), 1);
        assert!(assembler.render().contains("    新"));
        assert!(!assembler.render().contains("    旧"));
    }

    #[test]
    fn snapshot_round_trips_through_disk() -> std::io::Result<()> {
        let path = std::env::temp_dir().join(format!(
            "tomatodl_snapshot_{}_roundtrip.json",
            std::process::id()
        ));
        let mut assembler = Assembler::new(book());
        assembler.record(result("b", 1, "    二"));
        assembler.record(result("a", 0, "    一"));
        assembler.save_snapshot(&path)?;

        let restored = Assembler::load_snapshot(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].index, 0);
        assert_eq!(restored[1].index, 1);
        Ok(())
    }

    #[test]
    fn snapshot_load_tolerates_absent_and_corrupt_files() {
        let missing = std::env::temp_dir().join("tomatodl_snapshot_never_written.json");
        assert!(Assembler::load_snapshot(&missing).is_empty());

        let corrupt = std::env::temp_dir().join(format!(
            "tomatodl_snapshot_{}_corrupt.json",
            std::process::id()
        ));
        std::fs::write(&corrupt, "[{broken").unwrap();
        assert!(Assembler::load_snapshot(&corrupt).is_empty());
        std::fs::remove_file(&corrupt).ok();
    }
}

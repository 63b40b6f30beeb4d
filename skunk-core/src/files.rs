//! File identity and blank-line indexing
//!
//! Global invariants enforced:
//! - Two spellings of the same relative path yield the same `FileId`
//! - Blank lines are 1-based and stored in ascending order

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;

/// Strongly typed identifier of an analyzed source file
///
/// Wraps a normalized, `/`-separated path. Comparisons never look at the raw
/// spelling the caller passed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    /// Create a file id from any path-like string
    pub fn new(path: impl AsRef<str>) -> Self {
        FileId(normalize_path(path.as_ref()))
    }

    /// Create a file id from a filesystem path
    pub fn from_path(path: &Path) -> Self {
        FileId::new(path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileId {
    fn from(path: String) -> Self {
        FileId::new(path)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_path(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let mut out = String::with_capacity(unified.len());
    let mut last_was_slash = false;
    for c in unified.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(c);
    }
    let mut trimmed = out.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Sorted set of blank (whitespace-only) line numbers of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlankLines(BTreeSet<u32>);

impl BlankLines {
    /// Compute blank lines of a source text (1-based)
    pub fn from_source(source: &str) -> Self {
        let mut lines = BTreeSet::new();
        // `split` rather than `lines` so a trailing newline yields a final empty line
        for (idx, line) in source.split('\n').enumerate() {
            if line.trim().is_empty() {
                lines.insert(idx as u32 + 1);
            }
        }
        BlankLines(lines)
    }

    pub fn contains(&self, line: u32) -> bool {
        self.0.contains(&line)
    }

    /// Number of blank lines inside the inclusive range
    pub fn count_in(&self, range: RangeInclusive<u32>) -> u32 {
        if range.is_empty() {
            return 0;
        }
        self.0.range(range).count() as u32
    }

    /// Number of blank lines strictly between `low` and `high`
    pub fn count_between_exclusive(&self, low: u32, high: u32) -> u32 {
        if high <= low.saturating_add(1) {
            return 0;
        }
        self.count_in(low + 1..=high - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for BlankLines {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        BlankLines(iter.into_iter().collect())
    }
}

/// Lookup error for files the index has never seen
#[derive(Debug, thiserror::Error)]
#[error("file not present in line index: {0}")]
pub struct UnknownFile(pub FileId);

/// Source of blank-line information per file
pub trait LineIndex: Sync {
    fn blank_lines(&self, file: &FileId) -> Result<&BlankLines, UnknownFile>;
}

/// In-memory line index, populated before analysis starts
#[derive(Debug, Default)]
pub struct FileIndex {
    files: HashMap<FileId, BlankLines>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file with its blank lines; replaces any earlier entry
    pub fn insert(&mut self, file: FileId, blank_lines: BlankLines) {
        self.files.insert(file, blank_lines);
    }

    /// Register a file by scanning its source text
    pub fn insert_source(&mut self, file: FileId, source: &str) {
        self.insert(file, BlankLines::from_source(source));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl LineIndex for FileIndex {
    fn blank_lines(&self, file: &FileId) -> Result<&BlankLines, UnknownFile> {
        self.files
            .get(file)
            .ok_or_else(|| UnknownFile(file.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_normalizes_spellings() {
        let a = FileId::new("./src/a.c");
        let b = FileId::new("src\\a.c");
        let c = FileId::new("src//a.c");
        assert_eq!(a, FileId::new("src/a.c"));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "src/a.c");
    }

    #[test]
    fn test_file_id_keeps_case() {
        assert_ne!(FileId::new("src/A.c"), FileId::new("src/a.c"));
    }

    #[test]
    fn test_file_id_serde_roundtrip_normalizes() {
        let id: FileId = serde_json::from_str("\"./lib\\\\x.c\"").unwrap();
        assert_eq!(id.as_str(), "lib/x.c");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"lib/x.c\"");
    }

    #[test]
    fn test_blank_lines_from_source() {
        let src = "int a;\n\n  \t\nint b;\n";
        let blanks = BlankLines::from_source(src);
        assert!(!blanks.contains(1));
        assert!(blanks.contains(2));
        assert!(blanks.contains(3));
        assert!(!blanks.contains(4));
        // trailing newline opens an empty fifth line
        assert!(blanks.contains(5));
        assert_eq!(blanks.len(), 3);
    }

    #[test]
    fn test_count_in_and_between() {
        let blanks: BlankLines = [3, 5, 9].into_iter().collect();
        assert_eq!(blanks.count_in(1..=10), 3);
        assert_eq!(blanks.count_in(4..=9), 2);
        assert_eq!(blanks.count_between_exclusive(3, 9), 1);
        assert_eq!(blanks.count_between_exclusive(2, 10), 3);
        assert_eq!(blanks.count_between_exclusive(5, 6), 0);
        assert_eq!(blanks.count_between_exclusive(9, 3), 0);
    }

    #[test]
    fn test_file_index_lookup() {
        let mut index = FileIndex::new();
        index.insert_source(FileId::new("a.c"), "x\n\ny");
        assert!(index.blank_lines(&FileId::new("./a.c")).unwrap().contains(2));
        assert!(index.blank_lines(&FileId::new("b.c")).is_err());
    }
}

//! Feature references and the registry resolving them
//!
//! A feature reference is one occurrence of a preprocessor guard (`#ifdef
//! FOO`, `#if !defined(BAR)`, ...) with its line span. References are
//! produced by an upstream discovery step and loaded here read-only.

use crate::files::FileId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Unique id of a feature reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub u64);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One annotation occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureReference {
    pub id: ReferenceId,
    /// Name of the feature constant, e.g. `HAVE_SYSLOG`
    #[serde(rename = "feature")]
    pub feature_name: String,
    pub file: FileId,
    /// First line of the annotated region (1-based)
    pub start_line: u32,
    /// Last line of the annotated region (1-based, inclusive)
    pub end_line: u32,
    #[serde(default)]
    pub nesting_depth: u32,
    #[serde(default)]
    pub negated: bool,
}

impl fmt::Display for FeatureReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {} {}:{}-{} (depth {})",
            if self.negated { "!" } else { "" },
            self.feature_name,
            self.id,
            self.file,
            self.start_line,
            self.end_line,
            self.nesting_depth
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no feature reference {id} for feature `{feature}`")]
    Unresolved { feature: String, id: ReferenceId },
}

/// Canonical lookup of feature references
pub trait FeatureRegistry: Sync {
    /// Resolve a reference the function recorded during ingestion
    fn resolve(&self, feature_name: &str, id: ReferenceId)
        -> Result<&FeatureReference, RegistryError>;

    /// References annotating the given file, ordered by start line then id
    fn references_in(&self, file: &FileId) -> Vec<&FeatureReference>;
}

/// In-memory registry keyed by reference id
#[derive(Debug, Default)]
pub struct FeatureTable {
    by_id: HashMap<ReferenceId, FeatureReference>,
    by_file: BTreeMap<FileId, Vec<ReferenceId>>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, rejecting duplicate ids and inverted spans
    pub fn from_references(references: impl IntoIterator<Item = FeatureReference>) -> Result<Self> {
        let mut table = FeatureTable::new();
        for reference in references {
            table.insert(reference)?;
        }
        Ok(table)
    }

    /// Load a JSON array of references
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feature references: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("invalid feature references in {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let references: Vec<FeatureReference> =
            serde_json::from_str(content).context("failed to parse feature references")?;
        Self::from_references(references)
    }

    pub fn insert(&mut self, reference: FeatureReference) -> Result<()> {
        if reference.start_line == 0 {
            anyhow::bail!("feature reference {} has start line 0 (lines are 1-based)", reference);
        }
        if reference.end_line < reference.start_line {
            anyhow::bail!("feature reference {} ends before it starts", reference);
        }
        if self.by_id.contains_key(&reference.id) {
            anyhow::bail!("duplicate feature reference id {}", reference.id);
        }

        let ids = self.by_file.entry(reference.file.clone()).or_default();
        ids.push(reference.id);
        let by_id = &self.by_id;
        ids.sort_by_key(|id| {
            let line = by_id.get(id).map_or(reference.start_line, |r| r.start_line);
            (line, *id)
        });
        self.by_id.insert(reference.id, reference);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Files that carry at least one reference
    pub fn files(&self) -> impl Iterator<Item = &FileId> {
        self.by_file.keys()
    }
}

impl FeatureRegistry for FeatureTable {
    fn resolve(
        &self,
        feature_name: &str,
        id: ReferenceId,
    ) -> Result<&FeatureReference, RegistryError> {
        self.by_id
            .get(&id)
            .filter(|r| r.feature_name == feature_name)
            .ok_or_else(|| RegistryError::Unresolved {
                feature: feature_name.to_string(),
                id,
            })
    }

    fn references_in(&self, file: &FileId) -> Vec<&FeatureReference> {
        self.by_file
            .get(file)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn reference(id: u64, feature: &str, file: &str, start: u32, end: u32) -> FeatureReference {
        FeatureReference {
            id: ReferenceId(id),
            feature_name: feature.to_string(),
            file: FileId::new(file),
            start_line: start,
            end_line: end,
            nesting_depth: 0,
            negated: false,
        }
    }
}

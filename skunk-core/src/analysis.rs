//! Analysis orchestration for one srcML unit
//!
//! Ties together signature extraction, reference attribution, ingestion,
//! and the recompute pass.
//!
//! Global invariants enforced:
//! - Every reference of the file is ingested before any recompute step runs
//! - A reference is attributed to at most one function
//! - Any fatal consistency error aborts the whole file

use crate::feature::{FeatureRegistry, ReferenceId};
use crate::files::{BlankLines, FileId, LineIndex};
use crate::function::{Function, FunctionKey, Ingestion};
use crate::signature::extract_signature;
use crate::srcml::{self, SrcMlUnit};
use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Functions of one file with their metrics computed
#[derive(Debug)]
pub struct FileAnalysis {
    pub file: FileId,
    /// Functions in document order
    pub functions: Vec<Function>,
    /// Back-links: which function each ingested reference belongs to
    pub attribution: BTreeMap<ReferenceId, FunctionKey>,
    /// References of the file that lie outside every function
    pub unattributed: Vec<ReferenceId>,
}

/// Everything needed from a srcML unit once its XML has been parsed
#[derive(Debug)]
pub struct ExtractedUnit {
    /// Path of the XML file the unit was read from
    pub path: PathBuf,
    pub file: FileId,
    pub blank_lines: BlankLines,
    /// Functions in document order, no references ingested yet
    pub functions: Vec<Function>,
}

/// Parse a unit once and pull out its blank lines and functions
pub fn extract_unit(unit: &SrcMlUnit) -> Result<ExtractedUnit> {
    let doc = unit.document()?;
    Ok(ExtractedUnit {
        path: unit.path().to_path_buf(),
        file: unit.file().clone(),
        blank_lines: srcml::blank_lines_of(&doc),
        functions: build_functions(&doc, unit.file()),
    })
}

/// Analyze a srcML unit
pub fn analyze_unit(
    unit: &SrcMlUnit,
    line_index: &dyn LineIndex,
    registry: &dyn FeatureRegistry,
) -> Result<FileAnalysis> {
    let doc = unit.document()?;
    let functions = build_functions(&doc, unit.file());
    analyze_functions(unit.file().clone(), functions, line_index, registry)
}

/// Attribute the file's references to its functions, then compute metrics
pub fn analyze_functions(
    file: FileId,
    mut functions: Vec<Function>,
    line_index: &dyn LineIndex,
    registry: &dyn FeatureRegistry,
) -> Result<FileAnalysis> {
    let blank_lines = line_index.blank_lines(&file)?;
    warn_duplicate_signatures(&functions);

    let mut attribution: BTreeMap<ReferenceId, FunctionKey> = BTreeMap::new();
    let mut unattributed = Vec::new();
    for reference in registry.references_in(&file) {
        // First function in document order wins, so a reference has one owner
        let Some(function) = functions
            .iter_mut()
            .find(|f| f.contains_line(reference.start_line))
        else {
            unattributed.push(reference.id);
            continue;
        };

        let ingestion = function
            .ingest_reference(reference, blank_lines)
            .with_context(|| format!("inconsistent feature references in {}", file))?;
        if ingestion == Ingestion::Added {
            attribution.insert(reference.id, function.key());
        }
    }

    // All references are in; derived metrics can be computed now
    for function in &mut functions {
        function
            .recompute_all(blank_lines, registry)
            .with_context(|| format!("failed to compute metrics for {}", file))?;
    }

    debug!(
        "{}: {} function(s), {} attributed and {} unattributed reference(s)",
        file,
        functions.len(),
        attribution.len(),
        unattributed.len()
    );

    Ok(FileAnalysis {
        file,
        functions,
        attribution,
        unattributed,
    })
}

fn build_functions(doc: &Document<'_>, file: &FileId) -> Vec<Function> {
    srcml::function_nodes(doc)
        .map(|node| build_function(node, file))
        .collect()
}

/// Extract the signature and span of one `function` element
pub fn build_function(node: Node<'_, '_>, file: &FileId) -> Function {
    let signature = extract_signature(node, file);
    let start_line = signature.start_line();
    let end_line = srcml::source_end_line_of(node);
    let gross_line_count = end_line
        .saturating_sub(start_line)
        .saturating_add(1)
        .max(signature.line_count());
    Function::from_signature(signature, file.clone(), gross_line_count)
}

fn warn_duplicate_signatures(functions: &[Function]) {
    let mut seen = HashSet::new();
    for function in functions {
        if !seen.insert(function.signature()) {
            warn!(
                "duplicate function signature in {} (line {}): {}",
                function.file(),
                function.start_line(),
                function.signature()
            );
        }
    }
}

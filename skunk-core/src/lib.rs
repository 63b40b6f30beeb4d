//! Skunk core library - function signatures and feature-annotation metrics for C code in srcML form

// Global invariants enforced in this crate:
// - Metrics are strictly per-function; files never share mutable state
// - Every reference of a file is ingested before any of its metrics are recomputed
// - Deterministic traversal order must be explicit
// - Comments and whitespace must not affect signatures
// - Identical input yields byte-for-byte identical output

pub mod analysis;
pub mod config;
pub mod feature;
pub mod files;
pub mod function;
pub mod normalize;
pub mod report;
pub mod scanner;
pub mod signature;
pub mod srcml;

pub use config::ResolvedConfig;
pub use feature::{FeatureReference, FeatureRegistry, FeatureTable, ReferenceId};
pub use files::{BlankLines, FileId, FileIndex, LineIndex};
pub use function::{Function, FunctionError, FunctionKey};
pub use report::{render_json, render_text, sort_reports, FunctionMetricsReport};
pub use signature::{extract_signature, ParsedFunctionSignature};
pub use srcml::SrcMlUnit;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Worker threads for per-file analysis (None means rayon's default)
    pub threads: Option<usize>,
    /// Drop functions with fewer lines of feature code from the result
    pub min_lofc: Option<u64>,
}

/// Result of analyzing a tree of srcML files
#[derive(Debug, Default)]
pub struct ProjectAnalysis {
    /// Functions passing the `min_lofc` filter, ordered by file, start line and signature
    pub functions: Vec<Function>,
    pub analyzed_files: usize,
    pub skipped_files: usize,
    /// References that fall outside every function of their file
    pub unattributed_references: usize,
}

impl ProjectAnalysis {
    /// Metric reports in deterministic order
    pub fn reports(&self) -> Result<Vec<FunctionMetricsReport>> {
        let reports = self
            .functions
            .iter()
            .map(|function| {
                FunctionMetricsReport::new(function)
                    .with_context(|| format!("failed to report {}", function.key()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(sort_reports(reports))
    }
}

/// Analyze srcML files at the given path with default configuration
pub fn analyze(
    path: &Path,
    registry: &dyn FeatureRegistry,
    options: AnalysisOptions,
) -> Result<ProjectAnalysis> {
    analyze_with_config(path, registry, options, None)
}

/// Analyze srcML files at the given path with optional resolved configuration
///
/// Options take precedence over the config's `threads` and `min_lofc`.
pub fn analyze_with_config(
    path: &Path,
    registry: &dyn FeatureRegistry,
    options: AnalysisOptions,
    resolved_config: Option<&ResolvedConfig>,
) -> Result<ProjectAnalysis> {
    // Globs match relative to the analyzed directory, or the file's parent
    let filter_root = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };
    let source_files: Vec<PathBuf> = collect_srcml_files(path)?
        .into_iter()
        .filter(|file_path| {
            // Apply config include/exclude filter
            resolved_config.map_or(true, |config| {
                config.should_include(file_path.strip_prefix(filter_root).unwrap_or(file_path))
            })
        })
        .collect();
    info!("analyzing {} srcML file(s) under {}", source_files.len(), path.display());

    let threads = options
        .threads
        .or_else(|| resolved_config.and_then(|c| c.threads));
    let min_lofc = options
        .min_lofc
        .or_else(|| resolved_config.and_then(|c| c.min_lofc));
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build().context("failed to build thread pool")?;

    let mut project = pool.install(|| run_analysis(&source_files, registry))?;
    if let Some(min) = min_lofc {
        project
            .functions
            .retain(|function| function.lines_of_feature_code() >= min);
    }
    Ok(project)
}

fn run_analysis(source_files: &[PathBuf], registry: &dyn FeatureRegistry) -> Result<ProjectAnalysis> {
    let mut skipped_files: usize = 0;

    // Phase 1: parse every unit once; only blank lines and functions survive
    let extracted: Vec<Result<analysis::ExtractedUnit>> = source_files
        .par_iter()
        .map(|file_path| analysis::extract_unit(&SrcMlUnit::load(file_path)?))
        .collect();

    let mut pending = Vec::with_capacity(extracted.len());
    let mut line_index = FileIndex::new();
    for (file_path, result) in source_files.iter().zip(extracted) {
        match result {
            Ok(unit) => {
                if line_index.blank_lines(&unit.file).is_ok() {
                    warn!(
                        "skipping file {}: {} is already provided by another unit",
                        file_path.display(),
                        unit.file
                    );
                    skipped_files += 1;
                    continue;
                }
                line_index.insert(unit.file.clone(), unit.blank_lines);
                pending.push((unit.path, unit.file, unit.functions));
            }
            Err(e) => {
                warn!("skipping file {}: {:#}", file_path.display(), e);
                skipped_files += 1;
            }
        }
    }

    // Phase 2: attribution and metrics, each file independent of the others
    let results: Vec<_> = pending
        .into_par_iter()
        .map(|(xml_path, file, functions)| {
            let result = analysis::analyze_functions(file, functions, &line_index, registry);
            (xml_path, result)
        })
        .collect();

    let mut project = ProjectAnalysis::default();
    for (xml_path, result) in results {
        match result {
            Ok(file_analysis) => {
                project.analyzed_files += 1;
                project.unattributed_references += file_analysis.unattributed.len();
                project.functions.extend(file_analysis.functions);
            }
            Err(e) => {
                warn!("skipping file {}: {:#}", xml_path.display(), e);
                skipped_files += 1;
            }
        }
    }
    if skipped_files > 0 {
        warn!("skipped {} file(s) due to analysis errors", skipped_files);
    }
    project.skipped_files = skipped_files;

    // Sort deterministically
    project.functions.sort_by(function::compare_by_occurrence);
    debug!(
        "{} function(s) in {} file(s), {} unattributed reference(s)",
        project.functions.len(),
        project.analyzed_files,
        project.unattributed_references
    );

    Ok(project)
}

/// Check if a file looks like a srcML document
fn is_srcml_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// Collect all srcML files from a path (file or directory)
///
/// Hidden directories and symlinks are not traversed. Files are returned
/// sorted.
pub fn collect_srcml_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            if is_srcml_file(filename) {
                files.push(path.to_path_buf());
            }
        }
    } else if path.is_dir() {
        collect_srcml_files_recursive(path, &mut files)?;
    } else {
        anyhow::bail!("path does not exist: {}", path.display());
    }

    // Sort files for deterministic order
    files.sort();

    Ok(files)
}

/// Returns true for directory names that should not be traversed
fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.')
}

/// Process one directory entry, pushing srcML files or recursing into dirs
fn process_dir_entry(path: PathBuf, metadata: std::fs::Metadata, files: &mut Vec<PathBuf>) -> Result<()> {
    if metadata.is_symlink() {
        return Ok(());
    }

    if metadata.is_dir() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if is_skipped_dir(name) {
                return Ok(());
            }
        }
        collect_srcml_files_recursive(&path, files)?;
    } else if metadata.is_file() {
        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            if is_srcml_file(filename) {
                files.push(path);
            }
        }
    }

    Ok(())
}

fn collect_srcml_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry_result in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry_result?;
        let path = entry.path();
        let metadata = std::fs::symlink_metadata(&path)
            .with_context(|| format!("failed to read metadata: {}", path.display()))?;
        process_dir_entry(path, metadata, files)?;
    }

    Ok(())
}

//! Per-function feature-annotation metrics
//!
//! Global invariants enforced:
//! - A reference is ingested at most once per function (by id)
//! - Ingestion validates every line-range invariant before mutating anything
//! - Blank lines inside a reference span count as neither feature nor annotated code
//! - Derived metrics read before their recompute step fail loudly

use crate::feature::{FeatureReference, FeatureRegistry, ReferenceId, RegistryError};
use crate::files::{BlankLines, FileId};
use crate::signature::ParsedFunctionSignature;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a function: file plus normalized signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    pub file: FileId,
    pub signature: String,
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.signature, self.file)
    }
}

/// Fatal consistency errors
///
/// These indicate a defect upstream (a reference attributed to the wrong
/// function or file), not malformed input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionError {
    #[error("internal error: feature reference {reference} belongs to another file than function {function}")]
    FileMismatch { function: String, reference: String },

    #[error("internal error: feature reference {reference} starts before function {function}")]
    StartsBeforeFunction { function: String, reference: String },

    #[error(
        "internal error: feature reference {reference} starts behind its clipped end {lofc_end} in function {function}"
    )]
    StartsAfterEnd {
        function: String,
        reference: String,
        lofc_end: u32,
    },

    #[error("attempt to read {metric} of function {function} before computing it")]
    Uninitialized {
        function: String,
        metric: &'static str,
    },

    #[error("cannot resolve feature reference of function {function}: {source}")]
    Registry {
        function: String,
        #[source]
        source: RegistryError,
    },
}

/// Outcome of [`Function::ingest_reference`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingestion {
    Added,
    /// The id was ingested before; nothing changed
    Duplicate,
}

/// One C function definition and its feature-annotation metrics
#[derive(Debug, Clone)]
pub struct Function {
    file: FileId,
    signature: String,
    start_line: u32,
    end_line: u32,
    gross_line_count: u32,
    net_line_count: Option<u32>,
    signature_line_count: u32,

    /// Reference id -> feature name, in ingestion order
    feature_references: Vec<(ReferenceId, String)>,
    reference_ids: HashSet<ReferenceId>,
    annotated_lines: BTreeSet<u32>,

    lines_of_feature_code: u64,
    lines_of_annotated_code: usize,
    max_nesting_depth: u32,
    nesting_sum: u64,
    distinct_feature_constant_count: usize,
    feature_location_count: usize,
    negation_count: usize,
}

impl Function {
    /// Create a function spanning `gross_line_count` lines from `start_line`
    pub fn new(signature: String, file: FileId, start_line: u32, gross_line_count: u32) -> Self {
        let gross_line_count = gross_line_count.max(1);
        Function {
            file,
            signature,
            start_line,
            end_line: start_line + gross_line_count - 1,
            gross_line_count,
            net_line_count: None,
            signature_line_count: 1,
            feature_references: Vec::new(),
            reference_ids: HashSet::new(),
            annotated_lines: BTreeSet::new(),
            lines_of_feature_code: 0,
            lines_of_annotated_code: 0,
            max_nesting_depth: 0,
            nesting_sum: 0,
            distinct_feature_constant_count: 0,
            feature_location_count: 0,
            negation_count: 0,
        }
    }

    /// Create a function from an extracted signature
    pub fn from_signature(
        parsed: ParsedFunctionSignature,
        file: FileId,
        gross_line_count: u32,
    ) -> Self {
        let start_line = parsed.start_line();
        let signature_line_count = parsed.line_count();
        let mut function = Function::new(parsed.into_text(), file, start_line, gross_line_count);
        function.signature_line_count = signature_line_count;
        function
    }

    pub fn key(&self) -> FunctionKey {
        FunctionKey {
            file: self.file.clone(),
            signature: self.signature.clone(),
        }
    }

    pub fn file(&self) -> &FileId {
        &self.file
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Whether `line` lies inside `[start_line, end_line]`
    pub fn contains_line(&self, line: u32) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }

    pub fn gross_line_count(&self) -> u32 {
        self.gross_line_count
    }

    pub fn signature_line_count(&self) -> u32 {
        self.signature_line_count
    }

    /// Lines excluding blank ones; requires [`Function::recompute_net_line_count`]
    pub fn net_line_count(&self) -> Result<u32, FunctionError> {
        self.net_line_count
            .ok_or_else(|| FunctionError::Uninitialized {
                function: self.to_string(),
                metric: "net line count",
            })
    }

    pub fn feature_references(&self) -> impl Iterator<Item = (ReferenceId, &str)> {
        self.feature_references
            .iter()
            .map(|(id, name)| (*id, name.as_str()))
    }

    /// Number of ingested references, repeated feature names included
    pub fn feature_constant_count(&self) -> usize {
        self.feature_references.len()
    }

    pub fn lines_of_feature_code(&self) -> u64 {
        self.lines_of_feature_code
    }

    pub fn lines_of_annotated_code(&self) -> usize {
        self.lines_of_annotated_code
    }

    pub fn max_nesting_depth(&self) -> u32 {
        self.max_nesting_depth
    }

    pub fn nesting_sum(&self) -> u64 {
        self.nesting_sum
    }

    pub fn distinct_feature_constant_count(&self) -> usize {
        self.distinct_feature_constant_count
    }

    pub fn feature_location_count(&self) -> usize {
        self.feature_location_count
    }

    pub fn negation_count(&self) -> usize {
        self.negation_count
    }

    /// Attribute a feature reference to this function
    ///
    /// `blank_lines` must be the blank lines of this function's file.
    /// Errors leave the function untouched.
    pub fn ingest_reference(
        &mut self,
        reference: &FeatureReference,
        blank_lines: &BlankLines,
    ) -> Result<Ingestion, FunctionError> {
        if self.reference_ids.contains(&reference.id) {
            return Ok(Ingestion::Duplicate);
        }

        if reference.file != self.file {
            return Err(FunctionError::FileMismatch {
                function: self.to_string(),
                reference: reference.to_string(),
            });
        }
        let lofc_start = reference.start_line;
        if lofc_start < self.start_line {
            return Err(FunctionError::StartsBeforeFunction {
                function: self.to_string(),
                reference: reference.to_string(),
            });
        }
        // Clip references running past the function's end
        let lofc_end = reference.end_line.min(self.end_line);
        if lofc_start > lofc_end {
            return Err(FunctionError::StartsAfterEnd {
                function: self.to_string(),
                reference: reference.to_string(),
                lofc_end,
            });
        }

        // Only blank lines strictly inside the clipped span are subtracted
        let blank_inside = blank_lines.count_between_exclusive(lofc_start, lofc_end);
        let increment = u64::from(lofc_end - lofc_start + 1) - u64::from(blank_inside);
        self.lines_of_feature_code += increment;

        self.max_nesting_depth = self.max_nesting_depth.max(reference.nesting_depth);

        for line in lofc_start..=lofc_end {
            if !blank_lines.contains(line) {
                self.annotated_lines.insert(line);
            }
        }

        self.reference_ids.insert(reference.id);
        self.feature_references
            .push((reference.id, reference.feature_name.clone()));
        Ok(Ingestion::Added)
    }

    /// `net = gross - blank lines inside [start_line, end_line]`
    pub fn recompute_net_line_count(&mut self, blank_lines: &BlankLines) {
        let blank = blank_lines.count_in(self.start_line..=self.end_line);
        self.net_line_count = Some(self.gross_line_count.saturating_sub(blank));
    }

    /// Number of distinct feature names among the ingested references
    pub fn recompute_distinct_feature_constant_count(
        &mut self,
        registry: &dyn FeatureRegistry,
    ) -> Result<(), FunctionError> {
        let names: HashSet<&str> = self
            .resolve_all(registry)?
            .into_iter()
            .map(|r| r.feature_name.as_str())
            .collect();
        self.distinct_feature_constant_count = names.len();
        Ok(())
    }

    /// Number of distinct reference start lines; also publishes LOAC
    pub fn recompute_feature_location_count(
        &mut self,
        registry: &dyn FeatureRegistry,
    ) -> Result<(), FunctionError> {
        let starts: HashSet<u32> = self
            .resolve_all(registry)?
            .into_iter()
            .map(|r| r.start_line)
            .collect();
        self.feature_location_count = starts.len();
        self.lines_of_annotated_code = self.annotated_lines.len();
        Ok(())
    }

    pub fn recompute_negation_count(
        &mut self,
        registry: &dyn FeatureRegistry,
    ) -> Result<(), FunctionError> {
        self.negation_count = self
            .resolve_all(registry)?
            .into_iter()
            .filter(|r| r.negated)
            .count();
        Ok(())
    }

    /// Sum of nesting depths relative to the shallowest reference
    pub fn recompute_nesting_sum(
        &mut self,
        registry: &dyn FeatureRegistry,
    ) -> Result<(), FunctionError> {
        let depths: Vec<u64> = self
            .resolve_all(registry)?
            .into_iter()
            .map(|r| u64::from(r.nesting_depth))
            .collect();
        self.nesting_sum = match depths.iter().min() {
            Some(&min) => depths.iter().sum::<u64>() - depths.len() as u64 * min,
            None => 0,
        };
        Ok(())
    }

    /// Run every recompute step; call once all references are ingested
    pub fn recompute_all(
        &mut self,
        blank_lines: &BlankLines,
        registry: &dyn FeatureRegistry,
    ) -> Result<(), FunctionError> {
        self.recompute_net_line_count(blank_lines);
        self.recompute_distinct_feature_constant_count(registry)?;
        self.recompute_feature_location_count(registry)?;
        self.recompute_negation_count(registry)?;
        self.recompute_nesting_sum(registry)?;
        Ok(())
    }

    fn resolve_all<'r>(
        &self,
        registry: &'r dyn FeatureRegistry,
    ) -> Result<Vec<&'r FeatureReference>, FunctionError> {
        self.feature_references
            .iter()
            .map(|(id, name)| {
                registry
                    .resolve(name, *id)
                    .map_err(|source| FunctionError::Registry {
                        function: self.to_string(),
                        source,
                    })
            })
            .collect()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function [{} /* {}:{},{} */]",
            self.signature, self.file, self.start_line, self.end_line
        )
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file && self.signature == other.signature
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.hash(state);
        self.signature.hash(state);
    }
}

/// Order of occurrence: file, then start line, then signature
pub fn compare_by_occurrence(a: &Function, b: &Function) -> Ordering {
    a.file
        .cmp(&b.file)
        .then_with(|| a.start_line.cmp(&b.start_line))
        .then_with(|| a.signature.cmp(&b.signature))
}

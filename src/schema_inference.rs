//! Separator and column-count inference from a leading sample of a text file
//!
//! The sample is the first line plus up to `sample_lines` following lines.
//! Blank lines and lines starting with [`COMMENT_MARKER`] are dropped before
//! counting. When every remaining line splits into the same number of fields
//! under the format's default separator, that count wins. Otherwise each
//! candidate separator is scored by its raw occurrence count across the
//! sample, and the winner (ties broken by [`CANDIDATE_SEPARATORS`] order)
//! replaces the default when it differs.
//!
//! Scoring by raw occurrences can pick a character that is not the real
//! separator, e.g. commas inside quoted text outnumbering pipes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info, warn};

use crate::constants::{column_names, CANDIDATE_SEPARATORS, COMMENT_MARKER};
use crate::error::{Result, SchemaInferenceError};
use crate::format::TextFormat;

/// Layout of a delimited file as seen by the rest of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSchema {
    pub separator: char,
    pub column_count: usize,
    pub column_names: Vec<String>,
}

impl InferredSchema {
    pub fn new(separator: char, column_count: usize) -> Self {
        Self {
            separator,
            column_count,
            column_names: column_names(column_count),
        }
    }

    /// True when the separator differs from the format default
    pub fn overrides_default(&self, format: TextFormat) -> bool {
        self.separator != format.default_separator()
    }
}

/// Infer the schema of the file at `path`, declared as `type_hint` (`tbl`, `csv` or `txt`)
pub fn infer_schema_with_hint(
    path: impl AsRef<Path>,
    type_hint: &str,
    sample_lines: usize,
) -> Result<InferredSchema> {
    let format = TextFormat::from_extension(type_hint)
        .map_err(|_| SchemaInferenceError::UnsupportedType(type_hint.to_string()))?;
    infer_schema(path, format, sample_lines)
}

/// Infer the schema of the file at `path`
pub fn infer_schema(
    path: impl AsRef<Path>,
    format: TextFormat,
    sample_lines: usize,
) -> Result<InferredSchema> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let schema = infer_from_reader(BufReader::new(file), format, sample_lines)?;
    info!(
        "Inferred schema for {}: separator {:?}, {} columns",
        path.display(),
        schema.separator,
        schema.column_count
    );
    Ok(schema)
}

/// Infer from any buffered reader. Reads at most `sample_lines + 1` lines.
pub fn infer_from_reader<R: BufRead>(
    mut reader: R,
    format: TextFormat,
    sample_lines: usize,
) -> Result<InferredSchema> {
    let mut lines = Vec::with_capacity(sample_lines + 1);
    let mut buf = Vec::new();

    while lines.len() <= sample_lines {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        lines.push(line.trim_end_matches(&['\n', '\r'][..]).to_string());
    }

    infer_from_lines(&lines, format.default_separator())
}

/// Core inference over an already-read sample
pub fn infer_from_lines<S: AsRef<str>>(lines: &[S], default_sep: char) -> Result<InferredSchema> {
    if lines.is_empty() {
        return Err(SchemaInferenceError::EmptyFile.into());
    }

    let valid: Vec<&str> = lines
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| !l.trim().is_empty() && !l.starts_with(COMMENT_MARKER))
        .collect();

    if valid.is_empty() {
        return Err(SchemaInferenceError::NoValidData.into());
    }

    let counts = field_counts(&valid, default_sep);
    if counts.iter().all(|&c| c == counts[0]) {
        return Ok(InferredSchema::new(default_sep, counts[0]));
    }

    debug!(
        "Inconsistent column counts under {:?}: {:?}, scoring candidate separators",
        default_sep, counts
    );

    let detected = detect_separator(&valid);
    if detected != default_sep {
        let detected_counts = field_counts(&valid, detected);
        let column_count = modal_count(&detected_counts);
        warn!(
            "Switching separator from {:?} to {:?} ({} columns)",
            default_sep, detected, column_count
        );
        Ok(InferredSchema::new(detected, column_count))
    } else {
        let column_count = modal_count(&counts);
        debug!(
            "Keeping default separator {:?} with modal column count {}",
            default_sep, column_count
        );
        Ok(InferredSchema::new(default_sep, column_count))
    }
}

fn field_counts(lines: &[&str], sep: char) -> Vec<usize> {
    lines.iter().map(|l| l.split(sep).count()).collect()
}

/// Highest-scoring candidate by total occurrences; ties go to the earlier candidate
pub fn detect_separator(lines: &[&str]) -> char {
    let mut best = CANDIDATE_SEPARATORS[0];
    let mut best_score = 0usize;

    for (i, &candidate) in CANDIDATE_SEPARATORS.iter().enumerate() {
        let score: usize = lines.iter().map(|l| l.matches(candidate).count()).sum();
        if i == 0 || score > best_score {
            best = candidate;
            best_score = score;
        }
    }

    best
}

/// Most frequent value; ties go to the larger count so no data is truncated
fn modal_count(counts: &[usize]) -> usize {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for &c in counts {
        *freq.entry(c).or_insert(0) += 1;
    }
    freq.into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(count, _)| count)
        .unwrap_or(1)
}

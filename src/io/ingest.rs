//! Observation file ingest and validation.
//!
//! This module turns a plain-text file of whitespace-delimited numbers into a
//! list of `(x, y, z)` observations that are safe to fit.
//!
//! Design goals:
//! - **Fatal open errors** (clear message + exit code 2)
//! - **Token-level validation**: every number must parse and be finite, and the
//!   total must group into whole triples (or the leftover is dropped explicitly)
//! - **Layout agnostic**: one triple per line and one number per line both work
//! - **Separation of concerns**: no fitting logic here

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::domain::{Observation, PartialTriple};
use crate::error::AppError;

/// Magnitude statistics of the raw readings.
#[derive(Debug, Clone, Copy)]
pub struct NormStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Summary stats about the file and the observations taken from it.
#[derive(Debug, Clone)]
pub struct IngestStats {
    pub lines: usize,
    pub tokens: usize,
    pub n_observations: usize,
    /// Trailing numbers that did not complete a triple (truncate policy only).
    pub dropped_tokens: usize,
    pub norms: Option<NormStats>,
}

/// Ingest output: observations + where they came from + stats.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub path: PathBuf,
    pub observations: Vec<Observation>,
    pub stats: IngestStats,
}

/// Observations parsed from a reader, before file-level stats are attached.
#[derive(Debug, Clone)]
pub struct ParsedObservations {
    pub observations: Vec<Observation>,
    pub tokens: usize,
    pub dropped_tokens: usize,
}

/// Open, count, and parse an observation file.
///
/// The file is read twice: one pass counts lines, then the reader is rewound
/// and the numbers are parsed.
pub fn load_observations(path: &Path, partial: PartialTriple) -> Result<IngestedData, AppError> {
    info!("Reading observations from '{}'", path.display());

    let file = File::open(path).map_err(|e| {
        AppError::input(format!(
            "Opening the file failed! '{}': {e}",
            path.display()
        ))
    })?;
    let mut reader = BufReader::new(file);

    let lines = count_lines(&mut reader)
        .map_err(|e| AppError::input(format!("Failed to read '{}': {e}", path.display())))?;
    reader
        .rewind()
        .map_err(|e| AppError::input(format!("Failed to rewind '{}': {e}", path.display())))?;

    let parsed = parse_observations(reader, partial)?;
    let stats = IngestStats {
        lines,
        tokens: parsed.tokens,
        n_observations: parsed.observations.len(),
        dropped_tokens: parsed.dropped_tokens,
        norms: compute_norm_stats(&parsed.observations),
    };

    info!(
        "Read {} observations ({} numbers on {} lines)",
        stats.n_observations, stats.tokens, stats.lines
    );

    Ok(IngestedData {
        path: path.to_path_buf(),
        observations: parsed.observations,
        stats,
    })
}

/// Count lines, including a final line without a trailing newline.
pub fn count_lines<R: BufRead>(mut reader: R) -> io::Result<usize> {
    let mut n = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(n);
        }
        n += 1;
    }
}

/// Parse whitespace-delimited numbers and group them into observations.
pub fn parse_observations<R: BufRead>(reader: R, partial: PartialTriple) -> Result<ParsedObservations, AppError> {
    let mut values = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| AppError::input(format!("Line {line_no}: read error: {e}")))?;
        for token in line.split_whitespace() {
            values.push(parse_value(token, line_no)?);
        }
    }

    let tokens = values.len();
    let remainder = tokens % 3;
    if remainder != 0 {
        match partial {
            PartialTriple::Reject => {
                return Err(AppError::input(format!(
                    "Found {tokens} numbers, which do not form whole (x, y, z) triples ({remainder} left over)."
                )));
            }
            PartialTriple::Truncate => {
                warn!("Dropping {remainder} trailing number(s) that do not complete a triple");
            }
        }
    }

    let observations = values
        .chunks_exact(3)
        .map(|c| Observation::new(c[0], c[1], c[2]))
        .collect();

    Ok(ParsedObservations {
        observations,
        tokens,
        dropped_tokens: remainder,
    })
}

fn parse_value(token: &str, line_no: usize) -> Result<f64, AppError> {
    let v = token
        .parse::<f64>()
        .map_err(|_| AppError::input(format!("Line {line_no}: invalid number '{token}'.")))?;
    if !v.is_finite() {
        return Err(AppError::input(format!("Line {line_no}: non-finite value '{token}'.")));
    }
    Ok(v)
}

fn compute_norm_stats(observations: &[Observation]) -> Option<NormStats> {
    if observations.is_empty() {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for o in observations {
        let n = o.norm();
        min = min.min(n);
        max = max.max(n);
        sum += n;
    }
    Some(NormStats {
        min,
        max,
        mean: sum / observations.len() as f64,
    })
}

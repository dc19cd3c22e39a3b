//! File-backed persistence for PathOS batch runs.
//!
//! Heuristic CSV files hold one agent per line:
//!
//! ```text
//! <header, ignored>
//! <experience>,<heuristic 1>,...,<heuristic N>
//! ```
//!
//! Empty fields are dropped before counting, so stray or trailing commas are
//! harmless. A line with the wrong number of values is skipped with a
//! warning; a line with a non-numeric or non-finite value fails the whole
//! load.

use std::io;
use std::num::ParseFloatError;
use std::path::{Path, PathBuf};

use pathos_core::{CombatStats, Heuristic, HeuristicRecord, HeuristicScale};
use thiserror::Error;
use tracing::{error, info, warn};

pub mod settings;

pub use settings::{BatchSettings, SceneSettings, SettingsError, SettingsStore, load_profiles};

const SEPARATOR: &str = ",";
const EXPERIENCE_COLUMN: &str = "experience";

/// Errors raised while reading or writing heuristic files.
#[derive(Debug, Error)]
pub enum HeuristicsError {
    #[error("failed to access heuristics file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}, field {field}: {value:?} is not a number")]
    Parse {
        line: usize,
        field: usize,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("line {line}, field {field}: {value:?} is not a finite number")]
    NonFinite {
        line: usize,
        field: usize,
        value: String,
    },
    #[error("no valid heuristic records found ({skipped} malformed lines skipped)")]
    Empty { skipped: usize },
    #[error("record {row} has no value for {heuristic}")]
    MissingHeuristic { row: usize, heuristic: Heuristic },
}

/// Records parsed from a heuristics file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedHeuristics {
    pub records: Vec<HeuristicRecord>,
    /// 1-based file line numbers skipped for having the wrong field count.
    pub skipped_lines: Vec<usize>,
}

/// Read and parse a heuristics file.
///
/// `heuristics` fixes the expected column order; `combat` supplies accuracy
/// and evasion, which the file format does not carry.
pub fn load_heuristics(
    path: impl AsRef<Path>,
    heuristics: &[Heuristic],
    combat: CombatStats,
) -> Result<LoadedHeuristics, HeuristicsError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| HeuristicsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_heuristics(&text, heuristics, combat).inspect_err(|err| {
        error!(path = %path.display(), %err, "failed to load heuristics");
    })?;
    info!(
        path = %path.display(),
        records = loaded.records.len(),
        skipped = loaded.skipped_lines.len(),
        "loaded heuristics"
    );
    Ok(loaded)
}

/// Parse heuristics from in-memory CSV text.
pub fn parse_heuristics(
    text: &str,
    heuristics: &[Heuristic],
    combat: CombatStats,
) -> Result<LoadedHeuristics, HeuristicsError> {
    let expected = 1 + heuristics.len();
    let mut records = Vec::new();
    let mut skipped_lines = Vec::new();

    // Line 1 is the header.
    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_number = idx + 1;
        let fields: Vec<&str> = line
            .split(SEPARATOR)
            .filter(|field| !field.is_empty())
            .collect();

        if fields.len() != expected {
            warn!(
                line = line_number,
                expected,
                found = fields.len(),
                "incorrect number of entries; skipping line"
            );
            skipped_lines.push(line_number);
            continue;
        }

        let values = fields
            .iter()
            .enumerate()
            .map(|(field, raw)| parse_field(raw, line_number, field + 1))
            .collect::<Result<Vec<f32>, _>>()?;

        let Some((&experience_scale, scales)) = values.split_first() else {
            continue;
        };

        records.push(HeuristicRecord {
            experience_scale,
            traits: heuristics
                .iter()
                .zip(scales)
                .map(|(&heuristic, &scale)| HeuristicScale::new(heuristic, scale))
                .collect(),
            accuracy: combat.accuracy,
            evasion: combat.evasion,
        });
    }

    if records.is_empty() {
        return Err(HeuristicsError::Empty {
            skipped: skipped_lines.len(),
        });
    }

    Ok(LoadedHeuristics {
        records,
        skipped_lines,
    })
}

fn parse_field(raw: &str, line: usize, field: usize) -> Result<f32, HeuristicsError> {
    let value = raw
        .trim()
        .parse::<f32>()
        .map_err(|source| HeuristicsError::Parse {
            line,
            field,
            value: raw.to_string(),
            source,
        })?;
    if !value.is_finite() {
        return Err(HeuristicsError::NonFinite {
            line,
            field,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// Render records as CSV readable by [`parse_heuristics`].
pub fn heuristics_to_csv(
    records: &[HeuristicRecord],
    heuristics: &[Heuristic],
) -> Result<String, HeuristicsError> {
    let mut out = String::from(EXPERIENCE_COLUMN);
    for heuristic in heuristics {
        out.push_str(SEPARATOR);
        out.push_str(heuristic.key());
    }
    out.push('\n');

    for (row, record) in records.iter().enumerate() {
        let mut fields = Vec::with_capacity(1 + heuristics.len());
        fields.push(record.experience_scale.to_string());
        for &heuristic in heuristics {
            let scale = record
                .scale(heuristic)
                .ok_or(HeuristicsError::MissingHeuristic { row, heuristic })?;
            fields.push(scale.to_string());
        }
        out.push_str(&fields.join(SEPARATOR));
        out.push('\n');
    }
    Ok(out)
}

/// Write records to `path`, replacing any existing file.
pub fn write_heuristics(
    path: impl AsRef<Path>,
    records: &[HeuristicRecord],
    heuristics: &[Heuristic],
) -> Result<(), HeuristicsError> {
    let path = path.as_ref();
    let csv = heuristics_to_csv(records, heuristics)?;
    std::fs::write(path, csv).map_err(|source| HeuristicsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), records = records.len(), "wrote heuristics");
    Ok(())
}

/// Whether `path` names an existing `.csv` file.
#[must_use]
pub fn is_heuristics_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

//! # Raw Extract Readers
//!
//! Reads the three kinds of raw input the table builder consumes. The surname and
//! first-name extracts are addressed by column position, the way the Census and
//! Harvard files are published; population extracts are addressed by header name.
//! Every cell is read as text first so that suppression markers and zero-padded
//! geography codes survive, then parsed here with the row number in any error.

use super::apportion::{PopulationCounts, RAW_COUNT_COLUMNS};
use super::suppression::SuppressedRow;
use crate::error::BifsgError;
use crate::files::read_frame;
use crate::normalize::normalize_geography;
use crate::types::{NUM_RACES, Resolution};
use ndarray::Array2;
use polars::prelude::*;
use std::path::Path;

/// The literal the Census writes in place of a suppressed percentage.
pub const SUPPRESSED_MARKER: &str = "(S)";

/// Surname extract columns, by position.
pub const SURNAME_COLUMNS: [&str; 11] = [
    "name",
    "rank",
    "count",
    "prop100k",
    "cum_prop100k",
    "pctwhite",
    "pctblack",
    "pctapi",
    "pctaian",
    "pct2prace",
    "pcthispanic",
];

/// Positions of the race percentages in the surname extract, in `RaceCategory` order.
const SURNAME_RACE_POSITIONS: [usize; NUM_RACES] = [5, 6, 7, 8, 9, 10];

/// First-name extract columns, by position. Trailing columns are ignored.
pub const FIRST_NAME_COLUMNS: [&str; 8] = [
    "firstname",
    "obs",
    "pcthispanic",
    "pctwhite",
    "pctblack",
    "pctapi",
    "pctaian",
    "pct2prace",
];

/// Positions of the race percentages in the first-name extract, in `RaceCategory` order.
const FIRST_NAME_RACE_POSITIONS: [usize; NUM_RACES] = [3, 4, 5, 6, 7, 2];

/// One surname row. Percentages are on the 0-100 scale; `None` is a suppressed cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SurnameRecord {
    pub name: String,
    pub percentages: SuppressedRow,
}

/// One first-name row. Percentages are on the 0-100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstNameRecord {
    pub name: String,
    /// Number of people observed with this first name.
    pub obs: f64,
    pub percentages: [f64; NUM_RACES],
}

/// Reads every column of `df` as optional strings.
fn text_columns(df: &DataFrame) -> Result<Vec<Vec<Option<String>>>, BifsgError> {
    df.get_columns()
        .iter()
        .map(|column| {
            let text = column.cast(&DataType::String)?;
            Ok(text
                .str()?
                .into_iter()
                .map(|cell| cell.map(str::to_string))
                .collect())
        })
        .collect()
}

fn require_columns(path: &Path, df: &DataFrame, expected: &[&str]) -> Result<(), BifsgError> {
    if df.width() < expected.len() {
        return Err(BifsgError::invalid_extract(
            path,
            format!(
                "expected at least {} columns ({}), found {}",
                expected.len(),
                expected.join(", "),
                df.width()
            ),
        ));
    }
    Ok(())
}

fn parse_number(path: &Path, row: usize, column: &str, cell: Option<&str>) -> Result<f64, BifsgError> {
    let text = cell.map(str::trim).unwrap_or_default();
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            BifsgError::invalid_extract(
                path,
                format!("row {}: column '{column}' holds '{text}', expected a number", row + 1),
            )
        })
}

/// Reads the Census surname extract. Rows with an empty name are skipped.
pub fn read_surnames(path: &Path) -> Result<Vec<SurnameRecord>, BifsgError> {
    let df = read_frame(path)?;
    require_columns(path, &df, &SURNAME_COLUMNS)?;
    let columns = text_columns(&df)?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let Some(name) = columns[0][row].as_deref().filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let mut percentages: SuppressedRow = [None; NUM_RACES];
        for (slot, &position) in percentages.iter_mut().zip(SURNAME_RACE_POSITIONS.iter()) {
            let cell = columns[position][row].as_deref();
            if cell.map(str::trim) == Some(SUPPRESSED_MARKER) {
                continue;
            }
            *slot = Some(parse_number(path, row, SURNAME_COLUMNS[position], cell)?);
        }
        records.push(SurnameRecord {
            name: name.to_string(),
            percentages,
        });
    }
    log::info!("Read {} surname rows from {}", records.len(), path.display());
    Ok(records)
}

/// Reads the Harvard first-name extract. Rows with an empty name are skipped.
pub fn read_first_names(path: &Path) -> Result<Vec<FirstNameRecord>, BifsgError> {
    let df = read_frame(path)?;
    require_columns(path, &df, &FIRST_NAME_COLUMNS)?;
    let columns = text_columns(&df)?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let Some(name) = columns[0][row].as_deref().filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let obs = parse_number(path, row, FIRST_NAME_COLUMNS[1], columns[1][row].as_deref())?;
        let mut percentages = [0.0; NUM_RACES];
        for (slot, &position) in percentages.iter_mut().zip(FIRST_NAME_RACE_POSITIONS.iter()) {
            *slot = parse_number(
                path,
                row,
                FIRST_NAME_COLUMNS[position],
                columns[position][row].as_deref(),
            )?;
        }
        records.push(FirstNameRecord {
            name: name.to_string(),
            obs,
            percentages,
        });
    }
    log::info!("Read {} first-name rows from {}", records.len(), path.display());
    Ok(records)
}

/// Reads one population-count extract for `resolution`.
///
/// The key column is the one named after the resolution (`zcta5`, `tract`, `block`)
/// or, failing that, the first column. Keys are zero-padded to the resolution
/// width; rows with an empty key are skipped and malformed keys are an error.
pub fn read_population(path: &Path, resolution: Resolution) -> Result<PopulationCounts, BifsgError> {
    let df = read_frame(path)?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.as_str().to_ascii_lowercase())
        .collect();
    let columns = text_columns(&df)?;

    let key_position = names
        .iter()
        .position(|n| n == resolution.key_column())
        .unwrap_or(0);
    let count_positions = RAW_COUNT_COLUMNS
        .iter()
        .map(|wanted| {
            names.iter().position(|n| n == wanted).ok_or_else(|| {
                BifsgError::invalid_extract(path, format!("count column '{wanted}' not found"))
            })
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let mut keys = Vec::with_capacity(df.height());
    let mut flat = Vec::with_capacity(df.height() * RAW_COUNT_COLUMNS.len());
    for row in 0..df.height() {
        let raw_key = columns[key_position][row].as_deref().unwrap_or_default();
        if raw_key.trim().is_empty() {
            continue;
        }
        let key = normalize_geography(raw_key, resolution).ok_or_else(|| {
            BifsgError::invalid_extract(
                path,
                format!(
                    "row {}: '{raw_key}' is not a {resolution} code of at most {} digits",
                    row + 1,
                    resolution.code_width()
                ),
            )
        })?;
        keys.push(key);
        for &position in &count_positions {
            flat.push(parse_number(
                path,
                row,
                &names[position],
                columns[position][row].as_deref(),
            )?);
        }
    }

    let counts = Array2::from_shape_vec((keys.len(), RAW_COUNT_COLUMNS.len()), flat)
        .map_err(|e| BifsgError::invalid_extract(path, e.to_string()))?;
    log::debug!("Read {} {resolution} rows from {}", keys.len(), path.display());
    PopulationCounts::new(keys, counts)
}

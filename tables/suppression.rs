//! # Suppression Imputation
//!
//! The Census suppresses small race percentages in the surname extract. For a row
//! with `k` suppressed cells whose known cells sum to `S`, each suppressed cell is
//! filled with `(1 - S) / k` and the row is rounded to four digits. Rows without
//! suppressed cells pass through unchanged.
//!
//! When `S > 1` the fill is negative. The imputer reports that raw value as is;
//! what to do with such rows is decided by a `ResidualPolicy` in the builder.

use super::{PROBABILITY_DIGITS, round_to};
use crate::types::NUM_RACES;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A row of race probabilities, with `None` marking a suppressed cell.
pub type SuppressedRow = [Option<f64>; NUM_RACES];

/// The outcome of imputing one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImputedRow {
    pub values: [f64; NUM_RACES],
    /// Number of cells that were suppressed.
    pub suppressed: usize,
    /// The value written into each suppressed cell, before rounding.
    pub fill: Option<f64>,
}

impl ImputedRow {
    pub fn has_negative_residual(&self) -> bool {
        self.fill.is_some_and(|f| f < 0.0)
    }
}

/// What the builder does with a row whose known cells already exceed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidualPolicy {
    /// Set suppressed cells to zero and rescale the known cells to sum to one.
    #[default]
    Clamp,
    /// Leave the row out of the table.
    Drop,
}

pub fn impute_row(cells: &SuppressedRow) -> ImputedRow {
    let suppressed = cells.iter().filter(|c| c.is_none()).count();
    if suppressed == 0 {
        return ImputedRow {
            values: cells.map(|c| c.unwrap_or_default()),
            suppressed,
            fill: None,
        };
    }

    let known_sum: f64 = cells.iter().flatten().sum();
    let fill = (1.0 - known_sum) / suppressed as f64;
    ImputedRow {
        values: cells.map(|c| round_to(c.unwrap_or(fill), PROBABILITY_DIGITS)),
        suppressed,
        fill: Some(fill),
    }
}

/// Imputes every row independently, in parallel. Output order matches input order.
pub fn impute_rows(rows: &[SuppressedRow]) -> Vec<ImputedRow> {
    rows.par_iter().map(impute_row).collect()
}

/// Applies `policy` to a row. Rows with a non-negative fill are returned unchanged.
pub fn resolve_residual(
    cells: &SuppressedRow,
    imputed: ImputedRow,
    policy: ResidualPolicy,
) -> Option<[f64; NUM_RACES]> {
    if !imputed.has_negative_residual() {
        return Some(imputed.values);
    }
    match policy {
        ResidualPolicy::Drop => None,
        ResidualPolicy::Clamp => {
            let known_sum: f64 = cells.iter().flatten().sum();
            Some(cells.map(|c| {
                c.map_or(0.0, |v| round_to(v / known_sum, PROBABILITY_DIGITS))
            }))
        }
    }
}

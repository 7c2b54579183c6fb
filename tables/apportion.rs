// ========================================================================================
//                     APPORTIONMENT OF THE "OTHER RACE" POPULATION
// ========================================================================================
//
// Census population counts carry an "other" race bucket that the surname and
// first-name tables do not have. Each geography row's "other" count is reallocated
// into the six named categories in proportion to that row's known composition:
//
//   share[r]  = count[r] / (total - other)
//   count[r] += share[r] * other
//
// This is one proportional pass, not an iterated fit to convergence. Because the
// shares of a row sum to one, the named counts after apportionment sum to the row's
// original total. A row with no population outside "other" has no composition to
// apportion by and is dropped.

use crate::error::BifsgError;
use crate::table::ProbabilityTable;
use crate::types::{Direction, NUM_RACES, RaceCategory};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::BTreeMap;

/// Raw count columns, in the order `PopulationCounts` stores them.
pub const RAW_COUNT_COLUMNS: [&str; 8] = [
    "white", "black", "native", "asian", "pi", "other", "multiple", "hispanic",
];

const WHITE: usize = 0;
const BLACK: usize = 1;
const NATIVE: usize = 2;
const ASIAN: usize = 3;
const PI: usize = 4;
const OTHER: usize = 5;
const MULTIPLE: usize = 6;
const HISPANIC: usize = 7;

/// Raw population counts per geography key, columns in `RAW_COUNT_COLUMNS` order.
#[derive(Debug, Clone)]
pub struct PopulationCounts {
    keys: Vec<String>,
    counts: Array2<f64>,
}

impl PopulationCounts {
    pub fn new(keys: Vec<String>, counts: Array2<f64>) -> Result<Self, BifsgError> {
        if counts.ncols() != RAW_COUNT_COLUMNS.len() || counts.nrows() != keys.len() {
            return Err(BifsgError::invalid_table(
                "population counts",
                format!(
                    "expected {} keys x {} count columns, found {} x {}",
                    keys.len(),
                    RAW_COUNT_COLUMNS.len(),
                    counts.nrows(),
                    counts.ncols()
                ),
            ));
        }
        if let Some(bad) = counts.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(BifsgError::invalid_table(
                "population counts",
                format!("count {bad} is not a non-negative number"),
            ));
        }
        Ok(Self { keys, counts })
    }

    /// Combines several extracts, summing the counts of keys that appear more than
    /// once (ZCTAs that cross state lines). The result is sorted by key.
    pub fn merge<I>(parts: I) -> Result<Self, BifsgError>
    where
        I: IntoIterator<Item = PopulationCounts>,
    {
        let mut totals: BTreeMap<String, [f64; RAW_COUNT_COLUMNS.len()]> = BTreeMap::new();
        for part in parts {
            for (key, row) in part.keys.into_iter().zip(part.counts.axis_iter(Axis(0))) {
                let acc = totals.entry(key).or_insert([0.0; RAW_COUNT_COLUMNS.len()]);
                for (a, v) in acc.iter_mut().zip(row.iter()) {
                    *a += v;
                }
            }
        }

        let mut keys = Vec::with_capacity(totals.len());
        let mut flat = Vec::with_capacity(totals.len() * RAW_COUNT_COLUMNS.len());
        for (key, row) in totals {
            keys.push(key);
            flat.extend_from_slice(&row);
        }
        let counts = Array2::from_shape_vec((keys.len(), RAW_COUNT_COLUMNS.len()), flat)
            .map_err(|e| BifsgError::invalid_table("population counts", e.to_string()))?;
        Ok(Self { keys, counts })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Counts after the "other" bucket has been reallocated, columns in `RaceCategory` order.
#[derive(Debug, Clone)]
pub struct ApportionedCounts {
    pub keys: Vec<String>,
    pub counts: Array2<f64>,
    /// Each row's total population before apportionment.
    pub totals: Array1<f64>,
}

/// Apportions one raw row. Returns `None` when nothing outside "other" was counted.
fn apportion_row(row: ArrayView1<'_, f64>) -> Option<([f64; NUM_RACES], f64)> {
    let mut named = [0.0; NUM_RACES];
    named[RaceCategory::White.index()] = row[WHITE];
    named[RaceCategory::Black.index()] = row[BLACK];
    named[RaceCategory::Api.index()] = row[ASIAN] + row[PI];
    named[RaceCategory::Native.index()] = row[NATIVE];
    named[RaceCategory::Multiple.index()] = row[MULTIPLE];
    named[RaceCategory::Hispanic.index()] = row[HISPANIC];

    let other = row[OTHER];
    let known: f64 = named.iter().sum();
    let total = known + other;
    if known <= 0.0 {
        return None;
    }
    for count in named.iter_mut() {
        *count += *count / known * other;
    }
    Some((named, total))
}

/// Reallocates "other" in every row and drops rows without apportionable mass.
pub fn apportion(population: &PopulationCounts) -> Result<ApportionedCounts, BifsgError> {
    let rows: Vec<Option<([f64; NUM_RACES], f64)>> = population
        .counts
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(apportion_row)
        .collect();

    let mut keys = Vec::with_capacity(rows.len());
    let mut flat = Vec::with_capacity(rows.len() * NUM_RACES);
    let mut totals = Vec::with_capacity(rows.len());
    for (key, row) in population.keys.iter().zip(rows) {
        if let Some((named, total)) = row {
            keys.push(key.clone());
            flat.extend_from_slice(&named);
            totals.push(total);
        }
    }
    let dropped = population.len() - keys.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} geographies with no population outside 'other'");
    }

    let counts = Array2::from_shape_vec((keys.len(), NUM_RACES), flat)
        .map_err(|e| BifsgError::invalid_table("apportioned counts", e.to_string()))?;
    Ok(ApportionedCounts {
        keys,
        counts,
        totals: Array1::from_vec(totals),
    })
}

/// Produces the race-given-geography and geography-given-race tables from raw counts.
pub fn apportioned_tables(
    population: &PopulationCounts,
    race_given_name: &str,
    given_race_name: &str,
) -> Result<(ProbabilityTable, ProbabilityTable), BifsgError> {
    let apportioned = apportion(population)?;
    let race_given = ProbabilityTable::from_counts(
        race_given_name,
        Direction::RaceGivenProxy,
        apportioned.keys.clone(),
        apportioned.counts.clone(),
    )?;
    let given_race = ProbabilityTable::from_counts(
        given_race_name,
        Direction::ProxyGivenRace,
        apportioned.keys,
        apportioned.counts,
    )?;
    Ok((race_given, given_race))
}

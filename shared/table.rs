// ========================================================================================
//
//                          THE CONDITIONAL PROBABILITY TABLE
//
// ========================================================================================
//
// A `ProbabilityTable` maps a normalized proxy key (a name, a geography code) to
// one probability per race category. The successful construction of a table is a
// guarantee that keys are unique and every cell is a finite value in [0, 1].
// Rows without complete race coverage are never stored: a lookup miss is the only
// way an undefined value enters the inference engine.

use crate::error::BifsgError;
use crate::types::{Direction, NUM_RACES, RaceCategory};
use ahash::AHashMap;
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ProbabilityTable {
    name: String,
    direction: Direction,
    keys: Vec<String>,
    /// Shape: [keys.len(), NUM_RACES], columns in `RaceCategory` order.
    values: Array2<f64>,
    index: AHashMap<String, usize>,
}

impl ProbabilityTable {
    /// Validates and indexes a table. Row order is preserved.
    pub fn new(
        name: impl Into<String>,
        direction: Direction,
        keys: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, BifsgError> {
        let name = name.into();
        if values.ncols() != NUM_RACES {
            return Err(BifsgError::invalid_table(
                name,
                format!("expected {NUM_RACES} race columns, found {}", values.ncols()),
            ));
        }
        if values.nrows() != keys.len() {
            return Err(BifsgError::invalid_table(
                name,
                format!(
                    "{} keys but {} value rows",
                    keys.len(),
                    values.nrows()
                ),
            ));
        }

        for (row_idx, row) in values.axis_iter(Axis(0)).enumerate() {
            if let Some((col, &v)) = row
                .iter()
                .enumerate()
                .find(|&(_, &v)| !v.is_finite() || !(0.0..=1.0).contains(&v))
            {
                return Err(BifsgError::invalid_table(
                    name,
                    format!(
                        "key '{}' has {} = {v}, expected a probability in [0, 1]",
                        keys[row_idx],
                        RaceCategory::ALL[col]
                    ),
                ));
            }
        }

        let mut index = AHashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if index.insert(key.clone(), i).is_some() {
                return Err(BifsgError::invalid_table(
                    name,
                    format!("duplicate key '{key}'"),
                ));
            }
        }

        Ok(Self {
            name,
            direction,
            keys,
            values,
            index,
        })
    }

    /// Builds a table from `(key, probabilities)` pairs, sorted by key.
    pub fn from_rows<I>(
        name: impl Into<String>,
        direction: Direction,
        rows: I,
    ) -> Result<Self, BifsgError>
    where
        I: IntoIterator<Item = (String, [f64; NUM_RACES])>,
    {
        let mut rows: Vec<(String, [f64; NUM_RACES])> = rows.into_iter().collect();
        rows.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let mut keys = Vec::with_capacity(rows.len());
        let mut flat = Vec::with_capacity(rows.len() * NUM_RACES);
        for (key, probs) in rows {
            keys.push(key);
            flat.extend_from_slice(&probs);
        }
        let values = Array2::from_shape_vec((keys.len(), NUM_RACES), flat)
            .map_err(|e| BifsgError::invalid_table("<rows>", e.to_string()))?;
        Self::new(name, direction, keys, values)
    }

    /// Normalizes a non-negative count matrix into a table of the requested direction.
    ///
    /// `RaceGivenProxy` divides each row by its row sum; `ProxyGivenRace` divides each
    /// race column by its column sum. Any row left with an undefined cell (a zero
    /// denominator) is dropped, so the table only holds keys with complete race coverage.
    pub fn from_counts(
        name: impl Into<String>,
        direction: Direction,
        keys: Vec<String>,
        counts: Array2<f64>,
    ) -> Result<Self, BifsgError> {
        let name = name.into();
        let mut normalized = counts;
        match direction {
            Direction::RaceGivenProxy => {
                normalized
                    .axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .for_each(|mut row| {
                        let total = row.sum();
                        row.mapv_inplace(|v| v / total);
                    });
            }
            Direction::ProxyGivenRace => {
                let totals = normalized.sum_axis(Axis(0));
                normalized /= &totals;
            }
        }

        let keep: Vec<usize> = normalized
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();
        let dropped = keys.len() - keep.len();
        if dropped > 0 {
            log::warn!(
                "{name}: dropped {dropped} of {} rows without complete race coverage",
                keys.len()
            );
        }

        let values = normalized.select(Axis(0), &keep);
        let mut keys = keys;
        let kept_keys = keep.iter().map(|&i| std::mem::take(&mut keys[i])).collect();
        Self::new(name, direction, kept_keys, values)
    }

    /// Concatenates tables of one direction into a single table sorted by key.
    pub fn concat<'a, I>(name: impl Into<String>, tables: I) -> Result<Self, BifsgError>
    where
        I: IntoIterator<Item = &'a ProbabilityTable>,
    {
        let name = name.into();
        let mut direction = None;
        let mut rows = Vec::new();
        for table in tables {
            match direction {
                None => direction = Some(table.direction),
                Some(d) if d != table.direction => {
                    return Err(BifsgError::invalid_table(
                        name,
                        format!(
                            "cannot concatenate a {} table with a {} table",
                            d, table.direction
                        ),
                    ));
                }
                Some(_) => {}
            }
            rows.extend(table.iter().map(|(k, v)| (k.to_string(), row_array(v))));
        }
        let direction = direction.ok_or_else(|| {
            BifsgError::invalid_table(name.clone(), "no tables to concatenate")
        })?;
        Self::from_rows(name, direction, rows)
    }

    /// Splits the table by the first `prefix_len` characters of each key.
    pub fn partition_by_prefix(
        &self,
        prefix_len: usize,
    ) -> Result<BTreeMap<String, ProbabilityTable>, BifsgError> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, key) in self.keys.iter().enumerate() {
            let prefix = key.get(..prefix_len).ok_or_else(|| {
                BifsgError::invalid_table(
                    self.name.clone(),
                    format!("key '{key}' is shorter than the partition prefix"),
                )
            })?;
            groups.entry(prefix.to_string()).or_default().push(i);
        }

        groups
            .into_iter()
            .map(|(prefix, rows)| {
                let keys = rows.iter().map(|&i| self.keys[i].clone()).collect();
                let values = self.values.select(Axis(0), &rows);
                let table = Self::new(
                    format!("{}__{prefix}", self.name),
                    self.direction,
                    keys,
                    values,
                )?;
                Ok((prefix, table))
            })
            .collect()
    }

    /// Left-joins a column of keys against the table.
    ///
    /// The output has one row per input key. `None` keys and keys absent from the
    /// table produce an all-NaN row so that downstream arithmetic stays undefined.
    pub fn lookup<S: AsRef<str>>(&self, keys: &[Option<S>]) -> Array2<f64> {
        let mut out = Array2::from_elem((keys.len(), NUM_RACES), f64::NAN);
        for (mut out_row, key) in out.axis_iter_mut(Axis(0)).zip(keys) {
            if let Some(row) = key.as_ref().and_then(|k| self.row(k.as_ref())) {
                out_row.assign(&row);
            }
        }
        out
    }

    /// Checks the normalization invariant of the table's direction.
    pub fn check_normalized(&self, tolerance: f64) -> Result<(), BifsgError> {
        match self.direction {
            Direction::RaceGivenProxy => {
                for (key, row) in self.iter() {
                    let sum = row.sum();
                    if (sum - 1.0).abs() > tolerance {
                        return Err(BifsgError::invalid_table(
                            self.name.clone(),
                            format!("row '{key}' sums to {sum}"),
                        ));
                    }
                }
            }
            Direction::ProxyGivenRace => {
                for (race, sum) in RaceCategory::ALL.iter().zip(self.column_sums()) {
                    if (sum - 1.0).abs() > tolerance {
                        return Err(BifsgError::invalid_table(
                            self.name.clone(),
                            format!("column '{race}' sums to {sum}"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn column_sums(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(0))
    }

    pub fn row(&self, key: &str) -> Option<ArrayView1<'_, f64>> {
        self.index.get(key).map(|&i| self.values.row(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f64>)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.values.axis_iter(Axis(0)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn row_array(row: ArrayView1<'_, f64>) -> [f64; NUM_RACES] {
    let mut out = [0.0; NUM_RACES];
    for (dst, &src) in out.iter_mut().zip(row.iter()) {
        *dst = src;
    }
    out
}

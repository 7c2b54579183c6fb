// ========================================================================================
//
//                        BLOCK-LEVEL PARTITIONED TABLE LOADING
//
// ========================================================================================
//
// The block-resolution geography table is stored as one file per 2-digit state FIPS
// code. Together the files form one logical table. The loader is handed an explicit
// index (state code -> file) at construction, loads only the partitions a batch
// needs, and keeps each loaded partition for its own lifetime. Reference tables are
// immutable for a census vintage, so a cached partition is never invalidated.

use crate::error::BifsgError;
use crate::files::{STATE_PREFIX_LEN, TableLayout, read_table};
use crate::table::ProbabilityTable;
use crate::types::{Direction, NUM_RACES, Resolution};
use ahash::AHashMap;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A mapping from 2-digit state code to the storage location of that state's partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionIndex {
    entries: BTreeMap<String, PathBuf>,
}

impl PartitionIndex {
    /// Builds an index from an explicit mapping.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Scans `dir` once for block partition files of one direction.
    pub fn discover(
        dir: &Path,
        layout: &TableLayout,
        direction: Direction,
    ) -> Result<Self, BifsgError> {
        let mut entries = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(state) = layout.parse_partition_file_name(file_name, direction) {
                entries.insert(state, entry.path());
            }
        }
        log::debug!(
            "Discovered {} block partitions ({direction}) in {}",
            entries.len(),
            dir.display()
        );
        Ok(Self { entries })
    }

    pub fn get(&self, state: &str) -> Option<&Path> {
        self.entries.get(state).map(PathBuf::as_path)
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extracts the distinct state prefixes of a column of normalized block keys.
pub fn state_prefixes<S: AsRef<str>>(keys: &[Option<S>]) -> BTreeSet<String> {
    keys.iter()
        .flatten()
        .filter_map(|k| k.as_ref().get(..STATE_PREFIX_LEN))
        .map(str::to_string)
        .collect()
}

/// Loads block partitions on demand and caches them per state code.
#[derive(Debug)]
pub struct PartitionedLoader {
    index: PartitionIndex,
    direction: Direction,
    cache: AHashMap<String, Arc<ProbabilityTable>>,
}

impl PartitionedLoader {
    pub fn new(index: PartitionIndex, direction: Direction) -> Self {
        Self {
            index,
            direction,
            cache: AHashMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn index(&self) -> &PartitionIndex {
        &self.index
    }

    /// The number of partitions currently held in memory.
    pub fn cached_partitions(&self) -> usize {
        self.cache.len()
    }

    /// Left-joins normalized block keys against the cached partitions.
    ///
    /// Each key is routed to its state's partition by prefix, so no merged table is
    /// built. Partitions for the batch are loaded first, with the same all-or-nothing
    /// rule as [`load`](Self::load). Unresolved keys and blocks absent from their
    /// state's partition come back as all-NaN rows.
    pub fn lookup(&mut self, keys: &[Option<String>]) -> Result<Array2<f64>, BifsgError> {
        let states = state_prefixes(keys);
        let mut out = Array2::from_elem((keys.len(), NUM_RACES), f64::NAN);
        if states.is_empty() {
            return Ok(out);
        }
        self.ensure_loaded(&states)?;

        for (mut out_row, key) in out.axis_iter_mut(Axis(0)).zip(keys) {
            let Some(key) = key.as_deref() else {
                continue;
            };
            let row = key
                .get(..STATE_PREFIX_LEN)
                .and_then(|state| self.cache.get(state))
                .and_then(|partition| partition.row(key));
            if let Some(row) = row {
                out_row.assign(&row);
            }
        }
        Ok(out)
    }

    /// Returns one table holding exactly the partitions for `states`, sorted by key.
    ///
    /// Every requested state must be present in the index; otherwise nothing is loaded
    /// and the whole request fails with `MissingPartition`.
    pub fn load(&mut self, states: &BTreeSet<String>) -> Result<ProbabilityTable, BifsgError> {
        self.ensure_loaded(states)?;
        let parts: Vec<&ProbabilityTable> = states
            .iter()
            .filter_map(|s| self.cache.get(s).map(Arc::as_ref))
            .collect();
        let name = format!("prob_block_{}", self.direction);
        if parts.is_empty() {
            return ProbabilityTable::from_rows(name, self.direction, Vec::new());
        }
        ProbabilityTable::concat(name, parts)
    }

    /// Reads every partition of `states` not yet cached, in parallel.
    fn ensure_loaded(&mut self, states: &BTreeSet<String>) -> Result<(), BifsgError> {
        let missing: Vec<String> = states
            .iter()
            .filter(|s| self.index.get(s).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BifsgError::MissingPartition {
                requested: states.iter().cloned().collect(),
                missing,
            });
        }

        let to_read: Vec<(&String, &Path)> = states
            .iter()
            .filter(|s| !self.cache.contains_key(s.as_str()))
            .filter_map(|s| self.index.get(s).map(|path| (s, path)))
            .collect();
        log::debug!(
            "Block partitions requested: {}, cached: {}, to read: {}",
            states.len(),
            states.len() - to_read.len(),
            to_read.len()
        );
        if to_read.is_empty() {
            return Ok(());
        }

        let direction = self.direction;
        let loaded = to_read
            .into_par_iter()
            .map(|(state, path)| -> Result<(String, ProbabilityTable), BifsgError> {
                let table = read_table(path, direction)?;
                Ok((state.clone(), table))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (state, table) in loaded {
            log::info!(
                "Loaded block partition {state} ({} blocks) from {}",
                table.len(),
                table.name()
            );
            self.cache.insert(state, Arc::new(table));
        }
        Ok(())
    }
}

/// Directory-backed convenience for the usual on-disk layout.
pub fn discover_loader(
    dir: &Path,
    layout: &TableLayout,
    direction: Direction,
) -> Result<PartitionedLoader, BifsgError> {
    let index = PartitionIndex::discover(dir, layout, direction)?;
    if index.is_empty() {
        log::warn!(
            "No {} partitions found in {}",
            layout.geography_stem(Resolution::Block, direction),
            dir.display()
        );
    }
    Ok(PartitionedLoader::new(index, direction))
}

//! # Probability Table Persistence
//!
//! Reads and writes conditional probability tables. A persisted table is a key
//! column followed by exactly six race columns in the fixed `RaceCategory` order.
//! Keys are always handled as strings so zero-padded geography codes survive a
//! round trip through CSV.

use crate::error::BifsgError;
use crate::table::ProbabilityTable;
use crate::types::{Direction, NUM_RACES, Proxy, RaceCategory, Resolution};
use ndarray::{Array2, ShapeBuilder};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// The on-disk encoding of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Parquet,
    Csv,
}

impl TableFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Parquet => "parquet",
            TableFormat::Csv => "csv",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("parquet") | Some("pq") => Some(TableFormat::Parquet),
            Some("csv") => Some(TableFormat::Csv),
            _ => None,
        }
    }
}

/// The naming scheme shared by the table builder and the inference engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    /// Census vintage embedded in surname and geography file names.
    pub vintage: String,
    /// Source tag embedded in first-name file names.
    pub first_name_source: String,
    pub format: TableFormat,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            vintage: "2010".to_string(),
            first_name_source: "harvard".to_string(),
            format: TableFormat::default(),
        }
    }
}

/// Separator between a block table stem and its state code.
const PARTITION_SEPARATOR: &str = "__";

/// Length of the state FIPS prefix of tract and block keys.
pub const STATE_PREFIX_LEN: usize = 2;

impl TableLayout {
    pub fn surname_stem(&self) -> String {
        format!("prob_race_given_surname_{}", self.vintage)
    }

    pub fn first_name_stem(&self, direction: Direction) -> String {
        match direction {
            Direction::RaceGivenProxy => {
                format!("prob_race_given_first_name_{}", self.first_name_source)
            }
            Direction::ProxyGivenRace => {
                format!("prob_first_name_given_race_{}", self.first_name_source)
            }
        }
    }

    pub fn geography_stem(&self, resolution: Resolution, direction: Direction) -> String {
        match direction {
            Direction::RaceGivenProxy => {
                format!("prob_race_given_{}_{}", resolution.token(), self.vintage)
            }
            Direction::ProxyGivenRace => {
                format!("prob_{}_given_race_{}", resolution.token(), self.vintage)
            }
        }
    }

    pub fn partition_stem(&self, direction: Direction, state: &str) -> String {
        format!(
            "{}{PARTITION_SEPARATOR}{state}",
            self.geography_stem(Resolution::Block, direction)
        )
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.format.extension())
    }

    /// Recognizes a block partition file of the given direction and returns its state code.
    pub fn parse_partition_file_name(&self, file_name: &str, direction: Direction) -> Option<String> {
        let stem = file_name.strip_suffix(&format!(".{}", self.format.extension()))?;
        let (table, state) = stem.rsplit_once(PARTITION_SEPARATOR)?;
        let valid_state =
            state.len() == STATE_PREFIX_LEN && state.bytes().all(|b| b.is_ascii_digit());
        (table == self.geography_stem(Resolution::Block, direction) && valid_state)
            .then(|| state.to_string())
    }
}

/// Writes a table with its key column named after the proxy.
pub fn write_table(table: &ProbabilityTable, proxy: Proxy, path: &Path) -> Result<(), BifsgError> {
    let format = TableFormat::from_path(path).ok_or_else(|| {
        BifsgError::invalid_table(
            table.name(),
            format!("unsupported output extension for '{}'", path.display()),
        )
    })?;

    let mut columns: Vec<Column> = Vec::with_capacity(NUM_RACES + 1);
    columns.push(Series::new(proxy.key_column().into(), table.keys()).into());
    for race in RaceCategory::ALL {
        let values = table.values().column(race.index()).to_vec();
        columns.push(Series::new(race.column_name().into(), values).into());
    }
    let mut df = DataFrame::new(columns)?;

    let mut file = File::create(path)?;
    match format {
        TableFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut df)?;
        }
        TableFormat::Parquet => {
            ParquetWriter::new(&mut file).finish(&mut df)?;
        }
    }
    log::debug!(
        "Wrote {} rows of {} to {}",
        table.len(),
        table.name(),
        path.display()
    );
    Ok(())
}

/// Reads a persisted table and validates it against the table contract.
pub fn read_table(path: &Path, direction: Direction) -> Result<ProbabilityTable, BifsgError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("<table>")
        .to_string();

    let df = read_frame(path)?;
    let columns = df.get_columns();
    if columns.len() != NUM_RACES + 1 {
        return Err(BifsgError::invalid_table(
            name,
            format!(
                "expected a key column and {NUM_RACES} race columns, found {} columns",
                columns.len()
            ),
        ));
    }

    let key_column = columns[0].cast(&DataType::String)?;
    let keys = key_column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, key)| {
            key.map(str::to_string).ok_or_else(|| {
                BifsgError::invalid_table(name.clone(), format!("missing key at row {}", row + 1))
            })
        })
        .collect::<Result<Vec<String>, _>>()?;

    let mut flat = Vec::with_capacity(keys.len() * NUM_RACES);
    for race in RaceCategory::ALL {
        let column = df.column(race.column_name()).map_err(|_| {
            BifsgError::invalid_table(name.clone(), format!("column '{race}' not found"))
        })?;
        let casted = column.cast(&DataType::Float64)?;
        let values = casted.f64()?;
        if values.null_count() > 0 {
            return Err(BifsgError::invalid_table(
                name,
                format!("column '{race}' has missing cells"),
            ));
        }
        flat.extend(values.into_no_null_iter());
    }

    // The buffer was filled one race column at a time.
    let values = Array2::from_shape_vec((keys.len(), NUM_RACES).f(), flat)
        .map_err(|e| BifsgError::invalid_table(name.clone(), e.to_string()))?;
    ProbabilityTable::new(name, direction, keys, values)
}

/// Reads a tabular file. CSV cells are all read as strings; callers cast as needed.
pub(crate) fn read_frame(path: &Path) -> Result<DataFrame, BifsgError> {
    let file = File::open(path)?;
    match TableFormat::from_path(path) {
        Some(TableFormat::Parquet) => Ok(ParquetReader::new(file).finish()?),
        _ => Ok(CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(file)
            .finish()?),
    }
}

// ========================================================================================
//
//                               REFERENCE TABLE BUILDER
//
// ========================================================================================
//
// Turns raw extracts into the persisted probability tables the inference engine
// reads. The pure `*_table(s)` functions do the transformation; `TableBuilder`
// adds file naming, I/O and per-unit reporting on top of them.

use super::apportion::{PopulationCounts, apportioned_tables};
use super::extract::{FirstNameRecord, SurnameRecord, read_first_names, read_population, read_surnames};
use super::suppression::{ResidualPolicy, SuppressedRow, impute_rows, resolve_residual};
use super::{PROBABILITY_DIGITS, round_to};
use crate::error::BifsgError;
use crate::files::{STATE_PREFIX_LEN, TableLayout, write_table};
use crate::normalize::normalize_name;
use crate::table::ProbabilityTable;
use crate::types::{Direction, NUM_RACES, Proxy, Resolution};
use ahash::AHashSet;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ndarray::Array2;
use rayon::prelude::*;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

fn percent_to_probability(value: f64) -> f64 {
    value / 100.0
}

/// Normalizes record names and keeps the first occurrence of each key.
fn canonical_records<'a, T, F>(records: &'a [T], table: &str, name_of: F) -> Vec<(String, &'a T)>
where
    F: Fn(&T) -> &str,
{
    let mut seen = AHashSet::with_capacity(records.len());
    let mut unusable = 0usize;
    let mut duplicates = 0usize;
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        match normalize_name(name_of(record)) {
            None => unusable += 1,
            Some(key) if !seen.insert(key.clone()) => duplicates += 1,
            Some(key) => out.push((key, record)),
        }
    }
    if unusable > 0 {
        log::warn!("{table}: skipped {unusable} rows whose name has no letters");
    }
    if duplicates > 0 {
        log::warn!("{table}: kept the first of {duplicates} rows with a repeated name");
    }
    out
}

/// Builds the race-given-surname table.
///
/// Percentages are scaled to probabilities, suppressed cells are imputed and each
/// row is rounded to four digits. Rows whose known cells already exceed one are
/// handled by `policy`.
pub fn surname_table(
    name: &str,
    records: &[SurnameRecord],
    policy: ResidualPolicy,
) -> Result<ProbabilityTable, BifsgError> {
    let canonical = canonical_records(records, name, |r| r.name.as_str());
    let scaled: Vec<SuppressedRow> = canonical
        .iter()
        .map(|(_, r)| r.percentages.map(|c| c.map(percent_to_probability)))
        .collect();
    let imputed = impute_rows(&scaled);

    let negative = imputed.iter().filter(|i| i.has_negative_residual()).count();
    if negative > 0 {
        log::warn!(
            "{name}: {negative} rows have known shares above one before imputation ({policy:?} applied)"
        );
    }

    let rows = canonical
        .into_iter()
        .zip(scaled.iter().zip(imputed))
        .filter_map(|((key, _), (cells, row))| {
            resolve_residual(cells, row, policy)
                .map(|values| (key, values.map(|v| round_to(v, PROBABILITY_DIGITS))))
        });
    let table = ProbabilityTable::from_rows(name, Direction::RaceGivenProxy, rows)?;
    log::info!("{name}: {} surnames", table.len());
    Ok(table)
}

/// Builds both first-name tables.
///
/// The race-given-first-name table is the published percentages scaled and rounded.
/// The first-name-given-race table weights each name by its observation count and
/// divides every race column by its total.
pub fn first_name_tables(
    race_given_name: &str,
    given_race_name: &str,
    records: &[FirstNameRecord],
) -> Result<(ProbabilityTable, ProbabilityTable), BifsgError> {
    let canonical = canonical_records(records, race_given_name, |r| r.name.as_str());

    let race_given = ProbabilityTable::from_rows(
        race_given_name,
        Direction::RaceGivenProxy,
        canonical.iter().map(|(key, r)| {
            (
                key.clone(),
                r.percentages
                    .map(|p| round_to(percent_to_probability(p), PROBABILITY_DIGITS)),
            )
        }),
    )?;

    let mut keys = Vec::with_capacity(canonical.len());
    let mut flat = Vec::with_capacity(canonical.len() * NUM_RACES);
    for (key, record) in canonical {
        keys.push(key);
        flat.extend(
            record
                .percentages
                .iter()
                .map(|&p| percent_to_probability(p) * record.obs),
        );
    }
    let counts = Array2::from_shape_vec((keys.len(), NUM_RACES), flat)
        .map_err(|e| BifsgError::invalid_table(given_race_name, e.to_string()))?;
    let given_race =
        ProbabilityTable::from_counts(given_race_name, Direction::ProxyGivenRace, keys, counts)?;

    log::info!(
        "{race_given_name}: {} first names ({} with race coverage in {given_race_name})",
        race_given.len(),
        given_race.len()
    );
    Ok((race_given, given_race))
}

/// Builds both directions of a geography table from merged population counts.
pub fn geography_tables(
    layout: &TableLayout,
    resolution: Resolution,
    population: &PopulationCounts,
) -> Result<(ProbabilityTable, ProbabilityTable), BifsgError> {
    apportioned_tables(
        population,
        &layout.geography_stem(resolution, Direction::RaceGivenProxy),
        &layout.geography_stem(resolution, Direction::ProxyGivenRace),
    )
}

/// A raw extract that could not be turned into counts.
#[derive(Debug)]
pub struct UnitFailure {
    pub path: PathBuf,
    pub error: BifsgError,
}

/// The per-unit outcome of a geography build.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Extracts that were read successfully.
    pub succeeded: Vec<PathBuf>,
    /// Extracts that failed, with the cause.
    pub failed: Vec<UnitFailure>,
    /// Tables written to disk.
    pub written: Vec<PathBuf>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };
    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    pb.set_style(
        ProgressStyle::with_template("> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Writes built tables into one output directory using a `TableLayout`.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    out_dir: PathBuf,
    layout: TableLayout,
    residual_policy: ResidualPolicy,
}

impl TableBuilder {
    pub fn new(out_dir: impl Into<PathBuf>, layout: TableLayout) -> Self {
        Self {
            out_dir: out_dir.into(),
            layout,
            residual_policy: ResidualPolicy::default(),
        }
    }

    pub fn with_residual_policy(mut self, policy: ResidualPolicy) -> Self {
        self.residual_policy = policy;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    fn write(&self, table: &ProbabilityTable, proxy: Proxy) -> Result<PathBuf, BifsgError> {
        let path = self.out_dir.join(self.layout.file_name(table.name()));
        write_table(table, proxy, &path)?;
        Ok(path)
    }

    /// Builds and writes the race-given-surname table from the Census extract.
    pub fn build_surnames(&self, extract: &Path) -> Result<PathBuf, BifsgError> {
        std::fs::create_dir_all(&self.out_dir)?;
        let records = read_surnames(extract)?;
        let table = surname_table(&self.layout.surname_stem(), &records, self.residual_policy)?;
        self.write(&table, Proxy::Surname)
    }

    /// Builds and writes both first-name tables from the Harvard extract.
    pub fn build_first_names(&self, extract: &Path) -> Result<Vec<PathBuf>, BifsgError> {
        std::fs::create_dir_all(&self.out_dir)?;
        let records = read_first_names(extract)?;
        let (race_given, given_race) = first_name_tables(
            &self.layout.first_name_stem(Direction::RaceGivenProxy),
            &self.layout.first_name_stem(Direction::ProxyGivenRace),
            &records,
        )?;
        Ok(vec![
            self.write(&race_given, Proxy::FirstName)?,
            self.write(&given_race, Proxy::FirstName)?,
        ])
    }

    /// Builds both geography tables for `resolution` from per-state population extracts.
    ///
    /// Extracts are read in parallel and each one succeeds or fails on its own. The
    /// build fails only when no extract could be read; otherwise the failures are
    /// listed in the returned report. Block tables are written as one file per state.
    pub fn build_geography(
        &self,
        resolution: Resolution,
        extracts: &[PathBuf],
    ) -> Result<BuildReport, BifsgError> {
        std::fs::create_dir_all(&self.out_dir)?;
        let pb = create_progress_bar(extracts.len() as u64, &format!("Reading {resolution} extracts"));
        let outcomes: Vec<(PathBuf, Result<PopulationCounts, BifsgError>)> = extracts
            .par_iter()
            .map(|path| {
                let outcome = read_population(path, resolution);
                pb.inc(1);
                (path.clone(), outcome)
            })
            .collect();
        pb.finish_and_clear();

        let mut report = BuildReport::default();
        let mut parts = Vec::with_capacity(outcomes.len());
        for (path, outcome) in outcomes {
            match outcome {
                Ok(counts) => {
                    report.succeeded.push(path);
                    parts.push(counts);
                }
                Err(error) => {
                    log::warn!("Skipping extract {}: {error}", path.display());
                    report.failed.push(UnitFailure { path, error });
                }
            }
        }
        if parts.is_empty() {
            return Err(match report.failed.into_iter().next() {
                Some(UnitFailure { path, error }) => BifsgError::invalid_extract(
                    path,
                    format!("no {resolution} extract could be read; first failure: {error}"),
                ),
                None => BifsgError::invalid_extract(
                    self.out_dir.clone(),
                    format!("no {resolution} extracts were given"),
                ),
            });
        }

        let population = PopulationCounts::merge(parts)?;
        log::info!(
            "Merged {} {resolution} rows from {} extracts",
            population.len(),
            report.succeeded.len()
        );
        let (race_given, given_race) = geography_tables(&self.layout, resolution, &population)?;

        let proxy = Proxy::Geography(resolution);
        if resolution.is_partitioned() {
            for table in [&race_given, &given_race] {
                report.written.extend(self.write_partitions(table, proxy)?);
            }
        } else {
            report.written.push(self.write(&race_given, proxy)?);
            report.written.push(self.write(&given_race, proxy)?);
        }
        Ok(report)
    }

    /// Splits a block table by state prefix and writes each part in parallel.
    fn write_partitions(
        &self,
        table: &ProbabilityTable,
        proxy: Proxy,
    ) -> Result<Vec<PathBuf>, BifsgError> {
        let partitions = table.partition_by_prefix(STATE_PREFIX_LEN)?;
        let pb = create_progress_bar(
            partitions.len() as u64,
            &format!("Writing {} partitions", table.name()),
        );
        let written = partitions
            .into_par_iter()
            .map(|(_, part)| {
                let path = self.write(&part, proxy);
                pb.inc(1);
                path
            })
            .collect::<Result<Vec<_>, _>>();
        pb.finish_and_clear();
        let mut written = written?;
        written.sort();
        log::info!("{}: wrote {} state partitions", table.name(), written.len());
        Ok(written)
    }
}

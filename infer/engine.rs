// ========================================================================================
//
//                              THE BAYESIAN INFERENCE ENGINE
//
// ========================================================================================
//
// The engine turns a batch of proxy values into posterior race probabilities:
//
//   posterior(r | s, f, g) = p(r|s) * p(g|r) * p(f|r) / sum_r' [ p(r'|s) * p(g|r') * p(f|r') ]
//
// BISG omits the first-name factor. Each proxy column is normalized, left-joined
// against its table (a miss is an all-NaN row), multiplied elementwise, and divided
// by the row sum. NaN propagates through both the product and the division, so a
// record with any unresolved proxy comes out entirely undefined while every other
// record is unaffected.

use crate::config::{EngineConfig, Model};
use crate::error::BifsgError;
use crate::files::{TableLayout, read_table};
use crate::normalize::{normalize_geographies, normalize_names};
use crate::partition::{PartitionedLoader, discover_loader};
use crate::table::ProbabilityTable;
use crate::types::{Direction, NUM_RACES, Proxy, RaceCategory, RaceDistribution, Resolution};
use ndarray::{Array2, ArrayView2, Axis};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

// ========================================================================================
//                                  REQUEST AND RESULT
// ========================================================================================

/// A validated batch of proxy values, one entry per individual.
///
/// The constructor is the only way to build a request, so every request
/// that reaches the engine has sequences of equal length.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    first_names: Option<Vec<String>>,
    surnames: Vec<String>,
    geography_codes: Vec<String>,
}

impl InferenceRequest {
    pub fn new(
        first_names: Option<Vec<String>>,
        surnames: Vec<String>,
        geography_codes: Vec<String>,
    ) -> Result<Self, BifsgError> {
        let first_len = first_names.as_ref().map(Vec::len);
        let lengths_match = surnames.len() == geography_codes.len()
            && first_len.is_none_or(|n| n == surnames.len());
        if !lengths_match {
            return Err(BifsgError::InputLengthMismatch {
                first_names: first_len,
                surnames: surnames.len(),
                geography_codes: geography_codes.len(),
            });
        }
        Ok(Self {
            first_names,
            surnames,
            geography_codes,
        })
    }

    pub fn bisg(surnames: Vec<String>, geography_codes: Vec<String>) -> Result<Self, BifsgError> {
        Self::new(None, surnames, geography_codes)
    }

    pub fn bifsg(
        first_names: Vec<String>,
        surnames: Vec<String>,
        geography_codes: Vec<String>,
    ) -> Result<Self, BifsgError> {
        Self::new(Some(first_names), surnames, geography_codes)
    }

    pub fn first_names(&self) -> Option<&[String]> {
        self.first_names.as_deref()
    }

    pub fn surnames(&self) -> &[String] {
        &self.surnames
    }

    pub fn geography_codes(&self) -> &[String] {
        &self.geography_codes
    }

    pub fn len(&self) -> usize {
        self.surnames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surnames.is_empty()
    }
}

/// One row per input record: the normalized proxies echoed back, plus the posterior.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    resolution: Resolution,
    first_names: Option<Vec<Option<String>>>,
    surnames: Vec<Option<String>>,
    geography_codes: Vec<Option<String>>,
    /// Shape: [records, NUM_RACES]. A row is either fully defined or all NaN.
    probabilities: Array2<f64>,
}

impl InferenceResult {
    pub fn len(&self) -> usize {
        self.surnames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surnames.is_empty()
    }

    /// The posterior for record `i`, or `None` if any of its proxies failed to resolve.
    pub fn posterior(&self, i: usize) -> Option<RaceDistribution> {
        let row = self.probabilities.row(i);
        let mut values = [0.0; NUM_RACES];
        for (dst, &src) in values.iter_mut().zip(row.iter()) {
            *dst = src;
        }
        RaceDistribution::from_row(values)
    }

    /// The number of records whose posterior is defined.
    pub fn resolved_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.posterior(i).is_some()).count()
    }

    pub fn probabilities(&self) -> ArrayView2<'_, f64> {
        self.probabilities.view()
    }

    pub fn first_names(&self) -> Option<&[Option<String>]> {
        self.first_names.as_deref()
    }

    pub fn surnames(&self) -> &[Option<String>] {
        &self.surnames
    }

    pub fn geography_codes(&self) -> &[Option<String>] {
        &self.geography_codes
    }

    /// Builds the result table. Undefined probabilities become nulls.
    pub fn to_dataframe(&self) -> Result<DataFrame, BifsgError> {
        let mut columns: Vec<Column> = Vec::with_capacity(NUM_RACES + 3);
        if let Some(first_names) = &self.first_names {
            columns.push(Series::new("first_name".into(), first_names.as_slice()).into());
        }
        columns.push(Series::new("surname".into(), self.surnames.as_slice()).into());
        columns.push(
            Series::new(
                self.resolution.key_column().into(),
                self.geography_codes.as_slice(),
            )
            .into(),
        );
        for race in RaceCategory::ALL {
            let values: Vec<Option<f64>> = self
                .probabilities
                .column(race.index())
                .iter()
                .map(|&v| v.is_finite().then_some(v))
                .collect();
            columns.push(Series::new(race.column_name().into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), BifsgError> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        Ok(())
    }
}

// ========================================================================================
//                                    TABLE SOURCES
// ========================================================================================

/// Where a proxy table comes from: fully in memory, or loaded per state on demand.
#[derive(Debug)]
pub enum TableSource {
    Table(ProbabilityTable),
    Partitioned(PartitionedLoader),
}

impl TableSource {
    pub fn direction(&self) -> Direction {
        match self {
            TableSource::Table(table) => table.direction(),
            TableSource::Partitioned(loader) => loader.direction(),
        }
    }

    /// Left-joins normalized keys. Partitions, if any, are loaded before the join.
    fn lookup(&mut self, keys: &[Option<String>]) -> Result<Array2<f64>, BifsgError> {
        match self {
            TableSource::Table(table) => Ok(table.lookup(keys)),
            TableSource::Partitioned(loader) => loader.lookup(keys),
        }
    }

    fn open(
        data_dir: &Path,
        layout: &TableLayout,
        proxy: Proxy,
        direction: Direction,
    ) -> Result<Self, BifsgError> {
        let stem = match proxy {
            Proxy::Geography(Resolution::Block) => {
                return Ok(TableSource::Partitioned(discover_loader(
                    data_dir, layout, direction,
                )?));
            }
            Proxy::Geography(resolution) => layout.geography_stem(resolution, direction),
            Proxy::Surname => layout.surname_stem(),
            Proxy::FirstName => layout.first_name_stem(direction),
        };
        let path = data_dir.join(layout.file_name(&stem));
        let table = read_table(&path, direction)?;
        log::info!("Loaded {proxy} table {} ({} rows)", table.name(), table.len());
        Ok(TableSource::Table(table))
    }
}

/// The reference tables an engine evaluates against.
#[derive(Debug)]
pub struct ReferenceTables {
    /// `p(race | surname)`.
    pub surname: ProbabilityTable,
    /// `p(first name | race)`. Required for BIFSG.
    pub first_name: Option<ProbabilityTable>,
    /// `p(geography | race)`, or `p(race | geography)` for a BISG configured that way.
    pub geography: TableSource,
}

// ========================================================================================
//                                       THE ENGINE
// ========================================================================================

#[derive(Debug)]
pub struct InferenceEngine {
    model: Model,
    resolution: Resolution,
    surname: ProbabilityTable,
    first_name: Option<ProbabilityTable>,
    geography: TableSource,
}

impl InferenceEngine {
    /// Assembles an engine from already-loaded tables, checking that every table
    /// has the direction the chosen formula expects.
    pub fn new(
        model: Model,
        resolution: Resolution,
        tables: ReferenceTables,
    ) -> Result<Self, BifsgError> {
        let ReferenceTables {
            surname,
            first_name,
            geography,
        } = tables;

        expect_direction(&surname, Direction::RaceGivenProxy, "surname")?;
        if model == Model::Bifsg {
            let table = first_name.as_ref().ok_or_else(|| {
                BifsgError::ModelMismatch("BIFSG requires a first-name table".to_string())
            })?;
            expect_direction(table, Direction::ProxyGivenRace, "first-name")?;
            if geography.direction() != Direction::ProxyGivenRace {
                return Err(BifsgError::ModelMismatch(
                    "BIFSG requires the geography-given-race table".to_string(),
                ));
            }
        }
        if matches!(geography, TableSource::Partitioned(_)) != resolution.is_partitioned() {
            return Err(BifsgError::ModelMismatch(format!(
                "{resolution} geography must {}be partitioned by state",
                if resolution.is_partitioned() { "" } else { "not " }
            )));
        }

        Ok(Self {
            model,
            resolution,
            surname,
            first_name,
            geography,
        })
    }

    /// Loads every table the configuration needs from its data directory.
    /// Block partitions are indexed here but read lazily, per batch.
    pub fn open(config: &EngineConfig) -> Result<Self, BifsgError> {
        config.validate()?;
        let layout = config.layout();
        let dir = config.data_dir.as_path();

        let surname = read_table(
            &dir.join(layout.file_name(&layout.surname_stem())),
            Direction::RaceGivenProxy,
        )?;
        let first_name = match config.model {
            Model::Bifsg => Some(read_table(
                &dir.join(layout.file_name(&layout.first_name_stem(Direction::ProxyGivenRace))),
                Direction::ProxyGivenRace,
            )?),
            Model::Bisg => None,
        };
        let geography = TableSource::open(
            dir,
            &layout,
            Proxy::Geography(config.resolution),
            config.geography_direction.table_direction(),
        )?;

        Self::new(
            config.model,
            config.resolution,
            ReferenceTables {
                surname,
                first_name,
                geography,
            },
        )
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Computes the posterior for every record of the batch.
    pub fn infer(&mut self, request: &InferenceRequest) -> Result<InferenceResult, BifsgError> {
        if self.model == Model::Bifsg && request.first_names().is_none() {
            return Err(BifsgError::ModelMismatch(
                "BIFSG requires first names for every record".to_string(),
            ));
        }
        log::info!(
            "Running {:?} over {} records at {} resolution",
            self.model,
            request.len(),
            self.resolution
        );

        let surnames = normalize_names(request.surnames());
        let first_names = request.first_names().map(normalize_names);
        let geography_codes = normalize_geographies(request.geography_codes(), self.resolution);

        let geography = self.geography.lookup(&geography_codes)?;
        let mut joint = self.surname.lookup(&surnames);
        joint *= &geography;
        if let (Model::Bifsg, Some(table), Some(names)) =
            (self.model, &self.first_name, &first_names)
        {
            joint *= &table.lookup(names);
        }

        let result = InferenceResult {
            resolution: self.resolution,
            first_names,
            surnames,
            geography_codes,
            probabilities: normalize_rows(joint),
        };
        log::info!(
            "Resolved {} of {} records",
            result.resolved_count(),
            result.len()
        );
        Ok(result)
    }
}

/// Divides each row by its sum. NaN rows and zero-sum rows come out all NaN.
fn normalize_rows(joint: Array2<f64>) -> Array2<f64> {
    let sums = joint.sum_axis(Axis(1)).insert_axis(Axis(1));
    joint / &sums
}

fn expect_direction(
    table: &ProbabilityTable,
    expected: Direction,
    what: &str,
) -> Result<(), BifsgError> {
    if table.direction() != expected {
        return Err(BifsgError::ModelMismatch(format!(
            "the {what} table '{}' is {}, expected {expected}",
            table.name(),
            table.direction()
        )));
    }
    Ok(())
}

// ========================================================================================
//                                 SINGLE-PROXY LOOKUPS
// ========================================================================================

/// Race probabilities from one proxy alone: a plain `p(race | proxy)` lookup.
#[derive(Debug)]
pub struct ProxyModel {
    proxy: Proxy,
    source: TableSource,
}

/// The output of a single-proxy lookup.
#[derive(Debug, Clone)]
pub struct ProxyResult {
    pub keys: Vec<Option<String>>,
    pub probabilities: Array2<f64>,
}

impl ProxyResult {
    pub fn distribution(&self, i: usize) -> Option<RaceDistribution> {
        let mut values = [0.0; NUM_RACES];
        for (dst, &src) in values.iter_mut().zip(self.probabilities.row(i).iter()) {
            *dst = src;
        }
        RaceDistribution::from_row(values)
    }
}

impl ProxyModel {
    pub fn new(proxy: Proxy, source: TableSource) -> Result<Self, BifsgError> {
        if source.direction() != Direction::RaceGivenProxy {
            return Err(BifsgError::ModelMismatch(format!(
                "a {proxy} lookup needs a race-given-proxy table"
            )));
        }
        Ok(Self { proxy, source })
    }

    pub fn open(data_dir: &Path, layout: &TableLayout, proxy: Proxy) -> Result<Self, BifsgError> {
        let source = TableSource::open(data_dir, layout, proxy, Direction::RaceGivenProxy)?;
        Self::new(proxy, source)
    }

    pub fn probabilities<S: AsRef<str>>(&mut self, values: &[S]) -> Result<ProxyResult, BifsgError> {
        let keys = match self.proxy {
            Proxy::Surname | Proxy::FirstName => normalize_names(values),
            Proxy::Geography(resolution) => normalize_geographies(values, resolution),
        };
        let probabilities = self.source.lookup(&keys)?;
        Ok(ProxyResult {
            keys,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn smith_table() -> ProbabilityTable {
        ProbabilityTable::from_rows(
            "prob_race_given_surname_2010",
            Direction::RaceGivenProxy,
            vec![
                ("SMITH".to_string(), [0.70, 0.10, 0.03, 0.01, 0.06, 0.10]),
                ("NGUYEN".to_string(), [0.02, 0.0, 0.95, 0.0, 0.02, 0.01]),
            ],
        )
        .unwrap()
    }

    fn zcta_given_race() -> ProbabilityTable {
        ProbabilityTable::from_rows(
            "prob_zcta_given_race_2010",
            Direction::ProxyGivenRace,
            vec![("63144".to_string(), [0.002, 0.0005, 0.0008, 0.0001, 0.0015, 0.0009])],
        )
        .unwrap()
    }

    fn bisg_engine(geography: ProbabilityTable) -> InferenceEngine {
        InferenceEngine::new(
            Model::Bisg,
            Resolution::Zcta,
            ReferenceTables {
                surname: smith_table(),
                first_name: None,
                geography: TableSource::Table(geography),
            },
        )
        .unwrap()
    }

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bisg_posterior_matches_hand_computation() {
        let mut engine = bisg_engine(zcta_given_race());
        let request = InferenceRequest::bisg(strings(&["smith"]), strings(&["63144"])).unwrap();
        let result = engine.infer(&request).unwrap();

        let surname = [0.70, 0.10, 0.03, 0.01, 0.06, 0.10];
        let geo = [0.002, 0.0005, 0.0008, 0.0001, 0.0015, 0.0009];
        let product: Vec<f64> = surname.iter().zip(geo).map(|(s, g)| s * g).collect();
        let total: f64 = product.iter().sum();

        let posterior = result.posterior(0).unwrap();
        for race in RaceCategory::ALL {
            assert_abs_diff_eq!(
                posterior.get(race),
                product[race.index()] / total,
                epsilon = 1e-12
            );
        }
        assert_abs_diff_eq!(posterior.sum(), 1.0, epsilon = 1e-6);
        assert_eq!(posterior.most_probable().0, RaceCategory::White);
        assert_eq!(result.surnames()[0].as_deref(), Some("SMITH"));
    }

    #[test]
    fn bisg_with_race_given_geography_uses_that_table() {
        let race_given_zcta = ProbabilityTable::from_rows(
            "prob_race_given_zcta_2010",
            Direction::RaceGivenProxy,
            vec![("63144".to_string(), [0.80, 0.05, 0.05, 0.01, 0.04, 0.05])],
        )
        .unwrap();
        let mut engine = bisg_engine(race_given_zcta);
        let request = InferenceRequest::bisg(strings(&["SMITH"]), strings(&["63144"])).unwrap();
        let posterior = engine.infer(&request).unwrap().posterior(0).unwrap();

        let total = 0.70 * 0.80 + 0.10 * 0.05 + 0.03 * 0.05 + 0.01 * 0.01 + 0.06 * 0.04 + 0.10 * 0.05;
        assert_abs_diff_eq!(posterior.get(RaceCategory::White), 0.56 / total, epsilon = 1e-12);
        assert_abs_diff_eq!(posterior.sum(), 1.0, epsilon = 1e-6);
        assert_eq!(posterior.most_probable().0, RaceCategory::White);
    }

    #[test]
    fn unresolved_surname_yields_undefined_record_only() {
        let mut engine = bisg_engine(zcta_given_race());
        let request = InferenceRequest::bisg(
            strings(&["Smith", "Zzyzx", "Smith", "nguyen"]),
            strings(&["63144", "63144", "99999", "63144"]),
        )
        .unwrap();
        let result = engine.infer(&request).unwrap();

        assert!(result.posterior(0).is_some());
        assert!(result.probabilities().row(1).iter().all(|v| v.is_nan()));
        assert!(result.probabilities().row(2).iter().all(|v| v.is_nan()));
        let nguyen = result.posterior(3).unwrap();
        assert_eq!(nguyen.most_probable().0, RaceCategory::Api);
        assert_eq!(result.resolved_count(), 2);
    }

    #[test]
    fn length_mismatch_is_rejected_before_any_join() {
        match InferenceRequest::bifsg(
            strings(&["A", "B", "C"]),
            strings(&["X", "Y", "Z"]),
            strings(&["1", "2"]),
        ) {
            Err(BifsgError::InputLengthMismatch {
                first_names,
                surnames,
                geography_codes,
            }) => {
                assert_eq!(first_names, Some(3));
                assert_eq!(surnames, 3);
                assert_eq!(geography_codes, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn bifsg_needs_first_names_and_matching_tables() {
        let missing_first = InferenceEngine::new(
            Model::Bifsg,
            Resolution::Zcta,
            ReferenceTables {
                surname: smith_table(),
                first_name: None,
                geography: TableSource::Table(zcta_given_race()),
            },
        );
        assert!(matches!(missing_first, Err(BifsgError::ModelMismatch(_))));

        let wrong_surname_direction = InferenceEngine::new(
            Model::Bisg,
            Resolution::Zcta,
            ReferenceTables {
                surname: zcta_given_race(),
                first_name: None,
                geography: TableSource::Table(zcta_given_race()),
            },
        );
        assert!(matches!(
            wrong_surname_direction,
            Err(BifsgError::ModelMismatch(_))
        ));
    }

    #[test]
    fn bifsg_multiplies_the_first_name_factor() {
        let first_name = ProbabilityTable::from_rows(
            "prob_first_name_given_race_harvard",
            Direction::ProxyGivenRace,
            vec![("MARIA".to_string(), [0.001, 0.001, 0.001, 0.001, 0.001, 0.02])],
        )
        .unwrap();
        let mut engine = InferenceEngine::new(
            Model::Bifsg,
            Resolution::Zcta,
            ReferenceTables {
                surname: smith_table(),
                first_name: Some(first_name),
                geography: TableSource::Table(zcta_given_race()),
            },
        )
        .unwrap();

        let bisg = bisg_engine(zcta_given_race())
            .infer(&InferenceRequest::bisg(strings(&["smith"]), strings(&["63144"])).unwrap())
            .unwrap()
            .posterior(0)
            .unwrap();
        let request =
            InferenceRequest::bifsg(strings(&["Maria"]), strings(&["smith"]), strings(&["63144"]))
                .unwrap();
        let bifsg = engine.infer(&request).unwrap().posterior(0).unwrap();

        assert_abs_diff_eq!(bifsg.sum(), 1.0, epsilon = 1e-6);
        assert!(bifsg.get(RaceCategory::Hispanic) > bisg.get(RaceCategory::Hispanic));

        let no_first_names =
            InferenceRequest::bisg(strings(&["smith"]), strings(&["63144"])).unwrap();
        assert!(matches!(
            engine.infer(&no_first_names),
            Err(BifsgError::ModelMismatch(_))
        ));
    }

    #[test]
    fn bifsg_unresolved_first_name_makes_the_record_undefined() {
        let first_name = ProbabilityTable::from_rows(
            "prob_first_name_given_race_harvard",
            Direction::ProxyGivenRace,
            vec![("MARIA".to_string(), [0.001, 0.001, 0.001, 0.001, 0.001, 0.02])],
        )
        .unwrap();
        let mut engine = InferenceEngine::new(
            Model::Bifsg,
            Resolution::Zcta,
            ReferenceTables {
                surname: smith_table(),
                first_name: Some(first_name),
                geography: TableSource::Table(zcta_given_race()),
            },
        )
        .unwrap();
        let request = InferenceRequest::bifsg(
            strings(&["Maria", "Nobody"]),
            strings(&["SMITH", "SMITH"]),
            strings(&["63144", "63144"]),
        )
        .unwrap();
        let result = engine.infer(&request).unwrap();

        assert!(result.posterior(0).is_some());
        // Surname and ZCTA both resolve for the second record; the first name does not.
        assert_eq!(result.surnames()[1].as_deref(), Some("SMITH"));
        assert_eq!(result.geography_codes()[1].as_deref(), Some("63144"));
        assert!(result.posterior(1).is_none());
        assert!(result.probabilities().row(1).iter().all(|v| v.is_nan()));
        assert_eq!(result.resolved_count(), 1);
    }

    #[test]
    fn accented_surnames_join_their_unaccented_row() {
        let surnames = ProbabilityTable::from_rows(
            "prob_race_given_surname_2010",
            Direction::RaceGivenProxy,
            vec![
                ("PEA".to_string(), [0.90, 0.05, 0.01, 0.01, 0.02, 0.01]),
                ("PENA".to_string(), [0.05, 0.01, 0.01, 0.01, 0.02, 0.90]),
            ],
        )
        .unwrap();
        let mut engine = InferenceEngine::new(
            Model::Bisg,
            Resolution::Zcta,
            ReferenceTables {
                surname: surnames,
                first_name: None,
                geography: TableSource::Table(zcta_given_race()),
            },
        )
        .unwrap();
        let request = InferenceRequest::bisg(
            strings(&["Peña", "Nguyễn"]),
            strings(&["63144", "63144"]),
        )
        .unwrap();
        let result = engine.infer(&request).unwrap();

        assert_eq!(result.surnames()[0].as_deref(), Some("PENA"));
        let pena = result.posterior(0).unwrap();
        assert_eq!(pena.most_probable().0, RaceCategory::Hispanic);
        // Folds to NGUYEN, which this table does not carry.
        assert_eq!(result.surnames()[1].as_deref(), Some("NGUYEN"));
        assert!(result.posterior(1).is_none());
    }

    #[test]
    fn result_frame_has_nulls_for_undefined_records() {
        let mut engine = bisg_engine(zcta_given_race());
        let request =
            InferenceRequest::bisg(strings(&["smith", "nobody"]), strings(&["63144", "63144"]))
                .unwrap();
        let df = engine.infer(&request).unwrap().to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec!["surname", "zcta5", "white", "black", "api", "native", "multiple", "hispanic"]
        );
        assert_eq!(df.column("white").unwrap().null_count(), 1);
    }

    #[test]
    fn proxy_model_looks_up_race_given_surname() {
        let mut model = ProxyModel::new(Proxy::Surname, TableSource::Table(smith_table())).unwrap();
        let result = model.probabilities(&["  Smith", "Unknown"]).unwrap();
        assert_abs_diff_eq!(
            result.distribution(0).unwrap().get(RaceCategory::White),
            0.70
        );
        assert!(result.distribution(1).is_none());

        assert!(ProxyModel::new(Proxy::FirstName, TableSource::Table(zcta_given_race())).is_err());
    }
}

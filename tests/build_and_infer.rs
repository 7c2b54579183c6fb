use approx::assert_abs_diff_eq;
use bifsg::files::{TableFormat, TableLayout};
use bifsg::tables::builder::TableBuilder;
use bifsg::{
    BifsgError, EngineConfig, InferenceEngine, InferenceRequest, RaceCategory, Resolution,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

const SURNAMES: &str = "\
name,rank,count,prop100k,cum_prop100k,pctwhite,pctblack,pctapi,pctaian,pct2prace,pcthispanic
SMITH,1,2442977,828.19,828.19,70.9,23.11,0.5,0.89,2.19,2.4
GARCIA,6,1166120,395.32,1937.27,5.38,0.45,1.41,0.47,0.26,92.03
NGUYEN,38,437645,148.37,6178.39,0.29,(S),96.8,(S),0.62,0.29
";

const FIRST_NAMES: &str = "\
firstname,obs,pcthispanic,pctwhite,pctblack,pctapi,pctaian,pct2prace
JOHN,1000,3.0,85.0,8.0,2.0,1.0,1.0
MARIA,500,70.0,20.0,2.0,5.0,1.0,2.0
LINH,100,0.0,2.0,0.0,97.0,0.0,1.0
";

const ZCTAS: &str = "\
zcta5,white,black,native,asian,pi,other,multiple,hispanic
63144,800,100,5,30,2,20,20,30
2861,100,10,1,200,1,5,5,10
";

const BLOCKS_CA: &str = "\
block,white,black,native,asian,pi,other,multiple,hispanic
060014001001000,500,50,5,40,2,30,20,300
060014001001001,50,10,1,300,5,10,5,20
";

const BLOCKS_NY: &str = "\
block,white,black,native,asian,pi,other,multiple,hispanic
360014001001000,200,300,3,20,1,15,10,100
";

struct Fixture {
    _dir: TempDir,
    data_dir: PathBuf,
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write extract");
    path
}

/// Builds every table from small raw extracts into a fresh directory.
fn build_fixture(format: TableFormat) -> Fixture {
    let dir = tempdir().expect("temporary directory");
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).expect("raw dir");
    let data_dir = dir.path().join("data");

    let builder = TableBuilder::new(
        &data_dir,
        TableLayout {
            format,
            ..TableLayout::default()
        },
    );
    builder
        .build_surnames(&write(&raw, "surnames.csv", SURNAMES))
        .expect("surnames");
    builder
        .build_first_names(&write(&raw, "first_names.csv", FIRST_NAMES))
        .expect("first names");
    let zcta = builder
        .build_geography(Resolution::Zcta, &[write(&raw, "zcta.csv", ZCTAS)])
        .expect("zcta");
    assert!(zcta.is_complete());
    let blocks = builder
        .build_geography(
            Resolution::Block,
            &[
                write(&raw, "block_06.csv", BLOCKS_CA),
                write(&raw, "block_36.csv", BLOCKS_NY),
            ],
        )
        .expect("blocks");
    assert_eq!(blocks.succeeded.len(), 2);
    assert_eq!(blocks.written.len(), 4);

    Fixture {
        _dir: dir,
        data_dir,
    }
}

fn config(fixture: &Fixture, body: &str, format: &str) -> EngineConfig {
    let text = format!(
        "{body}\ndata_dir = \"{}\"\nformat = \"{format}\"\n",
        fixture.data_dir.display()
    );
    EngineConfig::from_toml_str(&text).expect("config")
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn bisg_over_zcta_tables_built_from_raw_extracts() {
    let fixture = build_fixture(TableFormat::Csv);
    let config = config(&fixture, "model = \"bisg\"\nresolution = \"zcta\"", "csv");
    let mut engine = InferenceEngine::open(&config).expect("engine");

    let request = InferenceRequest::bisg(
        strings(&["Smith", "nguyen", "Smithers"]),
        strings(&["63144", "2861", "63144"]),
    )
    .expect("request");
    let result = engine.infer(&request).expect("infer");

    let smith = result.posterior(0).expect("SMITH resolves");
    assert_abs_diff_eq!(smith.sum(), 1.0, epsilon = 1e-6);
    assert_eq!(smith.most_probable().0, RaceCategory::White);

    // The short ZCTA is zero-padded before the join.
    assert_eq!(result.geography_codes()[1].as_deref(), Some("02861"));
    let nguyen = result.posterior(1).expect("NGUYEN resolves");
    assert_eq!(nguyen.most_probable().0, RaceCategory::Api);

    assert!(result.posterior(2).is_none());
    assert_eq!(result.resolved_count(), 2);
}

#[test]
fn bisg_can_consume_race_given_geography() {
    let fixture = build_fixture(TableFormat::Parquet);
    let config = config(
        &fixture,
        "model = \"bisg\"\nresolution = \"ZCTA\"\ngeography_direction = \"race_given_geography\"",
        "parquet",
    );
    let mut engine = InferenceEngine::open(&config).expect("engine");
    let request =
        InferenceRequest::bisg(strings(&["GARCIA"]), strings(&["63144"])).expect("request");
    let result = engine.infer(&request).expect("infer");
    let garcia = result.posterior(0).expect("resolves");
    assert_abs_diff_eq!(garcia.sum(), 1.0, epsilon = 1e-6);
}

#[test]
fn bifsg_over_block_partitions() {
    let fixture = build_fixture(TableFormat::Parquet);
    let config = config(&fixture, "model = \"bifsg\"\nresolution = \"BLOCK\"", "parquet");
    let mut engine = InferenceEngine::open(&config).expect("engine");

    let request = InferenceRequest::bifsg(
        strings(&["Maria", "Linh", "John"]),
        strings(&["Garcia", "Nguyen", "Smith"]),
        strings(&["060014001001000", "060014001001001", "360014001001000"]),
    )
    .expect("request");
    let result = engine.infer(&request).expect("infer");
    assert_eq!(result.resolved_count(), 3);

    let garcia = result.posterior(0).expect("resolves");
    assert_eq!(garcia.most_probable().0, RaceCategory::Hispanic);
    let nguyen = result.posterior(1).expect("resolves");
    assert_eq!(nguyen.most_probable().0, RaceCategory::Api);
    for i in 0..result.len() {
        let row = result.posterior(i).expect("resolves");
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
    }
}

#[test]
fn block_batch_with_an_unknown_state_fails_whole() {
    let fixture = build_fixture(TableFormat::Parquet);
    let config = config(&fixture, "model = \"bisg\"\nresolution = \"block\"", "parquet");
    let mut engine = InferenceEngine::open(&config).expect("engine");

    let request = InferenceRequest::bisg(
        strings(&["SMITH", "SMITH"]),
        strings(&["060014001001000", "480014001001000"]),
    )
    .expect("request");
    match engine.infer(&request) {
        Err(BifsgError::MissingPartition { missing, .. }) => {
            assert_eq!(missing, vec!["48".to_string()]);
        }
        other => panic!("expected MissingPartition, got {other:?}"),
    }
}

#[test]
fn cli_infer_writes_one_row_per_record() {
    let fixture = build_fixture(TableFormat::Csv);
    let dir = tempdir().expect("temporary directory");
    let config_path = write(
        dir.path(),
        "engine.toml",
        &format!(
            "model = \"bifsg\"\nresolution = \"zcta\"\ndata_dir = \"{}\"\nformat = \"csv\"\n",
            fixture.data_dir.display()
        ),
    );
    let input = write(
        dir.path(),
        "people.csv",
        "first_name,surname,geography\nJohn,Smith,63144\nMaria,Zzyzx,63144\n",
    );
    let output = dir.path().join("posteriors.csv");

    let exe = env!("CARGO_BIN_EXE_bifsg");
    let status = Command::new(exe)
        .args([
            "infer",
            "--config",
            config_path.to_str().expect("path str"),
            "--input",
            input.to_str().expect("path str"),
            "--output",
            output.to_str().expect("path str"),
        ])
        .status()
        .expect("run bifsg cli");
    assert!(status.success(), "CLI exited with status {status:?}");

    let mut reader = csv::Reader::from_path(&output).expect("output csv");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec![
            "first_name",
            "surname",
            "zcta5",
            "white",
            "black",
            "api",
            "native",
            "multiple",
            "hispanic"
        ]
    );
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("records");
    assert_eq!(rows.len(), 2);
    assert!(!rows[0][3].is_empty());
    assert!(rows[1][3].is_empty(), "unknown surname must stay undefined");
}

#[test]
fn cli_without_a_subcommand_prints_usage() {
    let output = Command::new(env!("CARGO_BIN_EXE_bifsg"))
        .output()
        .expect("run bifsg cli");
    assert!(output.status.success(), "CLI exited with {:?}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "no usage text in: {stdout}");
    assert!(stdout.contains("infer"));
}

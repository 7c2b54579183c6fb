#![deny(unused_variables)]
#![deny(unused_imports)]

use bifsg::files::{TableFormat, TableLayout};
use bifsg::tables::builder::TableBuilder;
use bifsg::tables::suppression::ResidualPolicy;
use bifsg::{
    BifsgError, EngineConfig, InferenceEngine, InferenceRequest, Proxy, ProxyModel, Resolution,
};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "bifsg",
    about = "Race and ethnicity estimation from names and geography (BISG / BIFSG)",
    long_about = "Builds conditional probability tables from local Census and Harvard extracts \
                 and computes BISG or BIFSG posteriors for batches of records."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build reference tables from raw extracts
    #[command(subcommand)]
    Build(BuildCommand),

    /// Compute posteriors for a CSV of records (columns: first_name, surname, geography)
    #[command(about = "Compute BISG/BIFSG posteriors (outputs: CSV)")]
    Infer(InferArgs),

    /// Look up p(race | proxy) for individual values
    #[command(about = "Single-proxy race lookup")]
    Lookup(LookupArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Directory the tables are written to
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    /// Census vintage embedded in table names
    #[arg(long, default_value = "2010")]
    vintage: String,

    /// Source tag embedded in first-name table names
    #[arg(long, default_value = "harvard")]
    first_name_source: String,

    #[arg(long, value_enum, default_value_t = FormatCli::Parquet)]
    format: FormatCli,
}

impl OutputArgs {
    fn layout(&self) -> TableLayout {
        TableLayout {
            vintage: self.vintage.clone(),
            first_name_source: self.first_name_source.clone(),
            format: match self.format {
                FormatCli::Parquet => TableFormat::Parquet,
                FormatCli::Csv => TableFormat::Csv,
            },
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatCli {
    Parquet,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResidualPolicyCli {
    Clamp,
    Drop,
}

#[derive(Subcommand)]
enum BuildCommand {
    /// Race-given-surname table from the Census surname CSV
    Surnames {
        #[arg(value_name = "EXTRACT")]
        extract: PathBuf,

        /// Handling of rows whose known percentages exceed 100
        #[arg(long, value_enum, default_value_t = ResidualPolicyCli::Clamp)]
        residual_policy: ResidualPolicyCli,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Both first-name tables from the Harvard first-name CSV
    FirstNames {
        #[arg(value_name = "EXTRACT")]
        extract: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Both geography tables from per-state population extracts
    Geography {
        /// ZCTA, TRACT or BLOCK
        #[arg(long)]
        resolution: Resolution,

        #[arg(value_name = "EXTRACTS", required = true)]
        extracts: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct InferArgs {
    /// Engine configuration (TOML)
    #[arg(long)]
    config: PathBuf,

    /// Input CSV
    #[arg(long)]
    input: PathBuf,

    /// Output CSV
    #[arg(long)]
    output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProxyCli {
    Surname,
    FirstName,
    Zcta,
    Tract,
    Block,
}

impl From<ProxyCli> for Proxy {
    fn from(proxy: ProxyCli) -> Self {
        match proxy {
            ProxyCli::Surname => Proxy::Surname,
            ProxyCli::FirstName => Proxy::FirstName,
            ProxyCli::Zcta => Proxy::Geography(Resolution::Zcta),
            ProxyCli::Tract => Proxy::Geography(Resolution::Tract),
            ProxyCli::Block => Proxy::Geography(Resolution::Block),
        }
    }
}

#[derive(Args)]
struct LookupArgs {
    #[arg(long, value_enum)]
    proxy: ProxyCli,

    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "2010")]
    vintage: String,

    #[arg(long, value_enum, default_value_t = FormatCli::Parquet)]
    format: FormatCli,

    #[arg(value_name = "VALUES", required = true)]
    values: Vec<String>,
}

/// One input row. `first_name` may be absent from the file entirely.
#[derive(Debug, Deserialize)]
struct InputRecord {
    #[serde(default)]
    first_name: Option<String>,
    surname: String,
    geography: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    let result = match command {
        Some(Commands::Build(command)) => run_build(command),
        Some(Commands::Infer(args)) => run_infer(args),
        Some(Commands::Lookup(args)) => run_lookup(args),
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_build(command: BuildCommand) -> Result<(), BifsgError> {
    match command {
        BuildCommand::Surnames {
            extract,
            residual_policy,
            output,
        } => {
            let policy = match residual_policy {
                ResidualPolicyCli::Clamp => ResidualPolicy::Clamp,
                ResidualPolicyCli::Drop => ResidualPolicy::Drop,
            };
            let path = TableBuilder::new(&output.out_dir, output.layout())
                .with_residual_policy(policy)
                .build_surnames(&extract)?;
            println!("Wrote {}", path.display());
        }
        BuildCommand::FirstNames { extract, output } => {
            let paths =
                TableBuilder::new(&output.out_dir, output.layout()).build_first_names(&extract)?;
            println!("Wrote {}", paths.iter().map(|p| p.display()).join(", "));
        }
        BuildCommand::Geography {
            resolution,
            extracts,
            output,
        } => {
            let report = TableBuilder::new(&output.out_dir, output.layout())
                .build_geography(resolution, &extracts)?;
            println!(
                "Read {} of {} extracts, wrote {} tables",
                report.succeeded.len(),
                extracts.len(),
                report.written.len()
            );
            for failure in &report.failed {
                eprintln!("Failed: {}: {}", failure.path.display(), failure.error);
            }
            if !report.is_complete() {
                process::exit(2);
            }
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<InputRecord>, BifsgError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<InputRecord>, _>>()
        .map_err(|e| csv_error(path, e))
}

fn csv_error(path: &Path, error: csv::Error) -> BifsgError {
    match error.into_kind() {
        csv::ErrorKind::Io(io) => BifsgError::Io(io),
        other => BifsgError::InvalidExtract {
            path: path.to_path_buf(),
            reason: format!("{other:?}"),
        },
    }
}

fn run_infer(args: InferArgs) -> Result<(), BifsgError> {
    let config = EngineConfig::load(&args.config)?;
    let records = read_input(&args.input)?;

    let has_first_names = records.iter().any(|r| r.first_name.is_some());
    let mut first_names = Vec::with_capacity(records.len());
    let mut surnames = Vec::with_capacity(records.len());
    let mut geography_codes = Vec::with_capacity(records.len());
    for record in records {
        first_names.push(record.first_name.unwrap_or_default());
        surnames.push(record.surname);
        geography_codes.push(record.geography);
    }
    let request = InferenceRequest::new(
        has_first_names.then_some(first_names),
        surnames,
        geography_codes,
    )?;

    let mut engine = InferenceEngine::open(&config)?;
    let result = engine.infer(&request)?;
    result.write_csv(&args.output)?;
    println!(
        "Wrote {} posteriors ({} resolved) to {}",
        result.len(),
        result.resolved_count(),
        args.output.display()
    );
    Ok(())
}

fn run_lookup(args: LookupArgs) -> Result<(), BifsgError> {
    let layout = TableLayout {
        vintage: args.vintage,
        format: match args.format {
            FormatCli::Parquet => TableFormat::Parquet,
            FormatCli::Csv => TableFormat::Csv,
        },
        ..TableLayout::default()
    };
    let mut model = ProxyModel::open(&args.data_dir, &layout, args.proxy.into())?;
    let result = model.probabilities(args.values.as_slice())?;
    for (i, value) in args.values.iter().enumerate() {
        match result.distribution(i) {
            Some(distribution) => {
                let (race, p) = distribution.most_probable();
                let cells = distribution.as_array().iter().map(|v| format!("{v:.4}")).join("\t");
                println!("{value}\t{cells}\t{race}\t{p:.4}");
            }
            None => println!("{value}\tunresolved"),
        }
    }
    Ok(())
}

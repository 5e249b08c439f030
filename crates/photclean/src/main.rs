use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use photclean_core::{
    config::CleanseConfig,
    flag_scrubber::FlagLookup,
    io::{read_frame, write_frame, DataFrame},
    pipeline::PipelineInputs,
    ratios::{ExposureRatios, NightRatios, EXPOSURE_KEY, NIGHT_KEY},
    schema::{exposures_per_night, PhotometryTable},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Photometric survey table cleansing", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured cleansing stages over a photometry table
    Cleanse(CleanseArgs),
    /// List the nights (and exposures per night) present in a photometry table
    Nights(NightsArgs),
    /// Print the default cleansing configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct CleanseArgs {
    /// Photometry table (.csv or .parquet)
    #[arg(long)]
    table: PathBuf,
    /// Cleansing configuration; the default stage list is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Night ratio table with NIGHT, J_RATIO, H_RATIO, K_RATIO
    #[arg(long)]
    night_ratios: Option<PathBuf>,
    /// Exposure ratio table with MEANMJDOBS, J_RATIO, H_RATIO, K_RATIO
    #[arg(long)]
    exposure_ratios: Option<PathBuf>,
    /// Per-star flag statistics with SOURCEID and N_{j,h,k}_{info,noflag}
    #[arg(long)]
    flag_lookup: Option<PathBuf>,
    /// Where to write the cleansed table (.csv or .parquet)
    #[arg(long)]
    output: PathBuf,
    /// Optional JSON report of per-stage null counts and diagnostics
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct NightsArgs {
    /// Photometry table (.csv or .parquet)
    #[arg(long)]
    table: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Cleanse(args) => handle_cleanse(args),
        Command::Nights(args) => handle_nights(args),
        Command::Config => {
            print!("{}", CleanseConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn handle_cleanse(args: CleanseArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => CleanseConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CleanseConfig::default(),
    };
    let pipeline = config.into_pipeline()?;

    let night_ratios = args
        .night_ratios
        .as_deref()
        .map(|path| load_with(path, |df| NightRatios::from_frame(df, NIGHT_KEY)))
        .transpose()?;
    let exposure_ratios = args
        .exposure_ratios
        .as_deref()
        .map(|path| load_with(path, |df| ExposureRatios::from_frame(df, EXPOSURE_KEY)))
        .transpose()?;
    let flag_lookup = args
        .flag_lookup
        .as_deref()
        .map(|path| load_with(path, FlagLookup::from_frame))
        .transpose()?;

    let inputs = PipelineInputs {
        night_ratios: night_ratios.as_ref(),
        exposure_ratios: exposure_ratios.as_ref(),
        flag_lookup: flag_lookup.as_ref(),
    };
    pipeline.check_inputs(&inputs)?;

    let table = load_table(&args.table)?;
    info!(rows = table.height(), stages = pipeline.stages().len(), "cleansing table");

    let run = pipeline.run(&table, &inputs)?;

    write_frame(run.table.frame(), &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), rows = run.table.height(), "cleansed table written");

    if let Some(report_path) = &args.report {
        fs::write(report_path, run.report_json()?)
            .with_context(|| format!("failed to write report {}", report_path.display()))?;
        info!(report = %report_path.display(), "run report written");
    }

    Ok(())
}

fn handle_nights(args: NightsArgs) -> Result<()> {
    let table = load_table(&args.table)?;
    let per_night = exposures_per_night(&table)?;

    println!("{} nights, {} rows", per_night.len(), table.height());
    for (night, exposures) in per_night {
        println!("  {night}: {exposures} exposures");
    }
    Ok(())
}

fn load_table(path: &Path) -> Result<PhotometryTable> {
    let df = read_frame(path).with_context(|| format!("failed to read {}", path.display()))?;
    PhotometryTable::from_frame(df)
        .with_context(|| format!("{} is not a valid photometry table", path.display()))
}

fn load_with<T>(
    path: &Path,
    parse: impl FnOnce(&DataFrame) -> photclean_core::error::Result<T>,
) -> Result<T> {
    let df = read_frame(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse(&df).with_context(|| format!("invalid input table {}", path.display()))
}

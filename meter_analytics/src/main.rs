use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use meter_analytics::{
    discover_files, ingest_files, CsvReportWriter, NormalizerConfig, ReportAssembler,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meter_analytics")]
#[command(about = "Aggregate building meter CSVs into campus summary tables")]
struct Args {
    /// Directory holding one CSV file per building
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory the summary tables are written to
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// File name pattern for meter files
    #[arg(long, default_value = "*.csv")]
    pattern: String,

    /// Output format for the headline facts
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let files = discover_files(&args.data_dir, &args.pattern, false)?;
    info!("Found {} meter files", files.len());

    let outcome = ingest_files(&files, &NormalizerConfig::default(), false);
    let report = ReportAssembler::default().assemble(outcome.dataset);

    let mut writer = CsvReportWriter::create(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;
    report
        .deliver(&mut writer, None)
        .context("failed to write summary tables")?;

    match args.format {
        OutputFormat::Summary => {
            for line in report.facts.summary_lines() {
                println!("{}", line);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.facts)?);
        }
    }

    Ok(())
}

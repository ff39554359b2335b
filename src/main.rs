use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use meter_analytics::{
    discover_files, ingest_files_with, BuildingCatalog, ChartRenderer, CsvReportWriter,
    NormalizerConfig, ReportAssembler,
};
use std::path::PathBuf;

mod dashboard;

use dashboard::{DashboardRenderer, DASHBOARD_FILE};

#[derive(Parser)]
#[command(name = "campus_energy_processor")]
#[command(about = "Normalize per-building meter CSVs into campus consumption reports")]
struct Args {
    /// Directory holding one CSV file per building
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory all outputs are written to
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// File name pattern for meter files
    #[arg(long, default_value = "*.csv")]
    pattern: String,

    /// Also search subdirectories of the data directory
    #[arg(long)]
    recursive: bool,

    /// Load files on the rayon thread pool
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (defaults to the CPU count)
    #[arg(long, requires = "parallel")]
    threads: Option<usize>,

    /// Extra timestamp column name, tried before the built-in names
    #[arg(long)]
    timestamp_column: Option<String>,

    /// Extra kWh column name, tried before the built-in names
    #[arg(long)]
    value_column: Option<String>,

    /// Number of building-hours plotted in the peak scatter
    #[arg(long, default_value = "200")]
    top_points: usize,

    /// Skip rendering the dashboard image
    #[arg(long)]
    no_chart: bool,

    /// Print the headline facts as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn normalizer_config(&self) -> NormalizerConfig {
        let mut config = NormalizerConfig::default();
        if let Some(name) = &self.timestamp_column {
            config = config.with_timestamp_column(name.as_str());
        }
        if let Some(name) = &self.value_column {
            config = config.with_value_column(name.as_str());
        }
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("🏢 Campus Energy Processor");
    println!("{}", "=".repeat(60));

    if args.parallel {
        let threads = args.threads.unwrap_or_else(num_cpus::get);
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the rayon thread pool")?;
        info!("Loading files on {} threads", threads);
    }

    let files = discover_files(&args.data_dir, &args.pattern, args.recursive)?;
    info!("Found {} meter files in {}", files.len(), args.data_dir.display());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?,
    );
    let outcome = ingest_files_with(&files, &args.normalizer_config(), args.parallel, |_| pb.inc(1));
    pb.finish_and_clear();

    if outcome.stats.files_failed > 0 {
        warn!(
            "{} of {} files were skipped",
            outcome.stats.files_failed, outcome.stats.files_seen
        );
    }

    {
        let catalog = BuildingCatalog::from_dataset(&outcome.dataset);
        for series in catalog.iter() {
            info!(
                "  {}: {} readings, {:.2} kWh",
                series.name(),
                series.len(),
                series.total()
            );
        }
    }

    let report = ReportAssembler::new(args.top_points).assemble(outcome.dataset);

    let mut writer = CsvReportWriter::create(&args.output_dir)
        .with_context(|| format!("cannot create output directory {}", args.output_dir.display()))?;
    let renderer = DashboardRenderer::new(args.output_dir.join(DASHBOARD_FILE));
    let chart: Option<&dyn ChartRenderer> = if args.no_chart { None } else { Some(&renderer) };

    report
        .deliver(&mut writer, chart)
        .context("failed to write report outputs")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.facts)?);
    }

    let mut saved: Vec<String> = writer
        .written()
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    if chart.is_some() {
        saved.push(renderer.output_path().display().to_string());
    }
    println!("files saved: {}", saved.join(", "));

    Ok(())
}

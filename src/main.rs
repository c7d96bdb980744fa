use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use medallion::client::ApiClient;
use medallion::init::{init_tracing, log_layout};
use medallion::pipeline::gold::{cleanup_csv_files, report_timestamp, write_csv_reports};
use medallion::pipeline::{
    run_bronze_ingestion, spawn_silver_transform, BronzeSummary, DataFusionEngine, GoldSummary,
    ReportCatalog, ReportOutcome, ReportRunner, SilverSummary,
};
use medallion::scan::scan;
use medallion_config::RuntimeConfig;
use medallion_writer::WriteTarget;
use std::path::PathBuf;
use tracing::error;

/// Vehicle telemetry pipeline: API -> Bronze -> Silver -> Gold
#[derive(Parser)]
#[command(name = "medallion")]
#[command(version)]
#[command(about = "Vehicle telemetry pipeline writing partitioned Parquet", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch messages from the API into the Bronze layer
    Bronze(BronzeArgs),
    /// Clean Bronze data into the Silver layer
    Silver(SilverArgs),
    /// Run SQL reports over Silver and export CSV
    Gold(GoldArgs),
    /// Bronze ingestion followed by the Silver transform
    Run(RunArgs),
    /// Scan a layer for injection patterns
    Scan(ScanArgs),
}

#[derive(Args)]
struct BronzeArgs {
    /// Number of messages to request
    #[arg(short, long)]
    amount: Option<usize>,

    /// Bronze output directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SilverArgs {
    /// Bronze input directory (overrides config)
    #[arg(long, value_name = "DIR")]
    bronze_dir: Option<PathBuf>,

    /// Partitioned output directory (overrides config)
    #[arg(long, value_name = "DIR", conflicts_with = "output_file")]
    output_dir: Option<PathBuf>,

    /// Write one Parquet file at this path instead of a partitioned tree
    #[arg(long, value_name = "FILE")]
    output_file: Option<PathBuf>,
}

#[derive(Args)]
struct GoldArgs {
    /// Reports to run (defaults to the configured report list)
    reports: Vec<String>,

    /// Run every available report
    #[arg(long, conflicts_with = "reports")]
    all: bool,

    /// List available reports and exit
    #[arg(long)]
    list: bool,

    /// Silver input directory (overrides config)
    #[arg(long, value_name = "DIR")]
    silver_dir: Option<PathBuf>,

    /// CSV output directory (overrides config)
    #[arg(long, value_name = "DIR")]
    gold_dir: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Number of messages to request
    #[arg(short, long)]
    amount: Option<usize>,
}

#[derive(Args)]
struct ScanArgs {
    /// Directory to scan (defaults to the Bronze directory)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Column to check; repeatable (defaults to config)
    #[arg(long = "column", value_name = "NAME")]
    columns: Vec<String>,

    /// Regex pattern; repeatable (defaults to the built-in list)
    #[arg(long = "pattern", value_name = "REGEX")]
    patterns: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config.logging);
    log_layout(&config);

    let result = match cli.command {
        Command::Bronze(args) => bronze(&mut config, args).await,
        Command::Silver(args) => silver(&config, args).await,
        Command::Gold(args) => gold(&config, args).await,
        Command::Run(args) => run(&config, args).await,
        Command::Scan(args) => scan_layer(&config, args),
    };

    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "Command failed");
    }
    result
}

async fn bronze(config: &mut RuntimeConfig, args: BronzeArgs) -> Result<()> {
    if let Some(output) = args.output {
        config.storage.bronze_dir = output;
    }
    let amount = args.amount.unwrap_or(config.api.default_amount);
    let summary = ingest(config, amount).await?;
    print_bronze(&summary);
    Ok(())
}

async fn ingest(config: &RuntimeConfig, amount: usize) -> Result<BronzeSummary> {
    let client = ApiClient::new(&config.api)?;
    run_bronze_ingestion(&client, &config.writer, &config.storage.bronze_dir, amount).await
}

async fn silver(config: &RuntimeConfig, args: SilverArgs) -> Result<()> {
    let bronze_dir = args
        .bronze_dir
        .unwrap_or_else(|| config.storage.bronze_dir.clone());
    let output_dir = match (&args.output_dir, &args.output_file) {
        (None, None) => Some(config.storage.silver_dir.clone()),
        _ => args.output_dir,
    };
    let target = WriteTarget::resolve(output_dir, args.output_file)?;

    let summary = spawn_silver_transform(bronze_dir, target, config.writer.clone()).await?;
    print_silver(&summary);
    Ok(())
}

async fn gold(config: &RuntimeConfig, args: GoldArgs) -> Result<()> {
    let catalog = ReportCatalog::discover(&config.reports.queries_dir)?;

    if args.list {
        println!("Available reports ({}):", catalog.queries_dir().display());
        for name in catalog.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    let silver_dir = args
        .silver_dir
        .unwrap_or_else(|| config.storage.silver_dir.clone());
    let gold_dir = args
        .gold_dir
        .unwrap_or_else(|| config.storage.gold_dir.clone());
    let names = if args.all {
        catalog.names()
    } else if args.reports.is_empty() {
        config.reports.default_reports.clone()
    } else {
        args.reports
    };

    let runner = ReportRunner::new(catalog, DataFusionEngine);
    let summary = runner.run_reports(&names, &silver_dir).await?;
    print_gold(&summary);

    cleanup_csv_files(&gold_dir)?;
    for path in write_csv_reports(&summary, &gold_dir, &report_timestamp())? {
        println!("CSV saved: {}", path.display());
    }

    let failed = summary.failed();
    if !failed.is_empty() {
        anyhow::bail!("{} report(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

async fn run(config: &RuntimeConfig, args: RunArgs) -> Result<()> {
    let amount = args.amount.unwrap_or(config.api.default_amount);
    let bronze = ingest(config, amount).await?;
    print_bronze(&bronze);

    let target = WriteTarget::Directory(config.storage.silver_dir.clone());
    let silver = spawn_silver_transform(
        config.storage.bronze_dir.clone(),
        target,
        config.writer.clone(),
    )
    .await?;
    print_silver(&silver);
    Ok(())
}

fn scan_layer(config: &RuntimeConfig, args: ScanArgs) -> Result<()> {
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| config.storage.bronze_dir.clone());
    let columns = if args.columns.is_empty() {
        config.scan.columns.clone()
    } else {
        args.columns
    };
    let patterns = if args.patterns.is_empty() {
        config.scan.patterns.clone()
    } else {
        args.patterns
    };

    let report = scan(&data_dir, &columns, &patterns)?;
    print!("{}", report);
    Ok(())
}

fn print_bronze(summary: &BronzeSummary) {
    println!("Bronze ingestion completed");
    println!("  Messages fetched: {}", summary.messages_fetched);
    println!("  Files written: {}", summary.files_written);
    println!("  Partitions: {}", summary.partitions);
    println!("  Duration: {:.2}ms", summary.duration_ms);
}

fn print_silver(summary: &SilverSummary) {
    println!("Silver transformation completed");
    println!("  Input rows: {}", summary.input_rows);
    println!("  Filtered rows: {}", summary.filtered_rows);
    println!("  Output rows: {}", summary.output_rows);
    println!("  Files written: {}", summary.files_written);
    println!("  Duration: {:.2}ms", summary.duration_ms);
}

fn print_gold(summary: &GoldSummary) {
    println!("Gold reports completed");
    println!("  Total reports: {}", summary.reports.len());
    println!("  Successful: {}", summary.successful().len());
    println!("  Failed: {}", summary.failed().len());
    println!("  Duration: {:.2}ms", summary.duration_ms);

    for run in &summary.reports {
        match &run.outcome {
            ReportOutcome::Completed {
                input_rows,
                output_rows,
                sql_file,
                batches,
            } => {
                println!("\n{}", run.name.to_uppercase().replace('_', " "));
                println!("  Input rows: {}", input_rows);
                println!("  Output rows: {}", output_rows);
                println!("  SQL file: {}", sql_file.display());
                let sample: Vec<_> = batches
                    .first()
                    .map(|b| b.slice(0, b.num_rows().min(5)))
                    .into_iter()
                    .collect();
                if let Ok(table) = arrow::util::pretty::pretty_format_batches(&sample) {
                    println!("{}", table);
                }
            }
            ReportOutcome::Failed { error } => {
                println!("\n{} - FAILED", run.name.to_uppercase().replace('_', " "));
                println!("  Error: {}", error);
            }
        }
    }
}

//! comove CLI binary.
//!
//! Sweeps k-means over a range of cluster counts to produce a scree curve,
//! and segments the universe for a chosen k.

mod settings;

use clap::{Parser, Subcommand, ValueEnum};
use comove::{
    CsvMetadataFile, CsvPriceFile, CsvProjectionFile, ExportFormat, Exporter, MetadataSource,
    Pipeline, PipelineConfig, PipelineError, PriceSource, ProjectionPointSource, ReturnMatrix,
    ScreeReport, SegmentationReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use settings::{InputArgs, SweepArgs};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "comove")]
#[command(about = "comove: segment stocks by co-movement of daily returns", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

/// Terminal rendering of a report.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep k-means over a range of k and print the scree curve
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        sweep: SweepArgs,

        /// Write the curve to a .csv or .json file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Terminal output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Cluster with a chosen k and join with coordinates and metadata
    Segment {
        #[command(flatten)]
        input: InputArgs,

        /// Number of clusters
        #[arg(long)]
        k: usize,

        /// CSV of company metadata with columns symbol,company,sector
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// CSV of 2-D coordinates with columns symbol,x,y (default: PCA of the returns)
        #[arg(long)]
        points: Option<PathBuf>,

        /// Write the segmentation to a .csv or .json file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write a Markdown cluster report
        #[arg(long)]
        report: Option<PathBuf>,

        /// Terminal output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the default pipeline configuration
    Config {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {}", e);
        if let Some(err) = e.downcast_ref::<PipelineError>() {
            if let Some(k) = err.k() {
                eprintln!("  k: {}", k);
            }
            if let Some(symbol) = err.symbol() {
                eprintln!("  symbol: {}", symbol);
            }
        }
        process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Sweep {
            input,
            sweep,
            output,
            format,
        } => {
            let mut config = input.resolve()?;
            sweep.apply(&mut config.sweep);
            run_sweep(&input, config, output.as_deref(), format).await?;
        }
        Commands::Segment {
            input,
            k,
            metadata,
            points,
            output,
            report,
            format,
        } => {
            let config = input.resolve()?;
            let sources = SegmentSources {
                metadata: metadata.as_deref(),
                points: points.as_deref(),
            };
            run_segment(&input, config, k, sources, output.as_deref(), report.as_deref(), format)?;
        }
        Commands::Config { output } => {
            let json = PipelineConfig::default().to_json_pretty()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

/// Load prices and assemble the return matrix, reporting excluded symbols.
fn load_matrix(
    pipeline: &Pipeline,
    input: &InputArgs,
) -> Result<ReturnMatrix, Box<dyn std::error::Error>> {
    let prices = CsvPriceFile::new(&input.prices).load()?;
    println!("Prices: {} observations from {}", prices.len(), input.prices.display());

    let stage = pipeline.build_returns(&prices)?;
    if !stage.excluded.is_empty() {
        println!(
            "Excluded (fewer than two prices): {}",
            stage.excluded.join(", ")
        );
    }

    let matrix = pipeline.assemble_matrix(&stage.returns)?;
    if let (Some(first), Some(last)) = (matrix.dates().first(), matrix.dates().last()) {
        println!(
            "Matrix: {} symbols x {} dates ({} to {})",
            matrix.n_symbols(),
            matrix.n_dates(),
            first,
            last
        );
    }
    Ok(matrix)
}

fn export_to(
    value: &impl Exporter,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = ExportFormat::from_path(path)?;
    value.export_to_file(path, format)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn run_sweep(
    input: &InputArgs,
    config: PipelineConfig,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    banner("K-MEANS SWEEP");
    let pipeline = Pipeline::new(config)?;
    let matrix = load_matrix(&pipeline, input)?;

    let ks = pipeline.config().sweep.capped_at(matrix.n_symbols()).ks();
    let pb = ProgressBar::new(ks.clone().count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Fitting k={}..={} ({} workers)...",
        ks.start(),
        ks.end(),
        pipeline.config().sweep.workers
    ));

    let result = comove::pipeline::run_sweep_concurrent(pipeline.config(), &matrix, |k| {
        pb.inc(1);
        pb.set_message(format!("k={} done", k));
    })
    .await;

    let result = match result {
        Ok(r) => {
            pb.finish_with_message(format!("Fitted {} k values", r.points().len()));
            r
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };

    let report = ScreeReport::from_sweep(&result);
    match format {
        OutputFormat::Text => println!("{}", report.to_ascii_table()),
        OutputFormat::Markdown => println!("{}", report.to_markdown()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if let Some(path) = output {
        export_to(&result, path)?;
    }
    Ok(())
}

/// Optional external inputs of the segment command.
struct SegmentSources<'a> {
    metadata: Option<&'a Path>,
    points: Option<&'a Path>,
}

fn run_segment(
    input: &InputArgs,
    config: PipelineConfig,
    k: usize,
    sources: SegmentSources<'_>,
    output: Option<&Path>,
    report_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    banner(&format!("SEGMENTATION: k = {}", k));
    let pipeline = Pipeline::new(config)?;
    let matrix = load_matrix(&pipeline, input)?;

    let metadata = match sources.metadata {
        Some(path) => CsvMetadataFile::new(path).load()?,
        None => Vec::new(),
    };

    let model = pipeline.fit_model(&matrix, k, None)?;
    println!("Inertia: {:.6}", model.inertia());

    let points = match sources.points {
        Some(path) => CsvProjectionFile::new(path).load()?,
        None => pipeline.project(&matrix)?,
    };

    let table = pipeline.segment(&model, &points, &metadata)?;
    let report = SegmentationReport::from_table(&table);
    match format {
        OutputFormat::Text => println!("{}", report.to_ascii_table()),
        OutputFormat::Markdown => println!("{}", report.to_markdown()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if let Some(path) = output {
        export_to(&table, path)?;
    }
    if let Some(path) = report_path {
        report.save_markdown(path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

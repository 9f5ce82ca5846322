//! Verdant CLI binary.
//!
//! Reads CSV inputs, runs one pipeline stage and prints a summary to stdout.
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`).

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use verdant::{Pipeline, PipelineConfig, frontier_statistics, run_backtest, run_features};
use verdant_data::frames::{
    esg_scores_from_any_frame, prices_from_frame, read_csv, returns_from_frame,
    risk_free_from_frame, weights_from_frame,
};
use verdant_data::{AssetSeries, EsgScores, PricePanel, RiskFreeSeries, WeightSnapshot};
use verdant_optimize::{FrontierPoint, asset_sharpes};
use verdant_output::{
    AllocationSummary, ExportFormat, Exporter, FrontierSummary, PerformanceSummary,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "verdant")]
#[command(about = "Verdant: ESG-aware portfolio optimization and backtesting", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print markdown instead of terminal tables
    #[arg(long, global = true)]
    markdown: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ESG/Sharpe frontier with tangency and target portfolios
    Frontier {
        /// Price table (asset_id, dt, adj_close)
        #[arg(long)]
        prices: PathBuf,

        /// ESG table (asset_id, [dt], esg) or raw scores (asset_id, dt, esg_raw)
        #[arg(long)]
        esg: PathBuf,

        /// Daily risk-free table (dt, rate); zero when omitted
        #[arg(long)]
        risk_free: Option<PathBuf>,

        /// Also optimize for this portfolio ESG score
        #[arg(long)]
        target_esg: Option<f64>,

        #[command(flatten)]
        bounds: BoundsArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Mean-variance allocation for one date
    Allocate {
        /// Price table (asset_id, dt, adj_close)
        #[arg(long)]
        prices: PathBuf,

        /// Allocation date; latest return date when omitted
        #[arg(long)]
        date: Option<NaiveDate>,

        #[command(flatten)]
        allocator: AllocatorArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Replay weight snapshots against realized returns
    Backtest {
        /// Return table (asset_id, dt, return_1d)
        #[arg(long)]
        returns: PathBuf,

        /// Weight table (dt, asset_id, weight)
        #[arg(long)]
        weights: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Features, allocation and backtest in one pass
    Run {
        /// Price table (asset_id, dt, adj_close)
        #[arg(long)]
        prices: PathBuf,

        /// Previously published weights (dt, asset_id, weight)
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Directory for returns, covariances, weights and performance tables
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Table format (csv, json or pretty-json)
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        #[command(flatten)]
        allocator: AllocatorArgs,
    },
}

#[derive(Args)]
struct BoundsArgs {
    /// Lower bound on every weight
    #[arg(long)]
    min_allocation: Option<f64>,

    /// Upper bound on every weight
    #[arg(long)]
    max_allocation: Option<f64>,

    /// Spacing of the frontier grid
    #[arg(long)]
    step: Option<f64>,
}

#[derive(Args)]
struct AllocatorArgs {
    /// Mean-variance risk aversion
    #[arg(long, env = "RISK_AVERSION")]
    risk_aversion: Option<f64>,

    /// Per-asset weight cap
    #[arg(long, env = "WEIGHT_CAP")]
    weight_cap: Option<f64>,

    /// Calendar-day lookback for expected returns
    #[arg(long, env = "EXPECTED_RETURN_LOOKBACK")]
    lookback_days: Option<u32>,

    /// Rolling covariance window in trading days
    #[arg(long, env = "COV_WINDOW_DAYS")]
    cov_window: Option<usize>,
}

#[derive(Args)]
struct OutputArgs {
    /// Write the result table to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Table format (csv, json or pretty-json)
    #[arg(long, default_value = "csv")]
    format: ExportFormat,
}

impl BoundsArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.min_allocation {
            config.optimizer.min_allocation = v;
        }
        if let Some(v) = self.max_allocation {
            config.optimizer.max_allocation = v;
        }
        if let Some(v) = self.step {
            config.optimizer.frontier_step = v;
        }
    }
}

impl AllocatorArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.risk_aversion {
            config.allocator.risk_aversion = v;
        }
        if let Some(v) = self.weight_cap {
            config.allocator.weight_cap = v;
        }
        if let Some(v) = self.lookback_days {
            config.allocator.lookback_days = v;
        }
        if let Some(v) = self.cov_window {
            config.rolling.window = v;
        }
    }
}

impl OutputArgs {
    fn write<E: Exporter + ?Sized>(&self, table: &E) -> CliResult<()> {
        if let Some(path) = &self.output {
            table.export_to_file(path, self.format)?;
            tracing::info!(path = %path.display(), format = %self.format, "wrote output");
        }
        Ok(())
    }
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Frontier {
            prices,
            esg,
            risk_free,
            target_esg,
            bounds,
            output,
        } => {
            bounds.apply(&mut config);
            if target_esg.is_some() {
                config.target_esg = target_esg;
            }
            let summary = frontier(&prices, &esg, risk_free.as_deref(), &config, &output)?;
            emit(&summary.to_ascii_table(), &summary.to_markdown(), cli.markdown);
        }
        Commands::Allocate {
            prices,
            date,
            allocator,
            output,
        } => {
            allocator.apply(&mut config);
            let features = run_features(&load_prices(&prices)?, &config)?;
            let allocator = config.allocator();
            let artifacts = match date {
                Some(date) => allocator.allocate(&features.returns, &features.covariances, date)?,
                None => allocator.allocate_latest(&features.returns, &features.covariances)?,
            };
            output.write(std::slice::from_ref(&artifacts.snapshot))?;
            let summary = AllocationSummary::new(&artifacts);
            emit(&summary.to_ascii_table(), &summary.to_markdown(), cli.markdown);
        }
        Commands::Backtest {
            returns,
            weights,
            output,
        } => {
            let returns = returns_from_frame(&read_csv(&returns)?)?;
            let snapshots = load_snapshots(&weights)?;
            let outcome = run_backtest(&returns, &snapshots)?;
            output.write(&outcome.records)?;
            let summary = PerformanceSummary::new("Backtest", &outcome);
            emit(&summary.to_ascii_table(), &summary.to_markdown(), cli.markdown);
        }
        Commands::Run {
            prices,
            weights,
            output_dir,
            format,
            allocator,
        } => {
            allocator.apply(&mut config);
            let history = match &weights {
                Some(path) => load_snapshots(path)?,
                None => Vec::new(),
            };
            let artifacts = Pipeline::new(config).run(&load_prices(&prices)?, &history)?;

            if let Some(dir) = output_dir {
                std::fs::create_dir_all(&dir)?;
                let file = |name: &str| dir.join(format!("{name}.{}", format.extension()));
                artifacts
                    .features
                    .returns
                    .export_to_file(&file("returns"), format)?;
                artifacts
                    .features
                    .covariances
                    .export_to_file(&file("covariances"), format)?;
                artifacts.snapshots.export_to_file(&file("weights"), format)?;
                artifacts
                    .backtest
                    .records
                    .export_to_file(&file("performance"), format)?;
                tracing::info!(dir = %dir.display(), "wrote pipeline tables");
            }

            match &artifacts.allocation {
                Some(allocation) => {
                    let summary = AllocationSummary::new(allocation);
                    emit(&summary.to_ascii_table(), &summary.to_markdown(), cli.markdown);
                }
                None => println!("No returns; nothing to allocate."),
            }
            let summary = PerformanceSummary::new("Pipeline", &artifacts.backtest);
            emit(&summary.to_ascii_table(), &summary.to_markdown(), cli.markdown);
        }
    }

    Ok(())
}

fn frontier(
    prices: &Path,
    esg: &Path,
    risk_free: Option<&Path>,
    config: &PipelineConfig,
    output: &OutputArgs,
) -> CliResult<FrontierSummary> {
    let panel = PricePanel::from_series(&load_prices(prices)?)?;
    let esg = load_esg(esg)?;
    let risk_free = match risk_free {
        Some(path) => risk_free_from_frame(&read_csv(path)?)?,
        None => RiskFreeSeries::default(),
    };
    let stats = frontier_statistics(&panel, &risk_free, &esg, config)?;

    let optimizer = config.optimizer();
    let tangency = optimizer.max_sharpe_unconstrained(&stats)?;

    let sweeper = config.sweeper();
    let mut sweep = sweeper.sweep(&stats, &esg)?;
    let pb = ProgressBar::new(sweep.targets().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.set_message("Sweeping ESG targets...");
    let mut points: Vec<FrontierPoint> = Vec::new();
    while let Some(point) = sweep.next() {
        points.push(point);
        pb.set_position(sweep.processed() as u64);
    }
    pb.finish_with_message(format!(
        "{} of {} targets feasible",
        points.len(),
        sweep.targets().len()
    ));

    output.write(&points)?;

    let mut summary = FrontierSummary::new(points)
        .with_portfolio("Tangency", &tangency)
        .with_asset_sharpes(asset_sharpes(&stats));
    if let Some(target) = config.target_esg {
        let optimized = optimizer.optimize(&stats, &esg, target)?;
        summary = summary.with_portfolio(format!("ESG target {target:.2}"), &optimized);
    }
    Ok(summary)
}

fn load_prices(path: &Path) -> CliResult<Vec<AssetSeries>> {
    Ok(prices_from_frame(&read_csv(path)?)?)
}

fn load_esg(path: &Path) -> CliResult<EsgScores> {
    Ok(esg_scores_from_any_frame(&read_csv(path)?)?)
}

fn load_snapshots(path: &Path) -> CliResult<Vec<WeightSnapshot>> {
    let rows = weights_from_frame(&read_csv(path)?)?;
    Ok(WeightSnapshot::from_rows(&rows)?)
}

fn emit(table: &str, markdown: &str, as_markdown: bool) {
    if as_markdown {
        println!("{markdown}");
    } else {
        println!("{table}");
    }
}

//! Tangent CLI binary.
//!
//! Builds a long-only portfolio for a list of tickers and manages the quote
//! cache.

mod cache;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tangent::{ForecastSource, Pipeline, RunConfig, RunOutcome};
use tangent_data::{CachedPriceProvider, OpenAiForecaster, PriceHistoryProvider, YahooQuoteProvider};
use tangent_optimize::OptimizationMethod;
use tangent_output::{ExportFormat, Exporter};
use tangent_returns::Frequency;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Investment used for reporting when neither flag nor config sets one.
const DEFAULT_INVESTMENT: f64 = 10_000.0;

#[derive(Parser)]
#[command(name = "tangent")]
#[command(about = "Tangent: Black-Litterman portfolio construction", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate views, blend them and optimize a portfolio
    Optimize(OptimizeArgs),

    /// Inspect or clear the quote cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache location and contents
    Stats,

    /// Remove cached quotes
    Clear {
        /// Only clear this symbol
        #[arg(long)]
        symbol: Option<String>,
    },
}

#[derive(Args)]
struct OptimizeArgs {
    /// Tickers to allocate across (at least two)
    #[arg(required = true, num_args = 1..)]
    tickers: Vec<String>,

    /// JSON run configuration; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optimization objective
    #[arg(long, value_enum)]
    method: Option<Method>,

    /// Where the views come from
    #[arg(long, value_enum)]
    source: Option<Source>,

    /// Return frequency for CAPM and historical means
    #[arg(long, value_enum)]
    frequency: Option<ReturnFrequency>,

    /// First price date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last price date (YYYY-MM-DD), default today
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Amount invested, for the allocation table and growth simulation
    #[arg(long)]
    amount: Option<f64>,

    /// Annual risk-free rate used for the Sharpe ratio
    #[arg(long)]
    risk_free_rate: Option<f64>,

    /// Uncertainty scaling of the prior
    #[arg(long)]
    tau: Option<f64>,

    /// Market risk aversion
    #[arg(long)]
    risk_aversion: Option<f64>,

    /// Use forecast confidences as view uncertainty
    #[arg(long)]
    use_confidence: bool,

    /// API key for the external forecaster
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Chat model used for forecasts
    #[arg(long, env = "TANGENT_FORECAST_MODEL")]
    model: Option<String>,

    /// Report format on stdout
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also write the allocation to this file (.csv or .json)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the simulated growth series to this file (.csv or .json)
    #[arg(long)]
    growth: Option<PathBuf>,

    /// Disable caching (always fetch fresh data)
    #[arg(long)]
    no_cache: bool,

    /// Force refresh cached data
    #[arg(long)]
    refresh: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    MaxSharpe,
    MinVolatility,
}

impl From<Method> for OptimizationMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::MaxSharpe => Self::MaxSharpe,
            Method::MinVolatility => Self::MinVolatility,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    HistoricalMean,
    Capm,
    External,
}

impl From<Source> for ForecastSource {
    fn from(source: Source) -> Self {
        match source {
            Source::HistoricalMean => Self::HistoricalMean,
            Source::Capm => Self::Capm,
            Source::External => Self::External,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReturnFrequency {
    Daily,
    Monthly,
}

impl From<ReturnFrequency> for Frequency {
    fn from(frequency: ReturnFrequency) -> Self {
        match frequency {
            ReturnFrequency::Daily => Self::Daily,
            ReturnFrequency::Monthly => Self::Monthly,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
    Csv,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Optimize(args) => optimize(args).await?,
        Commands::Cache { action } => {
            let path = cache::default_cache_path();
            match action {
                CacheAction::Stats => cache::print_stats(&path)?,
                CacheAction::Clear { symbol } => cache::clear(&path, symbol.as_deref())?,
            }
        }
    }
    Ok(())
}

/// Merge the config file with command-line overrides.
fn run_config(args: &OptimizeArgs) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(method) = args.method {
        config.method = method.into();
    }
    if let Some(source) = args.source {
        config.source = source.into();
    }
    if let Some(frequency) = args.frequency {
        config.capm.frequency = frequency.into();
        config.historical.frequency = frequency.into();
    }
    if args.start.is_some() {
        config.fetch.start = args.start;
    }
    if args.end.is_some() {
        config.fetch.end = args.end;
    }
    config.investment_amount = args
        .amount
        .or(config.investment_amount)
        .or(Some(DEFAULT_INVESTMENT));
    if let Some(rate) = args.risk_free_rate {
        config = config.with_risk_free_rate(rate);
    }
    if let Some(tau) = args.tau {
        config = config.with_tau(tau);
    }
    if let Some(delta) = args.risk_aversion {
        config = config.with_risk_aversion(delta);
    }
    if args.use_confidence {
        config.use_forecast_confidence = true;
    }

    config.validate()?;
    Ok(config)
}

async fn optimize(args: OptimizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = run_config(&args)?;
    let range = config.fetch.date_range(Utc::now().date_naive())?;

    tracing::debug!(
        method = %config.method,
        source = %config.source,
        start = %range.start(),
        end = %range.end(),
        "resolved run configuration"
    );

    let provider = YahooQuoteProvider::new()?;
    let cache = if args.no_cache {
        None
    } else {
        let path = cache::default_cache_path();
        match cache::open_cache(&path) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache unavailable, fetching directly");
                None
            }
        }
    };

    match cache {
        Some(cache) => {
            let provider = CachedPriceProvider::new(provider, cache).with_force_refresh(args.refresh);
            execute(Pipeline::new(provider, config), &args, range).await
        }
        None => execute(Pipeline::new(provider, config), &args, range).await,
    }
}

async fn execute<P: PriceHistoryProvider>(
    pipeline: Pipeline<P>,
    args: &OptimizeArgs,
    range: tangent_data::DateRange,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = if pipeline.config().source == ForecastSource::External {
        let api_key = args
            .openai_api_key
            .clone()
            .ok_or("the external source needs OPENAI_API_KEY or --openai-api-key")?;
        let mut forecaster = OpenAiForecaster::new(api_key)?;
        if let Some(base_url) = &args.openai_base_url {
            forecaster = forecaster.with_base_url(base_url.clone());
        }
        if let Some(model) = &args.model {
            forecaster = forecaster.with_model(model.clone());
        }
        pipeline.with_forecaster(Arc::new(forecaster))
    } else {
        pipeline
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Optimizing {} tickers ({} to {})...",
        args.tickers.len(),
        range.start(),
        range.end()
    ));

    let outcome = match pipeline.run(&args.tickers, range).await {
        Ok(outcome) => {
            spinner.finish_and_clear();
            outcome
        }
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    print_outcome(&outcome, args.format)?;

    if let Some(path) = &args.output {
        outcome.report.export_to_file(path, ExportFormat::from_path(path)?)?;
        eprintln!("Allocation written to {}", path.display());
    }
    if let Some(path) = &args.growth {
        match &outcome.growth {
            Some(growth) => {
                growth.export_to_file(path, ExportFormat::from_path(path)?)?;
                eprintln!("Growth series written to {}", path.display());
            }
            None => eprintln!("No growth series: no investment amount configured"),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Text => {
            print!("{}", outcome.report);
            if let Some(growth) = &outcome.growth
                && let (Some(value), Some(total)) = (growth.final_value(), growth.total_return())
            {
                println!(
                    "Simulated value: ${:.2} ({:+.2}%) over {} trading days",
                    value,
                    total * 100.0,
                    growth.len()
                );
            }
        }
        OutputFormat::Markdown => print!("{}", outcome.report.to_markdown()),
        OutputFormat::Json => println!("{}", outcome.report.export_to_string(ExportFormat::PrettyJson)?),
        OutputFormat::Csv => print!("{}", outcome.report.export_to_string(ExportFormat::Csv)?),
    }
    Ok(())
}

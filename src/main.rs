use anyhow::Context;
use clap::{Parser, Subcommand};
use property_search_gateway::{
    circuit_breaker::CircuitBreaker,
    config::{Config, ObservabilityConfig},
    metrics::{gather_metrics, init_metrics, PROMETHEUS_REGISTRY},
    models::{SearchMode, SearchRequest},
    retry::{Cancellation, RetryHandler},
    store::{DocumentStore, ElasticsearchStore},
    AppError, SearchService,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "property-search")]
#[command(version, about = "Run property searches against the search index", long_about = None)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// JSON search request, or `-` for stdin
    #[arg(short, long, global = true)]
    request: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Dump Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a search (default)
    Search(RequestArgs),

    /// Count matching listings
    Count(RequestArgs),

    /// Fetch one listing by id
    Get {
        #[arg(value_name = "LISTING_ID")]
        id: String,
    },
}

/// Request built from flags when `--request` is not given
#[derive(clap::Args)]
struct RequestArgs {
    /// Search mode (text, filter, geo, similar, lifestyle, poi_proximity, cultural, investment)
    #[arg(short, long)]
    mode: Option<String>,

    /// Free-text query
    #[arg(short, long)]
    query: Option<String>,

    /// Source listing for similar mode
    #[arg(long)]
    similar_to: Option<String>,

    #[arg(short, long, default_value = "1")]
    page: u32,

    #[arg(short, long, default_value = "20")]
    size: u32,

    /// Include facet aggregations
    #[arg(short, long)]
    aggregations: bool,
}

impl Default for RequestArgs {
    fn default() -> Self {
        Self {
            mode: None,
            query: None,
            similar_to: None,
            page: 1,
            size: 20,
            aggregations: false,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<AppError>()
            .map(AppError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_tracing(&config.observability);
    tracing::info!("Starting property search v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Err(e) = init_metrics(&PROMETHEUS_REGISTRY) {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    let store = Arc::new(ElasticsearchStore::new(config.store.clone())?);
    let breaker = Arc::new(CircuitBreaker::new(
        store.name(),
        config.circuit_breaker.clone(),
    ));
    let retry = RetryHandler::new(config.retry.clone());
    let service = SearchService::new(store, breaker, retry, config.search.clone())
        .map_err(AppError::from)?;

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Search(RequestArgs::default()));

    match command {
        Commands::Search(args) => {
            let request = load_request(cli.request.as_deref(), args)?;

            let cancellation = Cancellation::new();
            let on_interrupt = cancellation.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling search");
                    on_interrupt.cancel();
                }
            });

            let response = service
                .search_with_cancellation(request, &cancellation)
                .await
                .map_err(AppError::from)?;
            print_json(&response, cli.pretty)?;
        }
        Commands::Count(args) => {
            let request = load_request(cli.request.as_deref(), args)?;
            let count = service.count(&request).await.map_err(AppError::from)?;
            print_json(&serde_json::json!({ "count": count }), cli.pretty)?;
        }
        Commands::Get { id } => {
            let property = service
                .get_property(&id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| AppError::NotFound(id.clone()))?;
            print_json(&property, cli.pretty)?;
        }
    }

    if cli.metrics {
        eprint!("{}", gather_metrics(&PROMETHEUS_REGISTRY));
    }

    Ok(())
}

/// Logs go to stderr so stdout carries only the JSON result
fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("property_search_gateway={}", observability.log_level).into()
    });
    let json = observability.json_logs;

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .init();
}

fn load_request(source: Option<&str>, args: RequestArgs) -> anyhow::Result<SearchRequest> {
    if let Some(source) = source {
        let raw = if source == "-" {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read request from stdin")?;
            buffer
        } else {
            std::fs::read_to_string(source)
                .with_context(|| format!("Failed to read request file {}", source))?
        };
        let request: SearchRequest = serde_json::from_str(&raw).map_err(AppError::from)?;
        return Ok(request);
    }

    let mode = match args.mode.as_deref() {
        Some(name) => SearchMode::parse(name).map_err(AppError::from)?,
        None if args.similar_to.is_some() => SearchMode::Similar,
        None => SearchMode::Text,
    };

    let mut request = SearchRequest::new(mode)
        .with_page(args.page, args.size)
        .with_aggregations(args.aggregations);
    request.query = args.query;
    request.similar_to_id = args.similar_to;
    Ok(request)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

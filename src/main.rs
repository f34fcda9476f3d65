//! SearchRelay command-line interface

use anyhow::Result;
use clap::{Parser, Subcommand};
use searchrelay::{
    autosave::{AutoSave, FileAutoSave, NoopAutoSave},
    config::{self, Settings},
    coordinator::DualChannelSearchCoordinator,
    network::HttpClient,
    pipeline::{ComponentRegistration, Context, ResilientPipelineExecutor},
    providers::ProviderLoader,
    results::SearchResult,
    search::FallbackSearchManager,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Resilient multi-provider web search
#[derive(Parser, Debug)]
#[command(name = "searchrelay")]
#[command(version, about = "Resilient multi-provider web search", long_about = None)]
struct Cli {
    /// Path to a YAML settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Do not persist intermediate stages
    #[arg(long)]
    no_save: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search providers in priority order until one answers
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
    /// Run queries on every available provider at once and keep all results
    Parallel {
        #[arg(required = true)]
        queries: Vec<String>,
        /// Maximum number of results per provider
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
    /// Search the semantic, keyword and residual channels at once
    Coordinate {
        query: String,
        /// Market segment used to derive the channel queries
        #[arg(long)]
        segment: Option<String>,
    },
    /// Run the web research pipeline and print the run report
    Analyze {
        query: String,
        #[arg(long)]
        segment: Option<String>,
    },
    /// Show loaded providers and their availability
    Providers,
    /// Send a test query to one provider
    Probe {
        provider: String,
        #[arg(long, default_value = "test")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("Starting SearchRelay v{}", searchrelay::VERSION);
    let settings = config::load(cli.config.as_deref())?;

    let client = HttpClient::with_settings(&settings.outgoing)?
        .with_language(&settings.search.locale.language);
    let registry = Arc::new(ProviderLoader::load(&settings, &client));
    let fallback = Arc::new(FallbackSearchManager::new(
        registry.clone(),
        &settings.search,
    ));
    let autosave = autosave_store(&settings, cli.no_save)?;

    match cli.command {
        Command::Search { query, max_results } => {
            let max_results = max_results.unwrap_or(settings.search.default_max_results);
            let results = fallback.search_with_fallback(&query, max_results).await;
            print_json(&results)?;
        }
        Command::Parallel {
            queries,
            max_results,
        } => {
            let max_results = max_results.unwrap_or(settings.search.default_max_results);
            let outcome = fallback.search_parallel(&queries, max_results).await;
            print_json(&outcome)?;
        }
        Command::Coordinate { query, segment } => {
            let coordinator = DualChannelSearchCoordinator::new(
                fallback,
                autosave,
                settings.coordinator.clone(),
            );
            let context = segment_context(&settings, segment);
            let aggregate = coordinator
                .execute_simultaneous_distinct_search(&query, &context)
                .await;
            print_json(&aggregate)?;
        }
        Command::Analyze { query, segment } => {
            let executor = research_pipeline(&settings, fallback, autosave);
            let mut context = segment_context(&settings, segment);
            context.insert("query".to_string(), json!(query));
            let run = executor.run(context, None).await;
            print_json(&run)?;
        }
        Command::Providers => {
            print_json(&registry.provider_status())?;
        }
        Command::Probe { provider, query } => {
            if !registry.contains(&provider) {
                anyhow::bail!("provider {} is not loaded", provider);
            }
            let ok = registry.test_provider(&provider, &query, 3).await;
            print_json(&json!({ "provider": provider, "ok": ok }))?;
        }
    }

    Ok(())
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("searchrelay=info,warn"),
        1 => EnvFilter::new("searchrelay=debug,info"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn autosave_store(settings: &Settings, disabled: bool) -> Result<Arc<dyn AutoSave>> {
    if disabled || !settings.autosave.enabled {
        return Ok(Arc::new(NoopAutoSave));
    }
    Ok(Arc::new(FileAutoSave::new(settings.autosave.directory.clone())?))
}

fn segment_context(settings: &Settings, segment: Option<String>) -> Map<String, Value> {
    let mut context = Map::new();
    if let Some(segment) = segment {
        context.insert(settings.coordinator.domain_key.clone(), json!(segment));
    }
    context
}

/// Coordinated web research followed by a per-host source summary
fn research_pipeline(
    settings: &Settings,
    fallback: Arc<FallbackSearchManager>,
    autosave: Arc<dyn AutoSave>,
) -> ResilientPipelineExecutor {
    let coordinator = Arc::new(DualChannelSearchCoordinator::new(
        fallback.clone(),
        autosave.clone(),
        settings.coordinator.clone(),
    ));
    let max_results = settings.search.default_max_results;

    let research = ComponentRegistration::new("web_research", move |ctx: Context| {
        coordinated_research(coordinator.clone(), ctx)
    })
    .required(true)
    .with_fallback(move |ctx: Context| {
        fallback_research(fallback.clone(), max_results, ctx)
    });

    let sources = ComponentRegistration::new("source_summary", summarize_sources)
        .depends_on(["web_research"]);

    ResilientPipelineExecutor::new(autosave, settings.pipeline.clone())
        .with_component(research)
        .with_component(sources)
}

async fn coordinated_research(
    coordinator: Arc<DualChannelSearchCoordinator>,
    context: Context,
) -> Result<Value> {
    let query = query_from(&context)?;
    let aggregate = coordinator
        .execute_simultaneous_distinct_search(&query, &context)
        .await;
    if aggregate.statistics.total_results == 0 {
        return Ok(Value::Null);
    }
    Ok(serde_json::to_value(aggregate)?)
}

async fn fallback_research(
    fallback: Arc<FallbackSearchManager>,
    max_results: usize,
    context: Context,
) -> Result<Value> {
    let query = query_from(&context)?;
    let results = fallback.search_with_fallback(&query, max_results).await;
    if results.is_empty() {
        return Ok(Value::Null);
    }
    Ok(json!({ "residual": results }))
}

/// Count results per host across every channel
async fn summarize_sources(context: Context) -> Result<Value> {
    let research = context.get("web_research").cloned().unwrap_or(Value::Null);
    let mut hosts: BTreeMap<String, usize> = BTreeMap::new();
    for channel in ["semantic", "keyword", "residual"] {
        let Some(value) = research.get(channel) else {
            continue;
        };
        let results: Vec<SearchResult> = serde_json::from_value(value.clone())?;
        for result in results {
            if let Some(host) = result.hostname() {
                *hosts.entry(host).or_default() += 1;
            }
        }
    }
    Ok(serde_json::to_value(hosts)?)
}

fn query_from(context: &Context) -> Result<String> {
    context
        .get("query")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("context has no query"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

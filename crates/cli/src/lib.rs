use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use coderag_graph::GraphError;
use coderag_indexer::IndexerError;
use coderag_protocol::{serialize_json, ErrorEnvelope, ProviderError};
use coderag_search::{GraphIntent, RouteOptions, SearchError};
use config::Settings;
use context::AppContext;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

mod commands;
pub mod config;
mod context;
mod flags;

use flags::IntentFlag;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "coderag")]
#[command(about = "Graph-aware retrieval over source code", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $CODERAG_CONFIG, then ./coderag.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Collection to index or query
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Print JSON on stdout; errors become JSON envelopes
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the code graph of a repository into a collection
    Index(IndexArgs),

    /// Show how a question would be routed
    Classify(ClassifyArgs),

    /// Callers, callees, call chain or impact of one function
    Graph(GraphArgs),

    /// Route a question and print the merged context
    Query(QueryArgs),

    /// Node and edge counts
    Stats(StatsArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Repository directory
    repo: PathBuf,

    /// Extra glob patterns to skip (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    exclude: Vec<String>,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Question text
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
}

#[derive(Args)]
struct GraphArgs {
    /// Function name
    function: String,

    /// Graph operation
    #[arg(long, value_enum, default_value = "impact")]
    intent: IntentFlag,

    /// Call chain depth
    #[arg(long)]
    depth: Option<usize>,
}

#[derive(Args)]
struct QueryArgs {
    /// Question text
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,

    /// Passages requested from the retriever (1-20)
    #[arg(long)]
    top_k: Option<usize>,

    /// Drop passages scoring below this
    #[arg(long)]
    min_score: Option<f32>,

    /// Character budget for passages
    #[arg(long)]
    max_chars: Option<usize>,

    /// Call chain depth
    #[arg(long)]
    depth: Option<usize>,

    /// Also answer with the LLM from the routed context
    #[arg(long)]
    ask: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Count every collection instead of the selected one
    #[arg(long)]
    all: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet || cli.json);

    let json = cli.json;
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) if json => {
            log::debug!("Command failed: {err:#}");
            print_stdout(&serialize_json(&error_envelope(&err))?)?;
            std::process::exit(1);
        }
        Err(err) => Err(err),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Classify(args) = &cli.command {
        let out = commands::classify(&args.text.join(" "));
        return emit(cli.json, &out, commands::render_classify);
    }

    let settings = resolve_settings(&cli)?;
    let ctx = AppContext::open(settings)?;

    match cli.command {
        Commands::Index(args) => {
            let out = commands::index(&ctx, &args.repo, &args.exclude)?;
            emit(cli.json, &out, commands::render_index)
        }
        Commands::Graph(args) => {
            let intent: GraphIntent = args.intent.as_domain();
            let answer = commands::graph(&ctx, &args.function, intent, args.depth)?;
            emit(cli.json, &answer, commands::render_graph)
        }
        Commands::Query(args) => {
            let search = &ctx.settings.search;
            let options = RouteOptions {
                top_k: args.top_k.unwrap_or(search.top_k),
                min_score: args.min_score.unwrap_or(search.min_score),
                max_chars: args.max_chars.or(search.max_chars),
                chain_depth: args.depth,
            };
            let out = commands::query(&ctx, &args.text.join(" "), &options, args.ask).await?;
            emit(cli.json, &out, commands::render_query)
        }
        Commands::Stats(args) => {
            let out = commands::stats(&ctx, args.all)?;
            emit(cli.json, &out, commands::render_stats)
        }
        Commands::Classify(_) => Ok(()),
    }
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let (mut settings, source) = Settings::load(cli.config.as_deref())?;
    if let Some(path) = source {
        log::debug!("Loaded settings from {}", path.display());
    }
    if let Some(db) = &cli.db {
        settings.db_path = db.clone();
    }
    if let Some(collection) = &cli.collection {
        settings.collection = collection.clone();
    }
    Ok(settings)
}

fn emit<T: Serialize>(json: bool, value: &T, render: fn(&T) -> String) -> Result<()> {
    if json {
        print_stdout(&serialize_json(value)?)
    } else {
        print_stdout(&render(value))
    }
}

/// Map a command failure to a stable machine-readable code.
fn error_envelope(err: &anyhow::Error) -> ErrorEnvelope {
    for cause in err.chain() {
        if let Some(provider) = cause.downcast_ref::<ProviderError>() {
            return provider.into();
        }
        if let Some(search) = cause.downcast_ref::<SearchError>() {
            match search {
                SearchError::Provider(provider) => return provider.into(),
                SearchError::EmptyQuery => {
                    return ErrorEnvelope::new("empty_query", search.to_string())
                }
                SearchError::Graph(_) => {
                    return ErrorEnvelope::new("graph_store", search.to_string())
                }
            }
        }
        if let Some(indexer) = cause.downcast_ref::<IndexerError>() {
            return match indexer {
                IndexerError::InvalidPath(_) => {
                    ErrorEnvelope::new("invalid_path", indexer.to_string())
                        .with_hint("Pass an existing repository directory")
                }
                _ => ErrorEnvelope::new("index_failed", indexer.to_string()),
            };
        }
        if cause.downcast_ref::<GraphError>().is_some() {
            return ErrorEnvelope::new("graph_store", format!("{err:#}"));
        }
    }
    ErrorEnvelope::new("internal", format!("{err:#}"))
}

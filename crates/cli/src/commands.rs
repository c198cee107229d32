use crate::context::AppContext;
use anyhow::{Context as AnyhowContext, Result};
use coderag_graph::GraphStats;
use coderag_indexer::{last_indexed_key, num_files_key, repo_path_key, CodeGraphIndexer, IndexStats};
use coderag_providers::build_prompt;
use coderag_search::{
    GraphAnswer, GraphIntent, IdentifierExtractor, MatchedPhrases, QueryClassifier, QueryType,
    RouteOptions, RoutedContext,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct IndexOutput {
    pub collection: String,
    pub repo: String,
    pub stats: IndexStats,
}

#[derive(Debug, Serialize)]
pub struct ClassifyOutput {
    pub query: String,
    pub query_type: QueryType,
    pub matched: MatchedPhrases,
    pub identifier: Option<String>,
    pub hint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QueryOutput {
    #[serde(flatten)]
    pub routed: RoutedContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    /// `None` when the whole store was counted
    pub collection: Option<String>,
    #[serde(flatten)]
    pub stats: GraphStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_indexed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
}

pub fn index(ctx: &AppContext, repo: &Path, exclude: &[String]) -> Result<IndexOutput> {
    let patterns = ctx.settings.exclude.iter().chain(exclude.iter());
    let stats = CodeGraphIndexer::new(&ctx.store)
        .with_excludes(patterns)
        .index(repo, ctx.collection())?;

    for error in &stats.errors {
        log::warn!("Skipped {}", error);
    }

    Ok(IndexOutput {
        collection: ctx.collection().to_string(),
        repo: repo.display().to_string(),
        stats,
    })
}

pub fn classify(text: &str) -> ClassifyOutput {
    let query_type = QueryClassifier::classify(text);
    let identifier = query_type
        .wants_graph()
        .then(|| IdentifierExtractor::extract(text))
        .flatten();

    ClassifyOutput {
        query: text.to_string(),
        query_type,
        matched: QueryClassifier::matched_phrases(text),
        identifier,
        hint: QueryClassifier::strategy_hint(query_type),
    }
}

pub fn graph(
    ctx: &AppContext,
    function: &str,
    intent: GraphIntent,
    depth: Option<usize>,
) -> Result<GraphAnswer> {
    let mut engine = ctx.graph_engine();
    if let Some(depth) = depth {
        engine = engine.with_chain_depth(depth);
    }
    engine
        .run(function, intent)
        .with_context(|| format!("graph query for '{function}' failed"))
}

pub async fn query(
    ctx: &AppContext,
    text: &str,
    options: &RouteOptions,
    ask: bool,
) -> Result<QueryOutput> {
    let routed = ctx.router().route(text, options).await?;

    let answer = if ask {
        let llm = ctx.llm()?;
        let prompt = build_prompt(&routed.context, &routed.query);
        log::info!("Asking {} ({} context chars)", llm.name(), routed.context.len());
        Some(llm.generate(&prompt).await?)
    } else {
        None
    };

    Ok(QueryOutput { routed, answer })
}

pub fn stats(ctx: &AppContext, all: bool) -> Result<StatsOutput> {
    if all {
        return Ok(StatsOutput {
            collection: None,
            stats: ctx.store.stats()?,
            last_indexed: None,
            num_files: None,
            repo_path: None,
        });
    }

    let collection = ctx.collection();
    let meta = |key: String| ctx.store.get_meta(&key);
    Ok(StatsOutput {
        collection: Some(collection.to_string()),
        stats: ctx.store.stats_for(collection)?,
        last_indexed: meta(last_indexed_key(collection))?.and_then(|v| v.parse().ok()),
        num_files: meta(num_files_key(collection))?.and_then(|v| v.parse().ok()),
        repo_path: meta(repo_path_key(collection))?,
    })
}

pub fn render_index(out: &IndexOutput) -> String {
    let mut text = format!(
        "Indexed {} files into '{}': {} nodes, {} edges in {}ms",
        out.stats.files, out.collection, out.stats.nodes, out.stats.edges, out.stats.time_ms
    );
    if !out.stats.errors.is_empty() {
        let _ = write!(text, " ({} files skipped)", out.stats.errors.len());
    }
    text
}

pub fn render_classify(out: &ClassifyOutput) -> String {
    let mut text = format!("{}\n{}", out.query_type, out.hint);
    if !out.matched.graph.is_empty() {
        let _ = write!(text, "\ngraph phrases: {}", out.matched.graph.join(", "));
    }
    if !out.matched.semantic.is_empty() {
        let _ = write!(text, "\nsemantic phrases: {}", out.matched.semantic.join(", "));
    }
    if let Some(identifier) = &out.identifier {
        let _ = write!(text, "\nidentifier: {identifier}");
    }
    text
}

pub fn render_graph(answer: &GraphAnswer) -> String {
    answer.facts().join("\n")
}

pub fn render_query(out: &QueryOutput) -> String {
    let routed = &out.routed;
    let mut text = format!("[{}]", routed.query_type);
    for degradation in &routed.degradation {
        let _ = write!(text, " degraded: {degradation:?}");
    }
    text.push('\n');
    if routed.context.is_empty() {
        text.push_str("No context found.");
    } else {
        text.push_str(&routed.context);
    }
    if let Some(answer) = &out.answer {
        let _ = write!(text, "\n\n## Answer\n{answer}");
    }
    text
}

pub fn render_stats(out: &StatsOutput) -> String {
    let scope = out.collection.as_deref().unwrap_or("all collections");
    let mut text = format!(
        "{scope}: {} nodes, {} edges",
        out.stats.node_count, out.stats.edge_count
    );
    for (kind, count) in &out.stats.nodes_by_kind {
        let _ = write!(text, "\n  {kind}: {count}");
    }
    for (relation, count) in &out.stats.edges_by_relation {
        let _ = write!(text, "\n  {relation}: {count}");
    }
    if let Some(repo) = &out.repo_path {
        let _ = write!(text, "\nrepository: {repo}");
    }
    if let Some(files) = out.num_files {
        let _ = write!(text, "\nfiles: {files}");
    }
    text
}

use crate::error::{IndexerError, Result};
use crate::scanner::{relative_path_string, FileScanner};
use crate::stats::IndexStats;
use coderag_graph::{
    scoped_id, Edge, ExtractedEdge, FileGraph, GraphStore, Relation, SourceAnalyzer,
};
use coderag_protocol::path_filters::ExclusionSet;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Metadata key holding the unix time of the last index run.
pub fn last_indexed_key(collection: &str) -> String {
    format!("last_indexed:{collection}")
}

/// Metadata key holding the number of files analyzed in the last run.
pub fn num_files_key(collection: &str) -> String {
    format!("num_files:{collection}")
}

/// Metadata key holding the repository path of the last run.
pub fn repo_path_key(collection: &str) -> String {
    format!("repo_path:{collection}")
}

/// Builds the code graph of one repository into one collection
///
/// Each run replaces the collection: its previous nodes and edges are cleared
/// before the tree is walked again.
pub struct CodeGraphIndexer<'a> {
    store: &'a GraphStore,
    excludes: Vec<String>,
}

impl<'a> CodeGraphIndexer<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self {
            store,
            excludes: Vec::new(),
        }
    }

    /// Extra exclusion patterns on top of the defaults.
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Index `repo_path` into `collection`.
    pub fn index(&self, repo_path: impl AsRef<Path>, collection: &str) -> Result<IndexStats> {
        let repo_path = repo_path.as_ref();
        if !repo_path.is_dir() {
            return Err(IndexerError::InvalidPath(repo_path.display().to_string()));
        }

        let start = Instant::now();
        log::info!(
            "Indexing {} into collection '{}'",
            repo_path.display(),
            collection
        );

        let cleared = self.store.clear_scope(collection)?;
        if cleared.nodes > 0 || cleared.edges > 0 {
            log::info!(
                "Replaced previous graph: {} nodes, {} edges removed",
                cleared.nodes,
                cleared.edges
            );
        }

        let exclusions = ExclusionSet::with_defaults(&self.excludes);
        for rejected in exclusions.rejected() {
            log::warn!("Ignoring malformed exclusion pattern '{}'", rejected);
        }
        let files = FileScanner::new(repo_path)
            .with_exclusions(exclusions)
            .scan();

        let mut stats = IndexStats::new();
        let mut analyzer = SourceAnalyzer::new()?;
        let mut analyzed: Vec<(String, FileGraph)> = Vec::with_capacity(files.len());

        for path in &files {
            let rel = match path.strip_prefix(repo_path) {
                Ok(relative) => relative_path_string(relative),
                Err(_) => path.display().to_string(),
            };
            log::debug!("Processing file: {}", rel);

            let source = match std::fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    log::warn!("Failed to read {}: {}", rel, e);
                    stats.add_error(format!("{rel}: {e}"));
                    continue;
                }
            };

            match analyzer.try_analyze(&rel, &source) {
                Ok(graph) => analyzed.push((rel, graph)),
                Err(e) => {
                    log::warn!("Skipping {}", e);
                    stats.add_error(e.to_string());
                }
            }
        }

        self.store.batch(|store| {
            write_graph(store, collection, &analyzed, &mut stats)
        })?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.store
            .set_meta(&last_indexed_key(collection), &now.to_string())?;
        self.store
            .set_meta(&num_files_key(collection), &stats.files.to_string())?;
        self.store.set_meta(
            &repo_path_key(collection),
            &repo_path.display().to_string(),
        )?;

        stats.time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Indexing completed: {} files, {} nodes, {} edges, {} errors in {} ms",
            stats.files,
            stats.nodes,
            stats.edges,
            stats.errors.len(),
            stats.time_ms
        );
        Ok(stats)
    }
}

/// Upsert every node first, then resolve and insert edges.
fn write_graph(
    store: &GraphStore,
    collection: &str,
    analyzed: &[(String, FileGraph)],
    stats: &mut IndexStats,
) -> coderag_graph::Result<()> {
    let mut defined_in_file: HashSet<(&str, &str)> = HashSet::new();
    let mut ids_by_name: HashMap<&str, HashSet<String>> = HashMap::new();

    for (rel, graph) in analyzed {
        for node in &graph.nodes {
            let mut scoped = node.clone().with_collection(collection);
            scoped.id = scoped_id(collection, &node.id);
            store.upsert_node(&scoped)?;

            defined_in_file.insert((rel.as_str(), node.name.as_str()));
            ids_by_name
                .entry(node.name.as_str())
                .or_default()
                .insert(scoped.id);
        }
        stats.add_file(graph.nodes.len());
    }

    let resolver = CallResolver {
        collection,
        defined_in_file,
        ids_by_name,
    };

    for (rel, graph) in analyzed {
        for extracted in &graph.edges {
            let edge = resolver.resolve(rel, extracted).with_collection(collection);
            stats.add_edge(store.insert_edge(&edge)?);
        }
    }

    Ok(())
}

/// Maps bare callee names to node ids within one collection
struct CallResolver<'g> {
    collection: &'g str,
    defined_in_file: HashSet<(&'g str, &'g str)>,
    ids_by_name: HashMap<&'g str, HashSet<String>>,
}

impl CallResolver<'_> {
    fn resolve(&self, file: &str, extracted: &ExtractedEdge) -> Edge {
        let source = scoped_id(self.collection, &extracted.source);
        let target = match extracted.relation {
            Relation::Imports => scoped_id(self.collection, &extracted.target),
            Relation::Calls => self.call_target(file, &extracted.target),
        };
        Edge::new(source, target, extracted.relation)
    }

    /// Same-file definition, else the collection's only definition of that
    /// name, else a dangling id in the caller's file.
    fn call_target(&self, file: &str, name: &str) -> String {
        let local = scoped_id(self.collection, &format!("{file}:{name}"));
        if self.defined_in_file.contains(&(file, name)) {
            return local;
        }
        match self.ids_by_name.get(name) {
            Some(ids) if ids.len() == 1 => ids.iter().next().cloned().unwrap_or(local),
            _ => local,
        }
    }
}

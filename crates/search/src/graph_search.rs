use crate::query_classifier::{asks_for_callees, contains_phrase};
use coderag_graph::{GraphStore, Node, NodeKind, Relation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default BFS depth for call chains.
pub const DEFAULT_CHAIN_DEPTH: usize = 5;

/// Graph operation requested by a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphIntent {
    /// Who calls the function
    Callers,
    /// What the function calls
    Calls,
    /// Transitive call chain
    Chain,
    /// The function with its callers and callees
    Impact,
}

impl GraphIntent {
    /// Pick the operation from intent phrases; impact analysis when none match.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let has = |phrases: &[&str]| phrases.iter().any(|p| contains_phrase(&lowered, p));

        if has(&["who calls", "called by", "callers", "what calls"]) {
            GraphIntent::Callers
        } else if has(&["calls what", "calls which", "callees"]) || asks_for_callees(&lowered) {
            GraphIntent::Calls
        } else if has(&["chain", "flow", "sequence"]) {
            GraphIntent::Chain
        } else {
            GraphIntent::Impact
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            GraphIntent::Callers => "callers",
            GraphIntent::Calls => "calls",
            GraphIntent::Chain => "chain",
            GraphIntent::Impact => "impact",
        }
    }
}

impl fmt::Display for GraphIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "callers" => Ok(GraphIntent::Callers),
            "calls" => Ok(GraphIntent::Calls),
            "chain" => Ok(GraphIntent::Chain),
            "impact" => Ok(GraphIntent::Impact),
            other => Err(format!(
                "unknown graph intent '{other}' (expected callers, calls, chain or impact)"
            )),
        }
    }
}

/// One BFS edge of a call chain, with names resolved where nodes exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub from: String,
    pub to: String,
    pub source_id: String,
    pub target_id: String,
}

/// Role of a node in an impact analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactRole {
    #[serde(rename = "self")]
    Target,
    Caller,
    Called,
}

impl ImpactRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            ImpactRole::Target => "self",
            ImpactRole::Caller => "caller",
            ImpactRole::Called => "called",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub role: ImpactRole,
    pub node: Node,
}

/// Result set of a graph query, tagged by operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum GraphFindings {
    Callers(Vec<Node>),
    Calls(Vec<Node>),
    Chain(Vec<ChainLink>),
    Impact(Vec<ImpactEntry>),
}

impl GraphFindings {
    fn empty(intent: GraphIntent) -> Self {
        match intent {
            GraphIntent::Callers => GraphFindings::Callers(Vec::new()),
            GraphIntent::Calls => GraphFindings::Calls(Vec::new()),
            GraphIntent::Chain => GraphFindings::Chain(Vec::new()),
            GraphIntent::Impact => GraphFindings::Impact(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            GraphFindings::Callers(nodes) | GraphFindings::Calls(nodes) => nodes.len(),
            GraphFindings::Chain(links) => links.len(),
            GraphFindings::Impact(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Answer to one graph query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAnswer {
    /// Function name the query was about
    pub function: String,
    pub intent: GraphIntent,
    /// Node the name resolved to, if any
    pub node: Option<Node>,
    pub findings: GraphFindings,
}

impl GraphAnswer {
    /// One line per finding, each carrying `file:line` provenance.
    pub fn facts(&self) -> Vec<String> {
        let Some(node) = &self.node else {
            return vec![format!("No function named '{}' in the code graph", self.function)];
        };

        let subject = format!("{} ({})", node.name, location(node));
        match &self.findings {
            GraphFindings::Callers(nodes) if nodes.is_empty() => {
                vec![format!("No callers of {subject}")]
            }
            GraphFindings::Calls(nodes) if nodes.is_empty() => {
                vec![format!("{subject} calls no indexed function")]
            }
            GraphFindings::Callers(nodes) => nodes
                .iter()
                .map(|caller| format!("{} ({}) calls {}", caller.name, location(caller), subject))
                .collect(),
            GraphFindings::Calls(nodes) => nodes
                .iter()
                .map(|callee| format!("{} calls {} ({})", subject, callee.name, location(callee)))
                .collect(),
            GraphFindings::Chain(links) if links.is_empty() => {
                vec![format!("{subject} starts no call chain")]
            }
            GraphFindings::Chain(links) => links
                .iter()
                .map(|link| format!("{} -> {}", link.from, link.to))
                .collect(),
            GraphFindings::Impact(entries) => entries
                .iter()
                .map(|entry| {
                    format!(
                        "[{}] {} ({})",
                        entry.role.as_str(),
                        entry.node.name,
                        location(&entry.node)
                    )
                })
                .collect(),
        }
    }
}

fn location(node: &Node) -> String {
    format!("{}:{}", node.file_path, node.line_number)
}

/// Resolves a function name and answers caller/callee/chain/impact queries
#[derive(Debug, Clone)]
pub struct GraphSearchEngine<'s> {
    store: &'s GraphStore,
    collection: Option<String>,
    chain_depth: usize,
}

impl<'s> GraphSearchEngine<'s> {
    pub fn new(store: &'s GraphStore) -> Self {
        Self {
            store,
            collection: None,
            chain_depth: DEFAULT_CHAIN_DEPTH,
        }
    }

    /// Restrict name resolution to one collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_chain_depth(mut self, depth: usize) -> Self {
        self.chain_depth = depth;
        self
    }

    pub fn chain_depth(&self) -> usize {
        self.chain_depth
    }

    /// First function node named exactly `name`, in insertion order.
    pub fn resolve(&self, name: &str) -> coderag_graph::Result<Option<Node>> {
        let mut matches =
            self.store
                .find_nodes_by_name(name, Some(NodeKind::Function), self.collection.as_deref())?;
        if matches.len() > 1 {
            log::debug!(
                "{} functions named '{}', using {}",
                matches.len(),
                name,
                matches[0].id
            );
        }
        Ok((!matches.is_empty()).then(|| matches.swap_remove(0)))
    }

    /// Answer `intent` for the function `name`. Unknown names give empty
    /// findings.
    pub fn run(&self, name: &str, intent: GraphIntent) -> coderag_graph::Result<GraphAnswer> {
        let Some(node) = self.resolve(name)? else {
            log::debug!("Function '{}' not found in the code graph", name);
            return Ok(GraphAnswer {
                function: name.to_string(),
                intent,
                node: None,
                findings: GraphFindings::empty(intent),
            });
        };

        let findings = match intent {
            GraphIntent::Callers => {
                GraphFindings::Callers(self.store.predecessors(&node.id, Some(Relation::Calls))?)
            }
            GraphIntent::Calls => {
                GraphFindings::Calls(self.store.successors(&node.id, Some(Relation::Calls))?)
            }
            GraphIntent::Chain => GraphFindings::Chain(self.chain(&node.id)?),
            GraphIntent::Impact => GraphFindings::Impact(self.impact(&node)?),
        };

        Ok(GraphAnswer {
            function: name.to_string(),
            intent,
            node: Some(node),
            findings,
        })
    }

    /// `run` with the intent read from the question text.
    pub fn search(&self, identifier: &str, text: &str) -> coderag_graph::Result<GraphAnswer> {
        self.run(identifier, GraphIntent::from_text(text))
    }

    fn chain(&self, start_id: &str) -> coderag_graph::Result<Vec<ChainLink>> {
        let mut links = Vec::new();
        for (source_id, target_id) in self.store.call_chain(start_id, self.chain_depth)? {
            links.push(ChainLink {
                from: self.display_name(&source_id)?,
                to: self.display_name(&target_id)?,
                source_id,
                target_id,
            });
        }
        Ok(links)
    }

    fn display_name(&self, id: &str) -> coderag_graph::Result<String> {
        Ok(self
            .store
            .get_node(id)?
            .map(|node| node.name)
            .unwrap_or_else(|| id.to_string()))
    }

    fn impact(&self, node: &Node) -> coderag_graph::Result<Vec<ImpactEntry>> {
        let mut entries = vec![ImpactEntry {
            role: ImpactRole::Target,
            node: node.clone(),
        }];
        entries.extend(
            self.store
                .predecessors(&node.id, Some(Relation::Calls))?
                .into_iter()
                .map(|caller| ImpactEntry {
                    role: ImpactRole::Caller,
                    node: caller,
                }),
        );
        entries.extend(
            self.store
                .successors(&node.id, Some(Relation::Calls))?
                .into_iter()
                .map(|called| ImpactEntry {
                    role: ImpactRole::Called,
                    node: called,
                }),
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderag_graph::Edge;
    use pretty_assertions::assert_eq;

    fn function(collection: &str, file: &str, name: &str, line: usize) -> Node {
        Node::new(
            format!("{collection}:{file}:{name}"),
            name,
            NodeKind::Function,
            file,
            line,
        )
        .with_collection(collection)
    }

    /// main -> load -> parse, plus report -> load
    fn seeded() -> GraphStore {
        let store = GraphStore::in_memory().unwrap();
        for (name, line) in [("main", 1), ("load", 10), ("parse", 20), ("report", 30)] {
            store.upsert_node(&function("c", "app.py", name, line)).unwrap();
        }
        for (from, to) in [("main", "load"), ("load", "parse"), ("report", "load")] {
            store
                .insert_edge(&Edge::new(
                    format!("c:app.py:{from}"),
                    format!("c:app.py:{to}"),
                    Relation::Calls,
                ))
                .unwrap();
        }
        store
            .insert_edge(&Edge::new("c:app.py:parse", "c:app.py:json_loads", Relation::Calls))
            .unwrap();
        store
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn intent_from_text() {
        assert_eq!(GraphIntent::from_text("Who calls load?"), GraphIntent::Callers);
        assert_eq!(GraphIntent::from_text("load is called by?"), GraphIntent::Callers);
        assert_eq!(GraphIntent::from_text("load calls what"), GraphIntent::Calls);
        assert_eq!(GraphIntent::from_text("what does load call?"), GraphIntent::Calls);
        assert_eq!(GraphIntent::from_text("show the flow from main"), GraphIntent::Chain);
        assert_eq!(
            GraphIntent::from_text("which helpers does main invoke"),
            GraphIntent::Calls
        );
        assert_eq!(
            GraphIntent::from_text("what does the overflow guard affect"),
            GraphIntent::Impact
        );
        assert_eq!(GraphIntent::from_text("what breaks if load changes"), GraphIntent::Impact);
    }

    #[test]
    fn callers_and_calls() {
        let store = seeded();
        let engine = GraphSearchEngine::new(&store);

        let answer = engine.run("load", GraphIntent::Callers).unwrap();
        let GraphFindings::Callers(callers) = &answer.findings else {
            panic!("expected callers, got {:?}", answer.findings);
        };
        assert_eq!(names(callers), vec!["main", "report"]);

        let answer = engine.search("parse", "what does parse call?").unwrap();
        // dangling json_loads target is not a stored node
        assert_eq!(answer.findings, GraphFindings::Calls(Vec::new()));
    }

    #[test]
    fn chain_resolves_names_and_keeps_dangling_ids() {
        let store = seeded();
        let answer = GraphSearchEngine::new(&store)
            .run("main", GraphIntent::Chain)
            .unwrap();

        let GraphFindings::Chain(links) = answer.findings else {
            panic!("expected chain");
        };
        let pairs: Vec<_> = links.iter().map(|l| (l.from.as_str(), l.to.as_str())).collect();
        assert_eq!(
            pairs,
            vec![("main", "load"), ("load", "parse"), ("parse", "c:app.py:json_loads")]
        );
    }

    #[test]
    fn chain_depth_is_configurable() {
        let store = seeded();
        let answer = GraphSearchEngine::new(&store)
            .with_chain_depth(1)
            .run("main", GraphIntent::Chain)
            .unwrap();
        assert_eq!(answer.findings.len(), 1);
    }

    #[test]
    fn impact_lists_self_callers_and_callees() {
        let store = seeded();
        let answer = GraphSearchEngine::new(&store)
            .search("load", "what breaks if I change load")
            .unwrap();

        let GraphFindings::Impact(entries) = &answer.findings else {
            panic!("expected impact");
        };
        let roles: Vec<_> = entries
            .iter()
            .map(|e| (e.role.as_str(), e.node.name.as_str()))
            .collect();
        assert_eq!(
            roles,
            vec![
                ("self", "load"),
                ("caller", "main"),
                ("caller", "report"),
                ("called", "parse"),
            ]
        );
        assert_eq!(answer.facts()[0], "[self] load (app.py:10)");
    }

    #[test]
    fn unknown_function_is_empty_not_an_error() {
        let store = seeded();
        let answer = GraphSearchEngine::new(&store)
            .run("missing", GraphIntent::Impact)
            .unwrap();
        assert!(answer.node.is_none());
        assert!(answer.findings.is_empty());
        assert_eq!(
            answer.facts(),
            vec!["No function named 'missing' in the code graph".to_string()]
        );
    }

    #[test]
    fn collection_scope_and_first_match() {
        let store = seeded();
        store.upsert_node(&function("c", "other.py", "load", 5)).unwrap();
        store.upsert_node(&function("d", "app.py", "solo", 1)).unwrap();

        let engine = GraphSearchEngine::new(&store).with_collection("c");
        let resolved = engine.resolve("load").unwrap().unwrap();
        assert_eq!(resolved.id, "c:app.py:load");
        assert!(engine.resolve("solo").unwrap().is_none());
    }
}

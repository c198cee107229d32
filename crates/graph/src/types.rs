use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metadata key that tags a node or edge with its collection.
pub const COLLECTION_KEY: &str = "collection";

/// Free-form string tags attached to nodes and edges.
pub type Metadata = BTreeMap<String, String>;

/// Kind of definition site stored as a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Function,
    Class,
}

impl NodeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Class => "class",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(NodeKind::Function),
            "class" => Ok(NodeKind::Class),
            other => Err(other.to_string()),
        }
    }
}

/// Type of relationship between two graph identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// A calls B (function call)
    Calls,

    /// A imports B (import statement)
    Imports,
}

impl Relation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Relation::Calls => "calls",
            Relation::Imports => "imports",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calls" => Ok(Relation::Calls),
            "imports" => Ok(Relation::Imports),
            other => Err(other.to_string()),
        }
    }
}

/// Function or class definition site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id, conventionally `{collection}:{file}:{name}`
    pub id: String,

    pub name: String,

    pub kind: NodeKind,

    pub file_path: String,

    /// 1-based line of the definition
    pub line_number: usize,

    /// Rendered signature (functions only), e.g. `def run(self, path)`
    pub signature: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
        file_path: impl Into<String>,
        line_number: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            file_path: file_path.into(),
            line_number,
            signature: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.metadata
            .insert(COLLECTION_KEY.to_string(), collection.into());
        self
    }

    pub fn collection(&self) -> Option<&str> {
        self.metadata.get(COLLECTION_KEY).map(String::as_str)
    }
}

/// Directed relation between two graph identifiers
///
/// `target_id` does not have to name a stored node: call targets are
/// resolved by bare name and may point at library or dynamic names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relation: Relation,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Edge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, relation: Relation) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation,
            metadata: Metadata::new(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.metadata
            .insert(COLLECTION_KEY.to_string(), collection.into());
        self
    }

    pub fn collection(&self) -> Option<&str> {
        self.metadata.get(COLLECTION_KEY).map(String::as_str)
    }
}

/// Aggregate counts over the stored graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_relation: BTreeMap<String, usize>,
}

/// Build a collection-qualified id: `{collection}:{local}`.
pub fn scoped_id(collection: &str, local: &str) -> String {
    format!("{collection}:{local}")
}

/// Build a file-scoped id: `{file}:{name}`.
pub fn file_scoped_id(file: &str, name: &str) -> String {
    format!("{file}:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_relations_round_trip_through_strings() {
        for kind in [NodeKind::Function, NodeKind::Class] {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        for relation in [Relation::Calls, Relation::Imports] {
            assert_eq!(relation.as_str().parse::<Relation>().unwrap(), relation);
        }
        assert!("module".parse::<NodeKind>().is_err());
    }

    #[test]
    fn collection_tag_lives_in_metadata() {
        let node = Node::new("x:a.py:run", "run", NodeKind::Function, "a.py", 3).with_collection("x");
        assert_eq!(node.collection(), Some("x"));
        assert_eq!(node.metadata.get(COLLECTION_KEY).map(String::as_str), Some("x"));

        let edge = Edge::new("x:a.py:run", "x:a.py:helper", Relation::Calls);
        assert_eq!(edge.collection(), None);
    }
}

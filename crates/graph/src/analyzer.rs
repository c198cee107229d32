//! Static call/import extraction over the tree-sitter Python grammar.

use crate::error::{GraphError, Result};
use crate::types::{file_scoped_id, Node, NodeKind, Relation};
use std::path::Path;
use tree_sitter::Parser;

/// File extensions handled by [`SourceAnalyzer`]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["py", "pyw"];

/// Relation found in one file, before collection scoping
///
/// `source` is a file-scoped id (`{file}:{name}`) for calls and the file
/// path itself for imports. `target` is the bare callee name or the dotted
/// import path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEdge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
}

impl ExtractedEdge {
    fn new(source: impl Into<String>, target: impl Into<String>, relation: Relation) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation,
        }
    }
}

/// Definitions and relations extracted from a single file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileGraph {
    /// Definition sites keyed `{file}:{name}`
    pub nodes: Vec<Node>,
    pub edges: Vec<ExtractedEdge>,
}

impl FileGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Parses source text and extracts definitions, calls and imports
pub struct SourceAnalyzer {
    parser: Parser,
}

impl SourceAnalyzer {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| GraphError::Parser(format!("Failed to set language: {}", e)))?;
        Ok(Self { parser })
    }

    /// Whether `path` has an extension this analyzer understands.
    pub fn supports(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
    }

    /// Analyze one file. Source with syntax errors yields an empty graph.
    pub fn analyze(&mut self, file_path: &str, source: &str) -> FileGraph {
        self.try_analyze(file_path, source).unwrap_or_else(|err| {
            log::warn!("Skipping {}", err);
            FileGraph::default()
        })
    }

    /// Like [`analyze`](Self::analyze), but reports unparsable source as
    /// [`GraphError::Syntax`].
    pub fn try_analyze(&mut self, file_path: &str, source: &str) -> Result<FileGraph> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| GraphError::Syntax(file_path.to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(GraphError::Syntax(file_path.to_string()));
        }

        let mut visitor = ScopeVisitor::new(file_path, source.as_bytes());
        visitor.visit(root);

        log::debug!(
            "Analyzed {}: {} definitions, {} relations",
            file_path,
            visitor.graph.nodes.len(),
            visitor.graph.edges.len()
        );
        Ok(visitor.graph)
    }
}

impl std::fmt::Debug for SourceAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAnalyzer").finish_non_exhaustive()
    }
}

/// Depth-first walk keeping an explicit stack of enclosing definitions
struct ScopeVisitor<'a> {
    file: &'a str,
    source: &'a [u8],
    /// Enclosing definitions, innermost last
    scope: Vec<(NodeKind, String)>,
    graph: FileGraph,
}

impl<'a> ScopeVisitor<'a> {
    fn new(file: &'a str, source: &'a [u8]) -> Self {
        Self {
            file,
            source,
            scope: Vec::new(),
            graph: FileGraph::default(),
        }
    }

    fn text(&self, node: tree_sitter::Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    fn visit(&mut self, node: tree_sitter::Node) {
        match node.kind() {
            "function_definition" => self.visit_definition(node, NodeKind::Function, None),
            "class_definition" => self.visit_definition(node, NodeKind::Class, None),
            "decorated_definition" => self.visit_decorated(node),
            "call" => {
                self.record_call(node);
                self.visit_children(node);
            }
            "import_statement" => self.record_import(node),
            "import_from_statement" => self.record_import_from(node),
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: tree_sitter::Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    /// Decorators sit outside the wrapped definition; their calls belong to it.
    fn visit_decorated(&mut self, node: tree_sitter::Node) {
        let definition = node.child_by_field_name("definition");
        match definition.map(|d| (d, d.kind())) {
            Some((d, "function_definition")) => {
                self.visit_definition(d, NodeKind::Function, Some(node))
            }
            Some((d, "class_definition")) => self.visit_definition(d, NodeKind::Class, Some(node)),
            _ => self.visit_children(node),
        }
    }

    fn visit_definition(
        &mut self,
        node: tree_sitter::Node,
        kind: NodeKind,
        decorated: Option<tree_sitter::Node>,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            if let Some(decorated) = decorated {
                self.visit_children(decorated);
            } else {
                self.visit_children(node);
            }
            return;
        };
        let name = self.text(name_node).to_string();
        let line = node.start_position().row + 1;

        let mut definition = Node::new(
            file_scoped_id(self.file, &name),
            name.clone(),
            kind,
            self.file,
            line,
        );
        if kind == NodeKind::Function {
            definition = definition.with_signature(self.signature(node, &name));
        }
        self.graph.nodes.push(definition);

        self.scope.push((kind, name));
        if let Some(decorated) = decorated {
            let mut cursor = decorated.walk();
            for decorator in decorated.children(&mut cursor) {
                if decorator.kind() == "decorator" {
                    self.visit(decorator);
                }
            }
        }
        self.visit_children(node);
        self.scope.pop();
    }

    /// `def name(p1, p2)` over positional parameters, stopping at the first
    /// star separator or splat.
    fn signature(&self, node: tree_sitter::Node, name: &str) -> String {
        let mut params: Vec<&str> = Vec::new();

        if let Some(parameters) = node.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            for param in parameters.named_children(&mut cursor) {
                let ident = match param.kind() {
                    "identifier" => Some(param),
                    "typed_parameter" => param.named_child(0),
                    "default_parameter" | "typed_default_parameter" => {
                        param.child_by_field_name("name")
                    }
                    "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => {
                        break
                    }
                    _ => None,
                };
                match ident {
                    Some(ident) if ident.kind() == "identifier" => params.push(self.text(ident)),
                    // `*args: T` and `**kw: T` are typed splats
                    Some(ident)
                        if matches!(
                            ident.kind(),
                            "list_splat_pattern" | "dictionary_splat_pattern"
                        ) =>
                    {
                        break
                    }
                    _ => {}
                }
            }
        }

        format!("def {}({})", name, params.join(", "))
    }

    fn record_call(&mut self, node: tree_sitter::Node) {
        let Some((_, enclosing)) = self.scope.last() else {
            return;
        };
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };

        let target = match callee.kind() {
            "identifier" => self.text(callee),
            "attribute" => match callee.child_by_field_name("attribute") {
                Some(member) => self.text(member),
                None => return,
            },
            _ => return,
        };
        if target.is_empty() || enclosing == target {
            return;
        }

        let source = file_scoped_id(self.file, enclosing);
        self.graph
            .edges
            .push(ExtractedEdge::new(source, target, Relation::Calls));
    }

    fn record_import(&mut self, node: tree_sitter::Node) {
        let mut cursor = node.walk();
        let names: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|name| self.imported_name(name))
            .collect();
        for name in names {
            self.push_import(name);
        }
    }

    fn record_import_from(&mut self, node: tree_sitter::Node) {
        let module = node
            .child_by_field_name("module_name")
            .map(|module| self.module_path(module))
            .unwrap_or_default();
        let qualify = |name: &str| {
            if module.is_empty() {
                name.to_string()
            } else {
                format!("{module}.{name}")
            }
        };

        let mut cursor = node.walk();
        let mut targets: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|name| self.imported_name(name))
            .map(|name| qualify(&name))
            .collect();

        let mut cursor = node.walk();
        if node
            .children(&mut cursor)
            .any(|child| child.kind() == "wildcard_import")
        {
            targets.push(qualify("*"));
        }

        for target in targets {
            self.push_import(target);
        }
    }

    /// Dotted module path with relative-import dots stripped.
    fn module_path(&self, module: tree_sitter::Node) -> String {
        match module.kind() {
            "relative_import" => {
                let mut cursor = module.walk();
                let dotted = module
                    .named_children(&mut cursor)
                    .find(|child| child.kind() == "dotted_name");
                dotted
                    .map(|dotted| self.text(dotted).to_string())
                    .unwrap_or_default()
            }
            _ => self.text(module).to_string(),
        }
    }

    /// Name introduced by an import clause; aliases resolve to the imported name.
    fn imported_name(&self, node: tree_sitter::Node) -> Option<String> {
        let name = match node.kind() {
            "aliased_import" => node.child_by_field_name("name")?,
            _ => node,
        };
        let text = self.text(name);
        (!text.is_empty()).then(|| text.to_string())
    }

    fn push_import(&mut self, target: String) {
        self.graph
            .edges
            .push(ExtractedEdge::new(self.file, target, Relation::Imports));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn analyze(source: &str) -> FileGraph {
        SourceAnalyzer::new().unwrap().analyze("pkg/app.py", source)
    }

    fn calls(graph: &FileGraph) -> Vec<(String, String)> {
        graph
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Calls)
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect()
    }

    fn imports(graph: &FileGraph) -> Vec<String> {
        graph
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Imports)
            .map(|e| e.target.clone())
            .collect()
    }

    #[test]
    fn calls_are_attributed_to_innermost_scope() {
        let graph = analyze(
            "def outer():\n    helper()\n    def inner():\n        deep()\n    tail()\n",
        );
        assert_eq!(
            calls(&graph),
            vec![
                ("pkg/app.py:outer".to_string(), "helper".to_string()),
                ("pkg/app.py:inner".to_string(), "deep".to_string()),
                ("pkg/app.py:outer".to_string(), "tail".to_string()),
            ]
        );
    }

    #[test]
    fn decorator_calls_belong_to_the_decorated_definition() {
        let graph = analyze(
            "class S:\n    @cache(size())\n    def run(self):\n        work()\n\n@route('/')\ndef handler():\n    pass\n",
        );
        assert_eq!(
            calls(&graph),
            vec![
                ("pkg/app.py:run".to_string(), "cache".to_string()),
                ("pkg/app.py:run".to_string(), "size".to_string()),
                ("pkg/app.py:run".to_string(), "work".to_string()),
                ("pkg/app.py:handler".to_string(), "route".to_string()),
            ]
        );

        let lines: Vec<_> = graph
            .nodes
            .iter()
            .map(|n| (n.name.as_str(), n.line_number))
            .collect();
        assert_eq!(lines, vec![("S", 1), ("run", 3), ("handler", 7)]);
    }

    #[test]
    fn module_level_calls_are_not_recorded() {
        let graph = analyze("setup()\n\ndef main():\n    run()\n\nmain()\n");
        assert_eq!(
            calls(&graph),
            vec![("pkg/app.py:main".to_string(), "run".to_string())]
        );
    }

    #[test]
    fn methods_and_classes_become_nodes() {
        let graph = analyze(
            "class Service:\n    def start(self, port):\n        self.bind(port)\n\n    async def stop(self):\n        pass\n",
        );
        let names: Vec<_> = graph
            .nodes
            .iter()
            .map(|n| (n.name.as_str(), n.kind, n.line_number))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Service", NodeKind::Class, 1),
                ("start", NodeKind::Function, 2),
                ("stop", NodeKind::Function, 5),
            ]
        );
        assert_eq!(graph.nodes[0].signature, None);
        assert_eq!(graph.nodes[0].id, "pkg/app.py:Service");
        assert_eq!(
            calls(&graph),
            vec![("pkg/app.py:start".to_string(), "bind".to_string())]
        );
    }

    #[test]
    fn signatures_list_positional_parameters_only() {
        let graph = analyze(
            "def f(a, b: int, c=1, d: str = 'x', *args, e, **kw):\n    pass\n\
             def g(a, *, b):\n    pass\n\
             def h():\n    pass\n",
        );
        let signatures: Vec<_> = graph
            .nodes
            .iter()
            .map(|n| n.signature.clone().unwrap_or_default())
            .collect();
        assert_eq!(
            signatures,
            vec!["def f(a, b, c, d)", "def g(a)", "def h()"]
        );
    }

    #[test]
    fn recursive_calls_are_dropped() {
        let graph = analyze("def walk(n):\n    return walk(n - 1) + step(n)\n");
        assert_eq!(
            calls(&graph),
            vec![("pkg/app.py:walk".to_string(), "step".to_string())]
        );
    }

    #[test]
    fn complex_callees_are_traversed_without_edges() {
        let graph = analyze("def f():\n    handlers[0](inner())\n    make()()\n");
        assert_eq!(
            calls(&graph),
            vec![
                ("pkg/app.py:f".to_string(), "inner".to_string()),
                ("pkg/app.py:f".to_string(), "make".to_string()),
            ]
        );
    }

    #[test]
    fn import_forms_render_dotted_targets() {
        let graph = analyze(
            "import os, a.b as ab\n\
             from m import s, t as u\n\
             from . import sibling\n\
             from .pkg import thing\n\
             from star import *\n",
        );
        assert_eq!(
            imports(&graph),
            vec!["os", "a.b", "m.s", "m.t", "sibling", "pkg.thing", "star.*"]
        );
        assert!(graph.edges.iter().all(|e| e.source == "pkg/app.py"));
    }

    #[test]
    fn syntax_errors_yield_empty_graph() {
        let mut analyzer = SourceAnalyzer::new().unwrap();
        let source = "def ok():\n    run()\n\ndef broken(:\n    pass\n";

        assert!(analyzer.analyze("bad.py", source).is_empty());
        assert!(matches!(
            analyzer.try_analyze("bad.py", source),
            Err(GraphError::Syntax(file)) if file == "bad.py"
        ));
    }

    #[test]
    fn supports_python_extensions() {
        assert!(SourceAnalyzer::supports(Path::new("a/b.py")));
        assert!(SourceAnalyzer::supports(Path::new("tool.pyw")));
        assert!(!SourceAnalyzer::supports(Path::new("lib.rs")));
        assert!(!SourceAnalyzer::supports(Path::new("Makefile")));
    }
}

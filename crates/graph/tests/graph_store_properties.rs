use coderag_graph::{Edge, GraphStore, Node, NodeKind, Relation};
use pretty_assertions::assert_eq;

fn store() -> GraphStore {
    GraphStore::in_memory().expect("in-memory store")
}

fn function(id: &str, name: &str) -> Node {
    Node::new(id, name, NodeKind::Function, "app.py", 1)
}

fn calls(store: &GraphStore, source: &str, target: &str) {
    store
        .insert_edge(&Edge::new(source, target, Relation::Calls))
        .expect("insert edge");
}

fn names(nodes: Vec<Node>) -> Vec<String> {
    nodes.into_iter().map(|n| n.name).collect()
}

#[test]
fn node_round_trips_every_field() {
    let store = store();
    let node = Node::new("repo:pkg/app.py:run", "run", NodeKind::Function, "pkg/app.py", 42)
        .with_signature("def run(self, path)")
        .with_collection("repo");

    store.upsert_node(&node).expect("upsert");

    let loaded = store.get_node(&node.id).expect("get").expect("node present");
    assert_eq!(loaded, node);
    assert!(store.get_node("repo:pkg/app.py:missing").expect("get").is_none());
}

#[test]
fn duplicate_edges_are_silent_no_ops() {
    let store = store();
    let edge = Edge::new("a", "b", Relation::Calls).with_collection("repo");

    assert!(store.insert_edge(&edge).expect("first insert"));
    assert!(!store.insert_edge(&edge).expect("second insert"));
    assert!(store
        .insert_edge(&Edge::new("a", "b", Relation::Imports))
        .expect("other relation"));

    let stats = store.stats().expect("stats");
    assert_eq!(stats.edge_count, 2);
    assert_eq!(stats.edges_by_relation.get("calls"), Some(&1));
    assert_eq!(stats.edges_by_relation.get("imports"), Some(&1));
}

#[test]
fn successors_and_predecessors_are_symmetric() {
    let store = store();
    for (id, name) in [("a", "alpha"), ("b", "beta"), ("c", "gamma")] {
        store.upsert_node(&function(id, name)).expect("upsert");
    }
    calls(&store, "a", "b");
    calls(&store, "a", "c");
    calls(&store, "c", "b");

    for node in ["a", "b", "c"] {
        for successor in store.successors(node, Some(Relation::Calls)).expect("successors") {
            let back = store
                .predecessors(&successor.id, Some(Relation::Calls))
                .expect("predecessors");
            assert!(
                back.iter().any(|p| p.id == node),
                "{} missing from predecessors of {}",
                node,
                successor.id
            );
        }
    }

    assert_eq!(
        names(store.predecessors("b", Some(Relation::Calls)).expect("predecessors")),
        vec!["alpha", "gamma"]
    );
}

#[test]
fn call_chain_follows_a_to_b_to_c() {
    let store = store();
    calls(&store, "A", "B");
    calls(&store, "B", "C");

    assert_eq!(
        store.call_chain("A", 5).expect("chain"),
        vec![
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "C".to_string()),
        ]
    );
    assert_eq!(
        store.call_chain("A", 1).expect("chain"),
        vec![("A".to_string(), "B".to_string())]
    );
    assert!(store.call_chain("A", 0).expect("chain").is_empty());
}

#[test]
fn call_chain_expands_each_node_once() {
    let store = store();
    calls(&store, "A", "B");
    calls(&store, "B", "A");
    calls(&store, "A", "C");
    calls(&store, "C", "B");

    let chain = store.call_chain("A", 10).expect("chain");

    // A, B and C are each expanded exactly once.
    assert_eq!(
        chain,
        vec![
            ("A".to_string(), "B".to_string()),
            ("A".to_string(), "C".to_string()),
            ("B".to_string(), "A".to_string()),
            ("C".to_string(), "B".to_string()),
        ]
    );
}

#[test]
fn call_chain_ignores_import_edges() {
    let store = store();
    store
        .insert_edge(&Edge::new("A", "os", Relation::Imports))
        .expect("insert");
    assert!(store.call_chain("A", 3).expect("chain").is_empty());
}

#[test]
fn clear_scope_leaves_other_collections_untouched() {
    let store = store();
    for collection in ["left", "right"] {
        let caller = format!("{collection}:app.py:main");
        let callee = format!("{collection}:app.py:helper");
        store
            .upsert_node(&function(&caller, "main").with_collection(collection))
            .expect("upsert");
        store
            .upsert_node(&function(&callee, "helper").with_collection(collection))
            .expect("upsert");
        store
            .insert_edge(&Edge::new(&caller, &callee, Relation::Calls).with_collection(collection))
            .expect("insert");
    }

    let cleared = store.clear_scope("left").expect("clear scope");
    assert_eq!((cleared.nodes, cleared.edges), (2, 1));

    assert_eq!(store.stats_for("left").expect("stats").node_count, 0);
    let right = store.stats_for("right").expect("stats");
    assert_eq!((right.node_count, right.edge_count), (2, 1));
    assert_eq!(right.nodes_by_kind.get("function"), Some(&2));
    assert_eq!(
        names(
            store
                .successors("right:app.py:main", None)
                .expect("successors")
        ),
        vec!["helper"]
    );
}

#[test]
fn find_nodes_by_name_respects_kind_and_collection() {
    let store = store();
    store
        .upsert_node(&function("x:a.py:run", "run").with_collection("x"))
        .expect("upsert");
    store
        .upsert_node(&function("y:a.py:run", "run").with_collection("y"))
        .expect("upsert");
    store
        .upsert_node(&Node::new("x:b.py:run", "run", NodeKind::Class, "b.py", 1).with_collection("x"))
        .expect("upsert");

    let ids = |nodes: Vec<Node>| nodes.into_iter().map(|n| n.id).collect::<Vec<_>>();
    assert_eq!(
        ids(store.find_nodes_by_name("run", None, None).expect("find")),
        vec!["x:a.py:run", "y:a.py:run", "x:b.py:run"]
    );
    assert_eq!(
        ids(store
            .find_nodes_by_name("run", Some(NodeKind::Function), Some("x"))
            .expect("find")),
        vec!["x:a.py:run"]
    );
}

#[test]
fn clearing_one_collection_keeps_the_other_run() {
    let store = store();
    for collection in ["x", "y"] {
        store
            .upsert_node(&function(&format!("{collection}:main.py:run"), "run").with_collection(collection))
            .expect("upsert");
    }

    store.clear_scope("x").expect("clear scope");

    let remaining: Vec<_> = store
        .list_nodes(None)
        .expect("list")
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(remaining, vec!["y:main.py:run"]);
}

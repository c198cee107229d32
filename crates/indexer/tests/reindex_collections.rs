use coderag_graph::{GraphStore, NodeKind};
use coderag_indexer::{num_files_key, CodeGraphIndexer, IndexerError};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn repo(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    for (rel, content) in files {
        let path = temp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, content).expect("write file");
    }
    temp
}

#[test]
fn reindexing_replaces_the_collection() {
    let temp = repo(&[(
        "app.py",
        "def old():\n    gone()\n\ndef gone():\n    pass\n",
    )]);
    let store = GraphStore::in_memory().expect("store");
    let indexer = CodeGraphIndexer::new(&store);

    indexer.index(temp.path(), "repo").expect("first index");
    assert!(store.get_node("repo:app.py:old").expect("get").is_some());

    fs::write(temp.path().join("app.py"), "def fresh():\n    pass\n").expect("rewrite");
    let stats = indexer.index(temp.path(), "repo").expect("second index");

    assert_eq!((stats.files, stats.nodes, stats.edges), (1, 1, 0));
    assert!(store.get_node("repo:app.py:old").expect("get").is_none());
    let stored = store.stats_for("repo").expect("stats");
    assert_eq!((stored.node_count, stored.edge_count), (1, 0));
}

#[test]
fn collections_do_not_observe_each_other() {
    let left = repo(&[("svc.py", "def run():\n    step()\n\ndef step():\n    pass\n")]);
    let right = repo(&[
        ("svc.py", "def run():\n    other()\n"),
        ("lib/other.py", "def other():\n    pass\n"),
    ]);
    let store = GraphStore::in_memory().expect("store");
    let indexer = CodeGraphIndexer::new(&store);

    indexer.index(left.path(), "left").expect("index left");
    indexer.index(right.path(), "right").expect("index right");
    indexer.index(left.path(), "left").expect("reindex left");

    let right_stats = store.stats_for("right").expect("stats");
    assert_eq!((right_stats.node_count, right_stats.edge_count), (2, 1));
    assert_eq!(
        store
            .get_meta(&num_files_key("right"))
            .expect("meta")
            .as_deref(),
        Some("2")
    );

    let runs = store
        .find_nodes_by_name("run", Some(NodeKind::Function), None)
        .expect("find");
    let mut ids: Vec<_> = runs.into_iter().map(|n| n.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["left:svc.py:run", "right:svc.py:run"]);

    assert_eq!(
        store.call_chain("right:svc.py:run", 3).expect("chain"),
        vec![(
            "right:svc.py:run".to_string(),
            "right:lib/other.py:other".to_string()
        )]
    );
}

#[test]
fn missing_repository_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let store = GraphStore::in_memory().expect("store");

    let err = CodeGraphIndexer::new(&store)
        .index(temp.path().join("nope"), "repo")
        .expect_err("missing path");

    assert!(matches!(err, IndexerError::InvalidPath(_)));
}

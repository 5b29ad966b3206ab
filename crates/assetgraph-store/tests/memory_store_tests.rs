use anyhow::Result;
use assetgraph_store::{
    dump, replicate, ApplyOptions, Batch, GraphStore, Literal, MemoryStore, StoreError, Term,
    Triple,
};
use chrono::Utc;
use proptest::prelude::*;
use tempfile::tempdir;

fn seeded() -> Result<MemoryStore> {
    let mut store = MemoryStore::new("seeded");
    let mut batch = Batch::new();
    batch.insert(Triple::node_type("www.example.com", "fqdn"));
    batch.insert(Triple::node_type("example.com", "fqdn"));
    batch.insert(Triple::node_type("192.0.2.1", "ipaddr"));
    batch.insert(Triple::edge("www.example.com", "root", "example.com"));
    batch.insert(Triple::edge("www.example.com", "a_record", "192.0.2.1"));
    batch.insert(Triple::property("www.example.com", "note", "seen"));
    store.apply(batch, ApplyOptions::graph_write())?;
    Ok(store)
}

#[test]
fn nodes_exist_only_through_type_facts() -> Result<()> {
    let store = seeded()?;

    assert!(store.has_node("www.example.com", None));
    assert!(store.has_node("www.example.com", Some("fqdn")));
    assert!(!store.has_node("www.example.com", Some("ipaddr")));
    assert!(!store.has_node("note", None));
    assert_eq!(store.node_types("192.0.2.1"), vec!["ipaddr".to_string()]);
    Ok(())
}

#[test]
fn neighbour_enumeration_filters_by_predicate() -> Result<()> {
    let store = seeded()?;

    let out = store.out_facts("www.example.com", &["a_record", "root"]);
    assert_eq!(
        out,
        vec![
            ("a_record".to_string(), Term::node("192.0.2.1")),
            ("root".to_string(), Term::node("example.com")),
        ]
    );

    let all = store.out_facts("www.example.com", &[]);
    assert_eq!(all.len(), 4);

    let incoming = store.in_facts("example.com", &[]);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].1.as_str(), "www.example.com");

    let fqdns = store.subjects_with("type", &Term::literal("fqdn"));
    assert_eq!(fqdns.len(), 2);
    Ok(())
}

#[test]
fn dangling_references_fail_the_whole_batch() -> Result<()> {
    let mut store = seeded()?;
    let before = store.len();

    let mut batch = Batch::new();
    batch.insert(Triple::property("example.com", "note", "fine"));
    batch.insert(Triple::edge("example.com", "ns_record", "ns1.example.net"));

    let err = store
        .apply(batch, ApplyOptions::graph_write())
        .expect_err("edge into an absent node must fail");
    assert!(matches!(err, StoreError::DanglingReference { .. }));
    assert_eq!(store.len(), before, "no partial application");
    Ok(())
}

#[test]
fn strict_mode_rejects_duplicates_and_missing_removals() -> Result<()> {
    let mut store = seeded()?;

    let mut dup = Batch::new();
    dup.insert(Triple::edge("www.example.com", "root", "example.com"));
    assert!(matches!(
        store.apply(dup.clone(), ApplyOptions::strict()),
        Err(StoreError::Duplicate { .. })
    ));
    assert_eq!(store.apply(dup, ApplyOptions::graph_write())?, 0);

    let mut missing = Batch::new();
    missing.remove(Triple::property("example.com", "note", "never"));
    assert!(matches!(
        store.apply(missing.clone(), ApplyOptions::strict()),
        Err(StoreError::Missing { .. })
    ));
    assert_eq!(store.apply(missing, ApplyOptions::graph_write())?, 0);
    Ok(())
}

#[test]
fn replication_skips_facts_without_nodes_on_target() -> Result<()> {
    let source = seeded()?;
    let mut target = MemoryStore::new("target");

    let facts: Vec<Triple> = source
        .triples()
        .into_iter()
        .filter(|t| t.subject.as_str() != "192.0.2.1")
        .collect();
    let written = replicate(&mut target, facts)?;

    assert_eq!(written, 4);
    assert!(!target.has_node("192.0.2.1", None));
    assert!(!target.has_triple(&Triple::edge("www.example.com", "a_record", "192.0.2.1")));
    assert!(target.has_triple(&Triple::edge("www.example.com", "root", "example.com")));

    assert!(matches!(
        replicate(&mut target, Vec::new()),
        Err(StoreError::Empty(_))
    ));
    Ok(())
}

#[test]
fn snapshot_round_trip_preserves_facts() -> Result<()> {
    let mut store = seeded()?;
    let stamp = Utc::now();
    let mut batch = Batch::new();
    batch.insert(Triple::property("example.com", "seen_at", stamp));
    store.apply(batch, ApplyOptions::graph_write())?;

    let dir = tempdir()?;
    let path = dir.path().join("graph.snapshot");
    store.save(&path)?;

    let loaded = MemoryStore::open(&path)?;
    assert_eq!(loaded.name(), "seeded");
    assert_eq!(loaded.triples(), store.triples());
    assert!(loaded.has_triple(&Triple::new(
        "example.com",
        "seen_at",
        Term::Literal(Literal::Time(stamp))
    )));
    Ok(())
}

#[test]
fn dump_is_empty_for_an_empty_store() -> Result<()> {
    assert_eq!(dump(&MemoryStore::default()), "");
    let text = dump(&seeded()?);
    assert_eq!(text.lines().count(), 6);
    assert!(text.contains("<www.example.com> <a_record> <192.0.2.1> ."));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn repeated_inserts_keep_set_semantics(ids in prop::collection::vec("[a-z]{1,6}", 1..12)) {
        let mut store = MemoryStore::default();
        for _ in 0..2 {
            let batch: Batch = ids.iter().map(|id| Triple::node_type(id.as_str(), "fqdn")).collect();
            store.apply(batch, ApplyOptions::graph_write()).unwrap();
        }
        let mut distinct = ids.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(store.len(), distinct.len());
    }
}

//! Unit tests for the graph operations

use super::*;
use anyhow::Result;
use chrono::{Duration, Utc};
use tempfile::tempdir;

fn ids(nodes: &[NodeId]) -> Vec<&str> {
    nodes.iter().map(NodeId::as_str).collect()
}

// ============================================================================
// Nodes, edges, properties
// ============================================================================

#[test]
fn test_upsert_node_is_idempotent() -> Result<()> {
    let graph = Graph::default();

    let first = graph.upsert_node("www.example.com", NodeType::Fqdn)?;
    let second = graph.upsert_node("www.example.com", NodeType::Fqdn)?;
    assert_eq!(first, second);
    assert_eq!(graph.fact_count(), 1);

    let node = graph.read_node("www.example.com", "fqdn")?;
    assert_eq!(node.id(), "www.example.com");
    Ok(())
}

#[test]
fn test_upsert_node_rejects_empty_arguments() {
    let graph = Graph::default();

    assert!(graph.upsert_node("", NodeType::Fqdn).unwrap_err().is_invalid_argument());
    assert!(graph.upsert_node("x", "").unwrap_err().is_invalid_argument());
    assert_eq!(graph.fact_count(), 0);
}

#[test]
fn test_read_node_requires_matching_type() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("192.0.2.1", NodeType::IpAddr)?;

    assert!(graph.read_node("192.0.2.1", NodeType::Fqdn).unwrap_err().is_not_found());
    assert!(graph.read_node("192.0.2.2", NodeType::IpAddr).unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test_edge_requires_both_endpoints() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("www.example.com", NodeType::Fqdn)?;

    let edge = Edge::new("a_record", "www.example.com", "192.0.2.1");
    assert!(graph.upsert_edge(&edge).unwrap_err().is_not_found());

    graph.upsert_node("192.0.2.1", NodeType::IpAddr)?;
    graph.upsert_edge(&edge)?;
    graph.upsert_edge(&edge)?;
    assert_eq!(graph.count_out_edges("www.example.com", &[])?, 1);
    assert_eq!(graph.read_in_edges("192.0.2.1", &["a_record"])?, vec![edge]);

    let empty = Edge::new("", "www.example.com", "192.0.2.1");
    assert!(graph.upsert_edge(&empty).unwrap_err().is_invalid_argument());
    Ok(())
}

#[test]
fn test_edge_reads_distinguish_missing_from_empty() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("lonely.example.com", NodeType::Fqdn)?;

    let err = graph.read_out_edges("lonely.example.com", &[]).unwrap_err();
    assert!(err.is_empty_result());
    assert!(graph.count_edges("lonely.example.com", &[]).unwrap_err().is_empty_result());

    let err = graph.read_in_edges("absent.example.com", &[]).unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[test]
fn test_properties_are_multi_valued() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("example.com", NodeType::Fqdn)?;

    graph.upsert_property("example.com", "note", "first")?;
    graph.upsert_property("example.com", "note", "first")?;
    graph.upsert_property("example.com", "note", "second")?;
    assert_eq!(graph.count_properties("example.com", &["note"])?, 2);

    // type facts are properties too
    assert_eq!(graph.count_properties("example.com", &[])?, 3);

    graph.delete_property("example.com", "note", "first")?;
    graph.delete_property("example.com", "note", "first")?;
    let props = graph.read_properties("example.com", &["note"])?;
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].value, Literal::from("second"));

    assert!(graph
        .upsert_property("absent.com", "note", "x")
        .unwrap_err()
        .is_not_found());
    assert!(graph
        .upsert_property("example.com", "", "x")
        .unwrap_err()
        .is_invalid_argument());
    Ok(())
}

#[test]
fn test_type_facts_are_not_plain_properties() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("a.example.com", NodeType::Fqdn)?;
    graph.upsert_node("b.example.com", NodeType::Fqdn)?;
    graph.upsert_edge(&Edge::new("cname_record", "a.example.com", "b.example.com"))?;

    let err = graph
        .delete_property("b.example.com", pred::TYPE, "fqdn")
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)), "{err}");
    assert!(graph
        .upsert_property("b.example.com", pred::TYPE, "ipaddr")
        .unwrap_err()
        .is_invalid_argument());

    assert!(graph.read_node("b.example.com", NodeType::Fqdn).is_ok());
    assert!(graph.read_node("b.example.com", NodeType::IpAddr).is_err());
    assert_eq!(graph.count_in_edges("b.example.com", &[])?, 1);
    Ok(())
}

#[test]
fn test_delete_node_removes_both_directions() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("a.example.com", NodeType::Fqdn)?;
    graph.upsert_node("b.example.com", NodeType::Fqdn)?;
    graph.upsert_edge(&Edge::new("cname_record", "a.example.com", "b.example.com"))?;
    graph.upsert_edge(&Edge::new("cname_record", "b.example.com", "b.example.com"))?;
    graph.upsert_property("b.example.com", "note", "x")?;

    graph.delete_node("b.example.com")?;

    assert!(graph.read_node("b.example.com", NodeType::Fqdn).is_err());
    assert!(graph
        .read_out_edges("a.example.com", &[])
        .unwrap_err()
        .is_empty_result());
    assert_eq!(graph.fact_count(), 1);
    assert!(graph.delete_node("b.example.com").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test_delete_edge_is_idempotent_on_facts() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("a.example.com", NodeType::Fqdn)?;
    graph.upsert_node("b.example.com", NodeType::Fqdn)?;
    let edge = Edge::new("cname_record", "a.example.com", "b.example.com");
    graph.upsert_edge(&edge)?;

    graph.delete_edge(&edge)?;
    graph.delete_edge(&edge)?;
    assert!(graph.count_in_edges("b.example.com", &[]).unwrap_err().is_empty_result());

    let dangling = Edge::new("cname_record", "a.example.com", "c.example.com");
    assert!(graph.delete_edge(&dangling).unwrap_err().is_not_found());
    Ok(())
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_event_tracker_debounces_finish() {
    let tracker = EventTracker::new();
    let window = Duration::seconds(5);
    let t0 = Utc::now();

    assert_eq!(tracker.touch("e", t0, window), EventTouch::First { now: t0 });
    assert_eq!(
        tracker.touch("e", t0 + Duration::seconds(3), window),
        EventTouch::Unchanged
    );

    let t1 = t0 + Duration::seconds(6);
    assert_eq!(
        tracker.touch("e", t1, window),
        EventTouch::Refresh {
            previous: t0,
            now: t1
        }
    );
    assert_eq!(tracker.cached_finish("e"), Some(t1));

    tracker.forget("e");
    assert!(tracker.is_empty());
    let t2 = t1 + Duration::seconds(1);
    assert_eq!(tracker.touch("e", t2, window), EventTouch::First { now: t2 });
}

#[test]
fn test_upsert_event_stamps_start_and_finish() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_event("e1")?;

    assert_eq!(graph.count_properties("e1", &[pred::START])?, 1);
    assert_eq!(graph.count_properties("e1", &[pred::FINISH])?, 1);
    let (start, finish) = graph.event_date_range("e1")?;
    assert!(start <= finish);
    assert_eq!(graph.event_list(), vec![NodeId::from("e1")]);

    assert!(graph.event_date_range("e2").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test_restarted_tracker_keeps_start() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_event("e1")?;
    let (start, _) = graph.event_date_range("e1")?;

    graph.event_tracker().forget("e1");
    graph.upsert_event("e1")?;

    let (again, _) = graph.event_date_range("e1")?;
    assert_eq!(start, again);
    assert_eq!(graph.count_properties("e1", &[pred::START])?, 1);
    assert_eq!(graph.count_properties("e1", &[pred::FINISH])?, 1);
    Ok(())
}

#[test]
fn test_add_node_to_event() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_node("192.0.2.9", NodeType::IpAddr)?;
    graph.add_node_to_event("192.0.2.9", "shodan", "e9")?;

    assert!(graph.in_event_scope("192.0.2.9", "e9", &[]));
    assert!(graph.in_event_scope("192.0.2.9", "e9", &["shodan"]));
    assert!(!graph.in_event_scope("192.0.2.9", "e9", &["crtsh"]));
    assert!(graph.read_node("shodan", NodeType::Source).is_ok());
    assert_eq!(graph.read_out_edges("e9", &[pred::USED])?.len(), 1);

    let err = graph.add_node_to_event("192.0.2.10", "shodan", "fresh").unwrap_err();
    assert!(err.is_not_found());
    assert!(graph.read_node("fresh", NodeType::Event).is_err());
    assert_eq!(graph.event_tracker().cached_finish("fresh"), None);

    assert!(graph
        .add_node_to_event("192.0.2.9", "", "e9")
        .unwrap_err()
        .is_invalid_argument());
    Ok(())
}

#[test]
fn test_event_name_queries() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_fqdn("www.example.com", "dns", "e1")?;
    graph.upsert_fqdn("api.example.org", "dns", "e2")?;

    let e1_fqdns = graph.all_nodes_of_type(NodeType::Fqdn, &["e1"])?;
    let names: Vec<&str> = e1_fqdns.iter().map(Node::id).collect();
    assert_eq!(names, vec!["com", "example.com", "www.example.com"]);

    assert_eq!(graph.all_nodes_of_type(NodeType::Fqdn, &[])?.len(), 6);
    let events = graph.all_nodes_of_type(NodeType::Event, &["e1", "nope"])?;
    assert_eq!(events.len(), 1);
    assert!(graph
        .all_nodes_of_type(NodeType::Netblock, &[])
        .unwrap_err()
        .is_empty_result());

    assert_eq!(ids(&graph.event_domains("e1")), vec!["example.com"]);
    assert_eq!(ids(&graph.event_subdomains(&["e1"])), vec!["www.example.com"]);
    assert_eq!(
        ids(&graph.event_fqdns("e1")),
        vec!["example.com", "www.example.com"]
    );
    assert_eq!(ids(&graph.events_in_scope(&["example.org"])), vec!["e2"]);
    assert!(graph.events_in_scope(&["example.com", "example.org"]).is_empty());
    assert!(graph.event_domains("nope").is_empty());
    Ok(())
}

// ============================================================================
// Names
// ============================================================================

#[test]
fn test_fqdn_hierarchy() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_fqdn("www.example.co.uk", "dns", "e1")?;

    assert!(graph.is_root_domain_node("example.co.uk"));
    assert!(graph.is_tld_node("co.uk"));
    assert!(!graph.is_root_domain_node("www.example.co.uk"));
    assert!(!graph.is_tld_node("example.co.uk"));

    let root = graph.read_out_edges("www.example.co.uk", &[pred::ROOT])?;
    assert_eq!(root[0].to.as_str(), "example.co.uk");
    Ok(())
}

#[test]
fn test_fqdn_rejects_malformed_names() {
    let graph = Graph::default();

    for bad in ["", "com", "co.uk", "www..example.com", "example.com.", "bad name.com"] {
        let err = graph.upsert_fqdn(bad, "dns", "e1").unwrap_err();
        assert!(matches!(err, GraphError::InvalidDomain(_)), "{bad}: {err}");
    }
    assert_eq!(graph.fact_count(), 0);
    assert!(graph.event_tracker().is_empty());
}

#[test]
fn test_record_checks() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_cname("www.example.com", "edge.example.net", "dns", "e1")?;
    graph.upsert_ns("example.com", "ns1.example.net", "dns", "e1")?;
    graph.upsert_mx("example.com", "mail.example.com", "dns", "e1")?;
    graph.upsert_ptr("1.2.0.192.in-addr.arpa", "www.example.com", "dns", "e1")?;

    assert!(graph.is_cname_node("www.example.com"));
    assert!(!graph.is_cname_node("edge.example.net"));
    assert!(graph.is_ns_node("ns1.example.net"));
    assert!(!graph.is_ns_node("example.com"));
    assert!(graph.is_mx_node("mail.example.com"));
    assert!(graph.is_ptr_node("1.2.0.192.in-addr.arpa"));
    assert!(!graph.is_ptr_node("www.example.com"));
    assert!(!graph.is_cname_node("missing.example.com"));
    Ok(())
}

#[test]
fn test_srv_links_service_to_name_and_target() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_srv(
        "example.com",
        "_sip._tcp.example.com",
        "sip.example.net",
        "dns",
        "e1",
    )?;

    let out = graph.read_out_edges("_sip._tcp.example.com", &[pred::SERVICE, pred::SRV_RECORD])?;
    let targets: Vec<(&str, &str)> = out
        .iter()
        .map(|e| (e.predicate.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(
        targets,
        vec![("service", "example.com"), ("srv_record", "sip.example.net")]
    );
    Ok(())
}

// ============================================================================
// Infrastructure and sources
// ============================================================================

#[test]
fn test_as_description_is_replaced() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_as(13335, "CLOUDFLARENET", "RIR", "e1")?;
    graph.upsert_as(13335, "Cloudflare, Inc.", "RIR", "e1")?;

    assert_eq!(graph.read_as_description(13335)?, "Cloudflare, Inc.");
    assert_eq!(graph.count_properties("13335", &[pred::DESCRIPTION])?, 1);
    assert!(graph.read_as_description(64512).unwrap_err().is_not_found());
    assert!(graph.read_as_prefixes(13335).unwrap_err().is_empty_result());
    Ok(())
}

#[test]
fn test_upsert_infrastructure() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_infrastructure(
        13335,
        "Cloudflare, Inc.",
        "104.16.0.1",
        "104.16.0.0/12",
        "RIR",
        "e1",
    )?;

    assert_eq!(ids(&graph.read_as_prefixes(13335)?), vec!["104.16.0.0/12"]);
    let contains = graph.read_out_edges("104.16.0.0/12", &[pred::CONTAINS])?;
    assert_eq!(contains[0].to.as_str(), "104.16.0.1");

    assert_eq!(graph.node_sources("104.16.0.1", &["e1"])?, vec!["DNS"]);
    assert_eq!(graph.node_sources("104.16.0.0/12", &[])?, vec!["RIR"]);
    Ok(())
}

#[test]
fn test_node_sources_skips_structural_edges() -> Result<()> {
    let graph = Graph::default();
    graph.upsert_fqdn("www.example.com", "crtsh", "e1")?;
    graph.upsert_a("www.example.com", "192.0.2.1", "dns", "e1")?;
    graph.upsert_cname("alias.example.com", "www.example.com", "dns", "e2")?;

    assert_eq!(graph.node_sources("www.example.com", &["e1"])?, vec!["crtsh", "dns"]);
    assert_eq!(graph.node_sources("www.example.com", &["e2"])?, vec!["dns"]);
    assert!(graph
        .node_sources("www.example.com", &["nope"])
        .unwrap_err()
        .is_empty_result());
    Ok(())
}

#[test]
fn test_cache_replaces_previous_response() -> Result<()> {
    let graph = Graph::default();
    let first = graph.cache_source_data("crtsh", "example.com", "r1")?;
    let second = graph.cache_source_data("crtsh", "example.com", "r2")?;

    assert_ne!(first, second);
    assert!(graph.read_node(first.as_str(), NodeType::Response).is_err());
    assert_eq!(graph.count_out_edges("crtsh", &["example.com"])?, 1);
    assert_eq!(graph.get_source_data("crtsh", "example.com", 60)?, "r2");

    assert!(graph
        .get_source_data("crtsh", "other.com", 60)
        .unwrap_err()
        .is_empty_result());
    assert!(graph
        .get_source_data("nope", "example.com", 60)
        .unwrap_err()
        .is_not_found());
    Ok(())
}

// ============================================================================
// Configuration and snapshots
// ============================================================================

#[test]
fn test_config_from_json() -> Result<()> {
    let config = GraphConfig::from_json_str(r#"{ "max_alias_hops": 3 }"#)?;
    assert_eq!(config.max_alias_hops, 3);
    assert_eq!(config.event_finish_debounce_ms, 5_000);
    assert_eq!(config.name, "memory");

    let dir = tempdir()?;
    let path = dir.path().join("graph.json");
    std::fs::write(&path, r#"{ "name": "scratch", "event_finish_debounce_ms": 10 }"#)?;
    let config = GraphConfig::from_json_file(&path)?;
    assert_eq!(config.name, "scratch");
    assert_eq!(config.event_finish_debounce_ms, 10);

    assert!(matches!(
        GraphConfig::from_json_str("not json"),
        Err(GraphError::Config(_))
    ));
    Ok(())
}

#[test]
fn test_snapshot_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let config = GraphConfig::default()
        .with_name("recon")
        .with_snapshot_path(dir.path().join("recon.snapshot"));

    let graph = Graph::open(config.clone())?;
    assert_eq!(graph.name(), "recon");
    graph.upsert_a("www.example.com", "192.0.2.1", "dns", "e1")?;
    graph.save_snapshot()?;

    let reopened = Graph::open(config)?;
    assert_eq!(reopened.fact_count(), graph.fact_count());
    assert_eq!(reopened.dump_graph(), graph.dump_graph());
    assert!(reopened.read_node("192.0.2.1", NodeType::IpAddr).is_ok());

    assert!(matches!(
        Graph::default().save_snapshot(),
        Err(GraphError::Config(_))
    ));
    Ok(())
}

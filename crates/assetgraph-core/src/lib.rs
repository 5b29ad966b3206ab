//! Assetgraph Core
//!
//! The asset graph records what a reconnaissance run discovered (names,
//! addresses, netblocks, autonomous systems) and how those assets relate,
//! with every finding attributed to an *event* and a *source*:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Graph<S>                                   │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │   upsert_fqdn / upsert_a / upsert_cname / upsert_infrastructure ... │
//! │        │                                                            │
//! │        ├──► EventTracker::touch   (own lock, debounced `finish`)    │
//! │        │                                                            │
//! │        ▼                                                            │
//! │   Batch of deltas ──► Mutex<S: GraphStore>::apply   (all or none)   │
//! │                                                                     │
//! │   names_to_addrs        bounded CNAME/SRV walk                      │
//! │   migrate_events*       two-hop collection ──► replicate(target)    │
//! │   cache/get_source_data response nodes with TTL                     │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Attribution: `(event)-[used]->(source)` records that a source contributed
//! to an event, and `(event)-[<source name>]->(node)` records what it found.
//!
//! ## Locking
//!
//! Every public operation holds the store lock for its whole duration, so
//! graph operations are totally ordered. Event timestamp bookkeeping uses a
//! second lock that is always released before the store lock is taken.

pub mod addr;
pub mod asn;
pub mod config;
pub mod edge;
pub mod error;
pub mod event;
pub mod fqdn;
pub mod migrate;
pub mod netblock;
pub mod node;
pub mod property;
pub mod source;

#[cfg(test)]
mod tests;

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use tokio_util::sync::CancellationToken;

pub use assetgraph_store::{
    ApplyOptions, Batch, GraphStore, Literal, MemoryStore, NodeId, StoreError, Term, Triple,
};
pub use addr::NameAddrPair;
pub use config::GraphConfig;
pub use edge::Edge;
pub use error::{GraphError, Result};
pub use event::{EventTouch, EventTracker};
pub use node::{Node, NodeType};
pub use property::Property;

/// Predicates with a fixed meaning in the graph.
pub mod pred {
    pub const TYPE: &str = assetgraph_store::PRED_TYPE;

    // Attribution
    pub const USED: &str = "used";
    pub const DOMAIN: &str = "domain";

    // Name hierarchy
    pub const ROOT: &str = "root";
    pub const TLD: &str = "tld";

    // DNS records
    pub const A_RECORD: &str = "a_record";
    pub const AAAA_RECORD: &str = "aaaa_record";
    pub const CNAME_RECORD: &str = "cname_record";
    pub const PTR_RECORD: &str = "ptr_record";
    pub const MX_RECORD: &str = "mx_record";
    pub const NS_RECORD: &str = "ns_record";
    pub const SRV_RECORD: &str = "srv_record";
    pub const SERVICE: &str = "service";

    // Infrastructure
    pub const CONTAINS: &str = "contains";
    pub const PREFIX: &str = "prefix";
    pub const DESCRIPTION: &str = "description";

    // Event window
    pub const START: &str = "start";
    pub const FINISH: &str = "finish";

    // Cached responses
    pub const TIMESTAMP: &str = "timestamp";
    pub const RESPONSE: &str = "response";

    /// Predicates that link assets structurally and never name a source.
    pub const STRUCTURAL: &[&str] = &[
        TLD,
        ROOT,
        DOMAIN,
        CNAME_RECORD,
        PTR_RECORD,
        MX_RECORD,
        NS_RECORD,
        SRV_RECORD,
        SERVICE,
    ];

    pub fn is_structural(predicate: &str) -> bool {
        STRUCTURAL.contains(&predicate)
    }
}

// ============================================================================
// Facts
// ============================================================================

/// A stored fact, classified by the shape of its object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    Edge(Edge),
    Property(Property),
}

impl From<Triple> for Fact {
    fn from(triple: Triple) -> Self {
        match triple.object {
            Term::Node(to) => Fact::Edge(Edge {
                predicate: triple.predicate,
                from: triple.subject,
                to,
            }),
            Term::Literal(value) => Fact::Property(Property {
                node: triple.subject,
                predicate: triple.predicate,
                value,
            }),
        }
    }
}

impl From<Fact> for Triple {
    fn from(fact: Fact) -> Self {
        match fact {
            Fact::Edge(e) => Triple::edge(e.from, e.predicate, e.to),
            Fact::Property(p) => Triple::new(p.node, p.predicate, Term::Literal(p.value)),
        }
    }
}

// ============================================================================
// Graph Handle
// ============================================================================

/// The asset graph over a fact store.
pub struct Graph<S: GraphStore = MemoryStore> {
    store: Mutex<S>,
    events: EventTracker,
    config: GraphConfig,
}

impl<S: GraphStore> Graph<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, GraphConfig::default())
    }

    pub fn with_config(store: S, config: GraphConfig) -> Self {
        Self {
            store: Mutex::new(store),
            events: EventTracker::new(),
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Name of the underlying store.
    pub fn name(&self) -> String {
        self.store.lock().name().to_string()
    }

    /// Number of facts currently stored.
    pub fn fact_count(&self) -> usize {
        self.store.lock().len()
    }

    /// Every fact in the graph, one per line.
    pub fn dump_graph(&self) -> String {
        assetgraph_store::dump(&*self.store.lock())
    }

    /// Consume the handle, returning the store.
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock()
    }

    pub(crate) fn event_tracker(&self) -> &EventTracker {
        &self.events
    }
}

impl Graph<MemoryStore> {
    /// Build an in-memory graph from `config`, restoring its snapshot when
    /// the file exists.
    pub fn open(config: GraphConfig) -> Result<Self> {
        let store = match &config.snapshot_path {
            Some(path) if path.exists() => MemoryStore::open(path)?,
            _ => MemoryStore::new(config.name.clone()),
        };
        tracing::debug!(store = %store, facts = store.len(), "opened graph");
        Ok(Self::with_config(store, config))
    }

    pub fn save_snapshot(&self) -> Result<()> {
        let Some(path) = &self.config.snapshot_path else {
            return Err(GraphError::Config("no snapshot_path configured".to_string()));
        };
        self.lock().save(path)?;
        Ok(())
    }
}

impl Default for Graph<MemoryStore> {
    fn default() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl<S: GraphStore> fmt::Display for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl<S: GraphStore> fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(GraphError::Canceled);
    }
    Ok(())
}

pub(crate) fn commit<S: GraphStore + ?Sized>(store: &mut S, batch: Batch) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }
    Ok(store.apply(batch, ApplyOptions::graph_write())?)
}

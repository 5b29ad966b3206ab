//! Typed nodes.
//!
//! A node exists iff it carries at least one `type` fact. Reads name the
//! expected type so a string id is never silently accepted as a handle of the
//! wrong kind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tokio_util::sync::CancellationToken;

use assetgraph_store::{replicate, Batch, GraphStore, NodeId, Term, Triple};

use crate::error::{require, GraphError, Result};
use crate::{commit, ensure_active, pred, Graph};

/// Node type tags used by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Fqdn,
    #[serde(rename = "ipaddr")]
    IpAddr,
    Netblock,
    As,
    Event,
    Source,
    Response,
}

impl NodeType {
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeType::Fqdn => "fqdn",
            NodeType::IpAddr => "ipaddr",
            NodeType::Netblock => "netblock",
            NodeType::As => "as",
            NodeType::Event => "event",
            NodeType::Source => "source",
            NodeType::Response => "response",
        }
    }
}

impl AsRef<str> for NodeType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a node known to exist with the given type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: NodeId,
    pub ntype: String,
}

impl Node {
    pub fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.ntype)
    }
}

// ============================================================================
// Staging
// ============================================================================

pub(crate) fn stage_node(batch: &mut Batch, id: &str, ntype: &str) -> Result<()> {
    require(id, "node id")?;
    require(ntype, "node type")?;
    batch.insert(Triple::node_type(id, ntype));
    Ok(())
}

/// Stage removal of every fact mentioning `id` as subject or object.
pub(crate) fn stage_delete_node<S: GraphStore + ?Sized>(store: &S, batch: &mut Batch, id: &str) {
    for (predicate, object) in store.out_facts(id, &[]) {
        batch.remove(Triple::new(id, predicate, object));
    }
    for (predicate, subject) in store.in_facts(id, &[]) {
        // self loops were already staged above
        if subject.as_str() == id {
            continue;
        }
        batch.remove(Triple::edge(subject, predicate, id));
    }
}

/// Distinct node objects of `id`'s out-facts through `predicates`, sorted.
pub(crate) fn out_nodes<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    predicates: &[&str],
) -> Vec<NodeId> {
    let set: BTreeSet<NodeId> = store
        .out_facts(id, predicates)
        .into_iter()
        .filter_map(|(_, object)| match object {
            Term::Node(node) => Some(node),
            Term::Literal(_) => None,
        })
        .collect();
    set.into_iter().collect()
}

pub(crate) fn require_node<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    ntype: Option<&str>,
) -> Result<()> {
    if id.is_empty() || !store.has_node(id, ntype) {
        let what = match ntype {
            Some(t) => format!("{}: node {id:?} of type {t}", store.name()),
            None => format!("{}: node {id:?}", store.name()),
        };
        return Err(GraphError::NotFound(what));
    }
    Ok(())
}

pub(crate) fn node_ids_of_type<S: GraphStore + ?Sized>(
    store: &S,
    ntype: &str,
    events: &[&str],
) -> Vec<NodeId> {
    let type_term = Term::literal(ntype);
    if events.is_empty() {
        return store.subjects_with(pred::TYPE, &type_term);
    }

    let mut ids = BTreeSet::new();
    for event in events {
        if !store.has_node(event, Some(NodeType::Event.as_str())) {
            continue;
        }
        if ntype == NodeType::Event.as_str() {
            ids.insert(NodeId::from(*event));
            continue;
        }
        for node in out_nodes(store, event, &[]) {
            if store.has_node(node.as_str(), Some(ntype)) {
                ids.insert(node);
            }
        }
    }
    ids.into_iter().collect()
}

// ============================================================================
// Operations
// ============================================================================

impl<S: GraphStore> Graph<S> {
    pub fn upsert_node(&self, id: &str, ntype: impl AsRef<str>) -> Result<Node> {
        let ntype = ntype.as_ref();
        let mut batch = Batch::new();
        stage_node(&mut batch, id, ntype)?;

        commit(&mut *self.lock(), batch)?;
        Ok(Node {
            id: NodeId::from(id),
            ntype: ntype.to_string(),
        })
    }

    /// The node `id` of type `ntype`; both must match.
    pub fn read_node(&self, id: &str, ntype: impl AsRef<str>) -> Result<Node> {
        let ntype = ntype.as_ref();
        require(id, "node id")?;
        require(ntype, "node type")?;

        require_node(&*self.lock(), id, Some(ntype))?;
        Ok(Node {
            id: NodeId::from(id),
            ntype: ntype.to_string(),
        })
    }

    /// Remove the node and every fact in which it appears.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        let mut store = self.lock();
        require_node(&*store, id, None)?;

        let mut batch = Batch::new();
        stage_delete_node(&*store, &mut batch, id);
        commit(&mut *store, batch)?;
        Ok(())
    }

    /// Nodes of `ntype`, restricted to those the given events link to when
    /// any are named.
    pub fn all_nodes_of_type(&self, ntype: impl AsRef<str>, events: &[&str]) -> Result<Vec<Node>> {
        let ntype = ntype.as_ref();
        require(ntype, "node type")?;

        let ids = node_ids_of_type(&*self.lock(), ntype, events);
        if ids.is_empty() {
            return Err(GraphError::EmptyResult(format!("no nodes of type {ntype}")));
        }
        Ok(ids
            .into_iter()
            .map(|id| Node {
                id,
                ntype: ntype.to_string(),
            })
            .collect())
    }

    /// Distinct nodes that `id` has an out edge to.
    pub fn all_out_nodes(&self, id: &str) -> Result<Vec<NodeId>> {
        let store = self.lock();
        require_node(&*store, id, None)?;

        let nodes: Vec<NodeId> = out_nodes(&*store, id, &[])
            .into_iter()
            .filter(|n| store.has_node(n.as_str(), None))
            .collect();
        if nodes.is_empty() {
            return Err(GraphError::EmptyResult(format!(
                "no nodes that {id} has out edges to"
            )));
        }
        Ok(nodes)
    }

    /// Copy the out-facts of `nodes` into `target`.
    pub fn write_node_facts<T: GraphStore>(
        &self,
        target: &Graph<T>,
        nodes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut facts = Vec::new();
        {
            let store = self.lock();
            for id in nodes {
                ensure_active(cancel)?;
                for (predicate, object) in store.out_facts(id, &[]) {
                    facts.push(Triple::new(*id, predicate, object));
                }
            }
        }
        if facts.is_empty() {
            return Err(GraphError::NothingToMigrate);
        }

        ensure_active(cancel)?;
        Ok(replicate(&mut *target.lock(), facts)?)
    }
}

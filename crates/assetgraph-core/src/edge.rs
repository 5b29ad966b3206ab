//! Directed edges between existing nodes.

use std::fmt;

use assetgraph_store::{Batch, GraphStore, NodeId, Triple};

use crate::error::{require, GraphError, Result};
use crate::node::require_node;
use crate::{commit, Fact, Graph};

/// `from -[predicate]-> to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub predicate: String,
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(
        predicate: impl Into<String>,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
    ) -> Self {
        Self {
            predicate: predicate.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.predicate, "edge predicate")?;
        require(self.from.as_str(), "edge source")?;
        require(self.to.as_str(), "edge target")
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.predicate, self.to)
    }
}

impl From<&Edge> for Triple {
    fn from(edge: &Edge) -> Self {
        Triple::edge(edge.from.clone(), edge.predicate.clone(), edge.to.clone())
    }
}

pub(crate) fn stage_edge(batch: &mut Batch, predicate: &str, from: &str, to: &str) -> Result<()> {
    require(predicate, "edge predicate")?;
    require(from, "edge source")?;
    require(to, "edge target")?;
    batch.insert(Triple::edge(from, predicate, to));
    Ok(())
}

pub(crate) fn out_edges<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    predicates: &[&str],
) -> Vec<Edge> {
    store
        .out_facts(id, predicates)
        .into_iter()
        .filter_map(|(predicate, object)| match Fact::from(Triple::new(id, predicate, object)) {
            Fact::Edge(edge) => Some(edge),
            Fact::Property(_) => None,
        })
        .collect()
}

pub(crate) fn in_edges<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    predicates: &[&str],
) -> Vec<Edge> {
    store
        .in_facts(id, predicates)
        .into_iter()
        .map(|(predicate, from)| Edge {
            predicate,
            from,
            to: NodeId::from(id),
        })
        .collect()
}

fn non_empty(edges: Vec<Edge>, id: &str, direction: &str) -> Result<Vec<Edge>> {
    if edges.is_empty() {
        return Err(GraphError::EmptyResult(format!(
            "no {direction} edges for node {id}"
        )));
    }
    Ok(edges)
}

impl<S: GraphStore> Graph<S> {
    /// Link two existing nodes. Both endpoints must already exist.
    pub fn upsert_edge(&self, edge: &Edge) -> Result<()> {
        edge.validate()?;

        let mut store = self.lock();
        require_node(&*store, edge.from.as_str(), None)?;
        require_node(&*store, edge.to.as_str(), None)?;

        let mut batch = Batch::new();
        batch.insert(Triple::from(edge));
        commit(&mut *store, batch)?;
        Ok(())
    }

    pub fn read_in_edges(&self, id: &str, predicates: &[&str]) -> Result<Vec<Edge>> {
        let store = self.lock();
        require_node(&*store, id, None)?;
        non_empty(in_edges(&*store, id, predicates), id, "in")
    }

    pub fn read_out_edges(&self, id: &str, predicates: &[&str]) -> Result<Vec<Edge>> {
        let store = self.lock();
        require_node(&*store, id, None)?;
        non_empty(out_edges(&*store, id, predicates), id, "out")
    }

    /// In-edges followed by out-edges.
    pub fn read_edges(&self, id: &str, predicates: &[&str]) -> Result<Vec<Edge>> {
        let store = self.lock();
        require_node(&*store, id, None)?;

        let mut edges = in_edges(&*store, id, predicates);
        edges.extend(out_edges(&*store, id, predicates));
        non_empty(edges, id, "in or out")
    }

    pub fn count_in_edges(&self, id: &str, predicates: &[&str]) -> Result<usize> {
        self.read_in_edges(id, predicates).map(|e| e.len())
    }

    pub fn count_out_edges(&self, id: &str, predicates: &[&str]) -> Result<usize> {
        self.read_out_edges(id, predicates).map(|e| e.len())
    }

    pub fn count_edges(&self, id: &str, predicates: &[&str]) -> Result<usize> {
        self.read_edges(id, predicates).map(|e| e.len())
    }

    /// Remove one edge fact. Absent facts are not an error; absent endpoints are.
    pub fn delete_edge(&self, edge: &Edge) -> Result<()> {
        require(&edge.predicate, "edge predicate")?;

        let mut store = self.lock();
        require_node(&*store, edge.from.as_str(), None)?;
        require_node(&*store, edge.to.as_str(), None)?;

        let mut batch = Batch::new();
        batch.remove(Triple::from(edge));
        commit(&mut *store, batch)?;
        Ok(())
    }
}

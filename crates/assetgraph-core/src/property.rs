//! Literal-valued properties.
//!
//! Properties are multi-valued: asserting a second value for a predicate
//! keeps the first. Single-slot fields retract the old value explicitly.

use chrono::{DateTime, Utc};
use std::fmt;

use assetgraph_store::{Batch, GraphStore, Literal, NodeId, Triple};

use crate::error::{require, GraphError, Result};
use crate::node::require_node;
use crate::{commit, pred, Fact, Graph};

/// `node.predicate = value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Property {
    pub node: NodeId,
    pub predicate: String,
    pub value: Literal,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} = {}", self.node, self.predicate, self.value)
    }
}

pub(crate) fn stage_property(
    batch: &mut Batch,
    id: &str,
    predicate: &str,
    value: impl Into<Literal>,
) -> Result<()> {
    require(id, "node id")?;
    require(predicate, "property predicate")?;
    batch.insert(Triple::property(id, predicate, value));
    Ok(())
}

pub(crate) fn properties<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    predicates: &[&str],
) -> Vec<Property> {
    store
        .out_facts(id, predicates)
        .into_iter()
        .filter_map(|(predicate, object)| match Fact::from(Triple::new(id, predicate, object)) {
            Fact::Property(p) => Some(p),
            Fact::Edge(_) => None,
        })
        .collect()
}

pub(crate) fn time_values<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    predicate: &str,
) -> Vec<DateTime<Utc>> {
    properties(store, id, &[predicate])
        .into_iter()
        .filter_map(|p| p.value.as_time())
        .collect()
}

pub(crate) fn string_values<S: GraphStore + ?Sized>(
    store: &S,
    id: &str,
    predicate: &str,
) -> Vec<String> {
    properties(store, id, &[predicate])
        .into_iter()
        .filter_map(|p| match p.value {
            Literal::Str(s) => Some(s),
            Literal::Time(_) => None,
        })
        .collect()
}

/// Stage `id.predicate = value` as the only value of the predicate.
pub(crate) fn stage_single_value<S: GraphStore + ?Sized>(
    store: &S,
    batch: &mut Batch,
    id: &str,
    predicate: &str,
    value: Literal,
) -> Result<()> {
    for old in properties(store, id, &[predicate]) {
        if old.value != value {
            batch.remove(Triple::property(id, predicate, old.value));
        }
    }
    stage_property(batch, id, predicate, value)
}

/// Type facts are written only by `upsert_node` and removed only by
/// `delete_node`.
fn writable_predicate(predicate: &str) -> Result<()> {
    require(predicate, "property predicate")?;
    if predicate == pred::TYPE {
        return Err(GraphError::InvalidArgument(format!(
            "predicate {:?} is reserved, use upsert_node/delete_node",
            pred::TYPE
        )));
    }
    Ok(())
}

impl<S: GraphStore> Graph<S> {
    pub fn upsert_property(
        &self,
        id: &str,
        predicate: &str,
        value: impl Into<Literal>,
    ) -> Result<()> {
        writable_predicate(predicate)?;

        let mut store = self.lock();
        require_node(&*store, id, None)?;

        let mut batch = Batch::new();
        stage_property(&mut batch, id, predicate, value)?;
        commit(&mut *store, batch)?;
        Ok(())
    }

    /// Literal facts of `id`, type facts included.
    pub fn read_properties(&self, id: &str, predicates: &[&str]) -> Result<Vec<Property>> {
        let store = self.lock();
        require_node(&*store, id, None)?;

        let props = properties(&*store, id, predicates);
        if props.is_empty() {
            return Err(GraphError::EmptyResult(format!(
                "no properties for node {id}"
            )));
        }
        Ok(props)
    }

    pub fn count_properties(&self, id: &str, predicates: &[&str]) -> Result<usize> {
        self.read_properties(id, predicates).map(|p| p.len())
    }

    /// Remove one property fact; an already absent fact is not an error.
    pub fn delete_property(
        &self,
        id: &str,
        predicate: &str,
        value: impl Into<Literal>,
    ) -> Result<()> {
        writable_predicate(predicate)?;

        let mut store = self.lock();
        require_node(&*store, id, None)?;

        let mut batch = Batch::new();
        batch.remove(Triple::property(id, predicate, value));
        commit(&mut *store, batch)?;
        Ok(())
    }
}

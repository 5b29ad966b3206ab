//! Data sources, provenance, and the source response cache.
//!
//! Cached responses are ordinary nodes:
//!
//! ```text
//!   (source) -[<query>]-> (source-response-<rfc3339>)
//!                              ├── timestamp = <time>
//!                              └── response  = "<raw text>"
//! ```
//!
//! Writing a response deletes the ones cached before it for the same query.
//! Reads take the newest entry still inside the TTL.

use chrono::{SecondsFormat, Utc};
use std::collections::{BTreeSet, HashSet};

use assetgraph_store::{Batch, GraphStore, NodeId, Triple};

use crate::edge::stage_edge;
use crate::error::{require, GraphError, Result};
use crate::node::{
    node_ids_of_type, out_nodes, require_node, stage_delete_node, stage_node, NodeType,
};
use crate::property::{stage_property, string_values, time_values};
use crate::{commit, pred, Graph};

impl<S: GraphStore> Graph<S> {
    pub fn upsert_source(&self, name: &str) -> Result<NodeId> {
        let mut batch = Batch::new();
        stage_node(&mut batch, name, NodeType::Source.as_str())?;

        commit(&mut *self.lock(), batch)?;
        Ok(NodeId::from(name))
    }

    /// Names of the sources that reported `node` during the events (all
    /// events when none are given), in first-seen order.
    pub fn node_sources(&self, node: &str, events: &[&str]) -> Result<Vec<String>> {
        let store = self.lock();
        require_node(&*store, node, None)?;

        let in_scope: BTreeSet<NodeId> =
            node_ids_of_type(&*store, NodeType::Event.as_str(), events)
                .into_iter()
                .collect();
        if in_scope.is_empty() {
            return Err(GraphError::EmptyResult("no events in scope".to_string()));
        }

        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for (predicate, from) in store.in_facts(node, &[]) {
            if pred::is_structural(&predicate) || !in_scope.contains(&from) {
                continue;
            }
            if !store.has_triple(&Triple::edge(from, pred::USED, predicate.as_str())) {
                continue;
            }
            if seen.insert(predicate.clone()) {
                sources.push(predicate);
            }
        }

        if sources.is_empty() {
            return Err(GraphError::EmptyResult(format!(
                "{}: no sources reported node {node}",
                store.name()
            )));
        }
        Ok(sources)
    }

    /// Replace the cached response of `source` for `query`.
    pub fn cache_source_data(&self, source: &str, query: &str, response: &str) -> Result<NodeId> {
        require(source, "source")?;
        require(query, "query")?;
        require(response, "response")?;

        let now = Utc::now();
        let rnode = format!(
            "{source}-response-{}",
            now.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );

        let mut store = self.lock();
        let mut batch = Batch::new();
        stage_node(&mut batch, source, NodeType::Source.as_str())?;
        for old in out_nodes(&*store, source, &[query]) {
            if store.has_node(old.as_str(), Some(NodeType::Response.as_str())) {
                stage_delete_node(&*store, &mut batch, old.as_str());
            }
        }

        stage_node(&mut batch, &rnode, NodeType::Response.as_str())?;
        stage_property(&mut batch, &rnode, pred::TIMESTAMP, now)?;
        stage_property(&mut batch, &rnode, pred::RESPONSE, response)?;
        stage_edge(&mut batch, query, source, &rnode)?;
        commit(&mut *store, batch)?;

        Ok(NodeId::from(rnode))
    }

    /// The newest response cached for `query` no older than `ttl_minutes`.
    pub fn get_source_data(&self, source: &str, query: &str, ttl_minutes: u32) -> Result<String> {
        require(query, "query")?;

        let store = self.lock();
        require_node(&*store, source, Some(NodeType::Source.as_str()))?;

        let now = Utc::now();
        let ttl = chrono::Duration::minutes(i64::from(ttl_minutes));
        for rnode in out_nodes(&*store, source, &[query]).into_iter().rev() {
            let stamped = time_values(&*store, rnode.as_str(), pred::TIMESTAMP)
                .into_iter()
                .max();
            if stamped.is_some_and(|ts| ts + ttl < now) {
                continue;
            }
            if let Some(response) = string_values(&*store, rnode.as_str(), pred::RESPONSE)
                .into_iter()
                .next()
            {
                return Ok(response);
            }
        }

        Err(GraphError::EmptyResult(format!(
            "{}: no cached response from {source} for query {query}",
            store.name()
        )))
    }
}

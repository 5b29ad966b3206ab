//! Assetgraph Fact Store
//!
//! The asset graph is persisted as a set of `(subject, predicate, object)`
//! facts. This crate defines the narrow contract the graph layer consumes and a
//! reference in-memory backend:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       GraphStore                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │   Batch ──► apply(opts) ──► validate all ──► mutate all      │
//! │                                                              │
//! │   has_node / has_triple          (existence)                 │
//! │   out_facts / in_facts           (directional neighbours)    │
//! │   subjects_with                  (reverse literal lookup)    │
//! │   triples                        (full scan for copies)      │
//! │                                                              │
//! │   replicate(target, facts)  ignore_duplicate + ignore_missing│
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A node exists iff at least one `(id, "type", T)` fact is present. Node
//! identity is the id string; the type lives in the fact, never in the id.

pub mod interner;
pub mod memory;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use interner::{StrId, StringInterner};
pub use memory::MemoryStore;

/// Predicate carrying a node's type tag.
pub const PRED_TYPE: &str = "type";

// ============================================================================
// Core Types
// ============================================================================

/// Opaque node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&NodeId> for NodeId {
    fn from(value: &NodeId) -> Self {
        value.clone()
    }
}

/// A literal fact value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Literal {
    Str(String),
    Time(DateTime<Utc>),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            Literal::Time(_) => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Literal::Time(t) => Some(*t),
            Literal::Str(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => f.write_str(s),
            Literal::Time(t) => f.write_str(&t.to_rfc3339()),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Literal::Time(value)
    }
}

/// The object position of a fact: another node, or a literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Node(NodeId),
    Literal(Literal),
}

impl Term {
    pub fn node(id: impl Into<NodeId>) -> Self {
        Term::Node(id.into())
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        Term::Literal(value.into())
    }

    pub fn as_node(&self) -> Option<&NodeId> {
        match self {
            Term::Node(id) => Some(id),
            Term::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            Term::Node(_) => None,
        }
    }
}

/// One `(subject, predicate, object)` fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: NodeId,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<NodeId>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }

    /// `subject -[predicate]-> object` between two nodes.
    pub fn edge(
        from: impl Into<NodeId>,
        predicate: impl Into<String>,
        to: impl Into<NodeId>,
    ) -> Self {
        Self::new(from, predicate, Term::Node(to.into()))
    }

    /// `subject.predicate = value`.
    pub fn property(
        subject: impl Into<NodeId>,
        predicate: impl Into<String>,
        value: impl Into<Literal>,
    ) -> Self {
        Self::new(subject, predicate, Term::Literal(value.into()))
    }

    /// The fact declaring `subject` a node of type `ntype`.
    pub fn node_type(subject: impl Into<NodeId>, ntype: impl Into<String>) -> Self {
        Self::property(subject, PRED_TYPE, Literal::Str(ntype.into()))
    }

    pub fn is_type_fact(&self) -> bool {
        self.predicate == PRED_TYPE && matches!(self.object, Term::Literal(Literal::Str(_)))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Term::Node(id) => write!(f, "<{}> <{}> <{}> .", self.subject, self.predicate, id),
            Term::Literal(Literal::Str(s)) => {
                write!(f, "<{}> <{}> {:?} .", self.subject, self.predicate, s)
            }
            Term::Literal(Literal::Time(t)) => write!(
                f,
                "<{}> <{}> \"{}\"^^<xsd:dateTime> .",
                self.subject,
                self.predicate,
                t.to_rfc3339()
            ),
        }
    }
}

/// A single fact-level change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Insert(Triple),
    Remove(Triple),
}

/// An ordered set of deltas applied as one unit.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    deltas: Vec<Delta>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, triple: Triple) {
        self.deltas.push(Delta::Insert(triple));
    }

    pub fn remove(&mut self, triple: Triple) {
        self.deltas.push(Delta::Remove(triple));
    }

    pub fn extend(&mut self, other: Batch) {
        self.deltas.extend(other.deltas);
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    pub fn into_deltas(self) -> Vec<Delta> {
        self.deltas
    }
}

impl FromIterator<Triple> for Batch {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            deltas: iter.into_iter().map(Delta::Insert).collect(),
        }
    }
}

/// Tolerances applied while validating a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Inserting a present fact or removing an absent one is a no-op.
    pub ignore_duplicate: bool,
    /// Facts referring to a node absent from the store are skipped.
    pub ignore_missing: bool,
}

impl ApplyOptions {
    /// Options for ordinary graph writes: set semantics, strict references.
    pub const fn graph_write() -> Self {
        Self {
            ignore_duplicate: true,
            ignore_missing: false,
        }
    }

    /// Options for copying facts between stores.
    pub const fn replication() -> Self {
        Self {
            ignore_duplicate: true,
            ignore_missing: true,
        }
    }

    pub const fn strict() -> Self {
        Self {
            ignore_duplicate: false,
            ignore_missing: false,
        }
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self::graph_write()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{store}: fact already present: {fact}")]
    Duplicate { store: String, fact: String },

    #[error("{store}: fact not present: {fact}")]
    Missing { store: String, fact: String },

    #[error("{store}: fact references node {node} which does not exist: {fact}")]
    DanglingReference {
        store: String,
        node: String,
        fact: String,
    },

    #[error("{0}: no facts provided")]
    Empty(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// GraphStore Contract
// ============================================================================

/// A transactional store of `(subject, predicate, object)` facts.
pub trait GraphStore: Send {
    /// Human-readable store name, used to prefix diagnostics.
    fn name(&self) -> &str;

    /// Apply every delta of `batch` or none of them. Returns the number of
    /// facts actually added or removed.
    fn apply(&mut self, batch: Batch, opts: ApplyOptions) -> StoreResult<usize>;

    fn has_triple(&self, triple: &Triple) -> bool;

    /// Types asserted for `id`, sorted.
    fn node_types(&self, id: &str) -> Vec<String>;

    fn has_node(&self, id: &str, ntype: Option<&str>) -> bool {
        let types = self.node_types(id);
        match ntype {
            Some(t) => types.iter().any(|x| x == t),
            None => !types.is_empty(),
        }
    }

    /// Facts whose subject is `subject`, optionally restricted to `predicates`,
    /// as `(predicate, object)` pairs sorted by predicate then object.
    fn out_facts(&self, subject: &str, predicates: &[&str]) -> Vec<(String, Term)>;

    /// Node-object facts pointing at `object`, as `(predicate, subject)` pairs
    /// sorted by predicate then subject.
    fn in_facts(&self, object: &str, predicates: &[&str]) -> Vec<(String, NodeId)>;

    /// Subjects of every `(s, predicate, object)` fact, sorted.
    fn subjects_with(&self, predicate: &str, object: &Term) -> Vec<NodeId>;

    /// Every fact in the store, sorted.
    fn triples(&self) -> Vec<Triple>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copy `facts` into `target`, ignoring duplicates and facts whose nodes do
/// not exist on the target side once the batch's own type facts are counted.
pub fn replicate<S: GraphStore + ?Sized>(target: &mut S, facts: Vec<Triple>) -> StoreResult<usize> {
    if facts.is_empty() {
        return Err(StoreError::Empty(target.name().to_string()));
    }

    let offered = facts.len();
    let batch: Batch = facts.into_iter().collect();
    let written = target.apply(batch, ApplyOptions::replication())?;
    tracing::debug!(
        store = target.name(),
        offered,
        written,
        "replicated facts"
    );
    Ok(written)
}

/// Render every fact of `store`, one per line.
pub fn dump<S: GraphStore + ?Sized>(store: &S) -> String {
    let mut out = String::new();
    for triple in store.triples() {
        out.push_str(&triple.to_string());
        out.push('\n');
    }
    out
}

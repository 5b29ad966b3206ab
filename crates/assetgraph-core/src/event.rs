//! Events: bounded discovery runs and their time window.
//!
//! Every attributed write touches its event. The first touch stamps `start`
//! and `finish`; later touches move `finish` forward, but only once the
//! cached value is older than the debounce window, so a busy event costs one
//! timestamp rewrite per window instead of one per discovered fact.
//!
//! ```text
//!   touch(event) ──► EventTracker (Mutex<HashMap>) ──► EventTouch
//!                                                        │
//!                 (tracker lock released)                ▼
//!   store lock ──► stage_event(touch) + caller's facts ──► apply
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tokio_util::sync::CancellationToken;

use assetgraph_store::{Batch, GraphStore, NodeId, Term, Triple};

use crate::edge::stage_edge;
use crate::error::{require, GraphError, Result};
use crate::fqdn::registrable_domain;
use crate::node::{node_ids_of_type, out_nodes, require_node, stage_node, NodeType};
use crate::property::{stage_property, time_values};
use crate::{commit, ensure_active, pred, Graph};

// ============================================================================
// Event Tracker
// ============================================================================

/// What a touch requires from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTouch {
    /// Not seen by this handle yet: initialize `start`/`finish`.
    First { now: DateTime<Utc> },
    /// `finish` is older than the window and moves to `now`.
    Refresh {
        previous: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// Within the window; nothing to write.
    Unchanged,
}

impl EventTouch {
    pub fn is_write(&self) -> bool {
        !matches!(self, EventTouch::Unchanged)
    }
}

/// Per-graph cache of the last `finish` written for each event.
#[derive(Debug, Default)]
pub struct EventTracker {
    finishes: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, event: &str, now: DateTime<Utc>, window: chrono::Duration) -> EventTouch {
        let mut finishes = self.finishes.lock();
        match finishes.get(event).copied() {
            None => {
                finishes.insert(event.to_string(), now);
                EventTouch::First { now }
            }
            Some(previous) if now.signed_duration_since(previous) > window => {
                finishes.insert(event.to_string(), now);
                EventTouch::Refresh { previous, now }
            }
            Some(_) => EventTouch::Unchanged,
        }
    }

    /// Drop the cached value so the next touch re-initializes the event.
    pub fn forget(&self, event: &str) {
        self.finishes.lock().remove(event);
    }

    pub fn cached_finish(&self, event: &str) -> Option<DateTime<Utc>> {
        self.finishes.lock().get(event).copied()
    }

    pub fn len(&self) -> usize {
        self.finishes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Staging
// ============================================================================

pub(crate) fn stage_event<S: GraphStore + ?Sized>(
    store: &S,
    batch: &mut Batch,
    event: &str,
    touch: &EventTouch,
) -> Result<()> {
    stage_node(batch, event, NodeType::Event.as_str())?;

    let fresh = !store.has_node(event, Some(NodeType::Event.as_str()));
    let now = match touch {
        EventTouch::First { now } | EventTouch::Refresh { now, .. } => *now,
        EventTouch::Unchanged if fresh => Utc::now(),
        EventTouch::Unchanged => return Ok(()),
    };

    if time_values(store, event, pred::START).is_empty() {
        stage_property(batch, event, pred::START, now)?;
    }

    // a single finish value survives, never earlier than one already stored
    let finishes = time_values(store, event, pred::FINISH);
    let latest = finishes.iter().copied().fold(now, |a, b| a.max(b));
    for finish in finishes {
        if finish != latest {
            batch.remove(Triple::property(event, pred::FINISH, finish));
        }
    }
    stage_property(batch, event, pred::FINISH, latest)
}

/// `(event)-[used]->(source)` and `(event)-[source]->(node)`, plus the
/// source node itself.
pub(crate) fn stage_attribution(
    batch: &mut Batch,
    node: &str,
    source: &str,
    event: &str,
) -> Result<()> {
    require(node, "node id")?;
    require(source, "source")?;
    require(event, "event id")?;

    stage_node(batch, source, NodeType::Source.as_str())?;
    stage_edge(batch, pred::USED, event, source)?;
    stage_edge(batch, source, event, node)
}

fn stage_and_commit<S, T, F>(store: &mut S, event: &str, touch: &EventTouch, build: F) -> Result<T>
where
    S: GraphStore,
    F: FnOnce(&S, &mut Batch) -> Result<T>,
{
    let mut batch = Batch::new();
    stage_event(&*store, &mut batch, event, touch)?;
    let out = build(&*store, &mut batch)?;
    commit(store, batch)?;
    Ok(out)
}

// ============================================================================
// Reads
// ============================================================================

pub(crate) fn domains_of<S: GraphStore + ?Sized>(store: &S, event: &str) -> Vec<NodeId> {
    if !store.has_node(event, Some(NodeType::Event.as_str())) {
        return Vec::new();
    }
    out_nodes(store, event, &[pred::DOMAIN])
}

pub(crate) fn subdomains_of<S: GraphStore + ?Sized>(store: &S, events: &[&str]) -> Vec<NodeId> {
    node_ids_of_type(store, NodeType::Fqdn.as_str(), events)
        .into_iter()
        .filter(|name| registrable_domain(name.as_str()).is_some_and(|d| d != name.as_str()))
        .collect()
}

/// Events holding a `domain` edge to every one of `domains`.
pub(crate) fn events_owning<S: GraphStore + ?Sized>(store: &S, domains: &[&str]) -> Vec<NodeId> {
    let mut owners: Option<BTreeSet<NodeId>> = None;
    for domain in domains {
        let events: BTreeSet<NodeId> = store
            .in_facts(domain, &[pred::DOMAIN])
            .into_iter()
            .map(|(_, subject)| subject)
            .filter(|s| store.has_node(s.as_str(), Some(NodeType::Event.as_str())))
            .collect();
        owners = Some(match owners {
            None => events,
            Some(acc) => acc.intersection(&events).cloned().collect(),
        });
    }
    owners.unwrap_or_default().into_iter().collect()
}

/// Facts about the events, then facts about every node the events name.
pub(crate) fn collect_event_facts<S: GraphStore + ?Sized>(
    store: &S,
    events: &[&str],
    cancel: &CancellationToken,
) -> Result<Vec<Triple>> {
    let mut facts = BTreeSet::new();
    let mut named = BTreeSet::new();

    for event in events {
        ensure_active(cancel)?;
        if !store.has_node(event, Some(NodeType::Event.as_str())) {
            continue;
        }
        for (predicate, object) in store.out_facts(event, &[]) {
            if let Term::Node(node) = &object {
                named.insert(node.clone());
            }
            facts.insert(Triple::new(*event, predicate, object));
        }
    }

    for node in named {
        ensure_active(cancel)?;
        if !store.has_node(node.as_str(), None) {
            continue;
        }
        for (predicate, object) in store.out_facts(node.as_str(), &[]) {
            facts.insert(Triple::new(node.clone(), predicate, object));
        }
    }

    Ok(facts.into_iter().collect())
}

// ============================================================================
// Operations
// ============================================================================

impl<S: GraphStore> Graph<S> {
    /// Apply `build`'s facts together with the event's own bookkeeping.
    pub(crate) fn write_in_event<T, F>(&self, event: &str, build: F) -> Result<T>
    where
        F: FnOnce(&S, &mut Batch) -> Result<T>,
    {
        require(event, "event id")?;

        let touch = self
            .event_tracker()
            .touch(event, Utc::now(), self.config().debounce());
        let result = stage_and_commit(&mut *self.lock(), event, &touch, build);
        if result.is_err() && touch.is_write() {
            self.event_tracker().forget(event);
        }
        result
    }

    pub fn upsert_event(&self, event: &str) -> Result<NodeId> {
        self.write_in_event(event, |_, _| Ok(()))?;
        Ok(NodeId::from(event))
    }

    /// Record that `source` found the existing node `node` during `event`.
    pub fn add_node_to_event(&self, node: &str, source: &str, event: &str) -> Result<()> {
        require(node, "node id")?;
        require(source, "source")?;

        self.write_in_event(event, |store, batch| {
            require_node(store, node, None)?;
            stage_attribution(batch, node, source, event)
        })
    }

    /// Whether `event` has an edge to `node`, through `predicates` if given.
    pub fn in_event_scope(&self, node: &str, event: &str, predicates: &[&str]) -> bool {
        self.lock()
            .in_facts(node, predicates)
            .iter()
            .any(|(_, from)| from.as_str() == event)
    }

    /// Events that include every one of `domains`.
    pub fn events_in_scope(&self, domains: &[&str]) -> Vec<NodeId> {
        if domains.is_empty() {
            return Vec::new();
        }
        events_owning(&*self.lock(), domains)
    }

    pub fn event_list(&self) -> Vec<NodeId> {
        node_ids_of_type(&*self.lock(), NodeType::Event.as_str(), &[])
    }

    /// Root domains discovered during the event.
    pub fn event_domains(&self, event: &str) -> Vec<NodeId> {
        domains_of(&*self.lock(), event)
    }

    /// Names below their registrable domain discovered during the events.
    pub fn event_subdomains(&self, events: &[&str]) -> Vec<NodeId> {
        subdomains_of(&*self.lock(), events)
    }

    /// Domains and subdomains of the event.
    pub fn event_fqdns(&self, event: &str) -> Vec<NodeId> {
        let store = self.lock();
        let mut names: BTreeSet<NodeId> = domains_of(&*store, event).into_iter().collect();
        if store.has_node(event, Some(NodeType::Event.as_str())) {
            names.extend(subdomains_of(&*store, &[event]));
        }
        names.into_iter().collect()
    }

    /// `(start, finish)` of the event.
    pub fn event_date_range(&self, event: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let store = self.lock();
        require_node(&*store, event, Some(NodeType::Event.as_str()))?;

        let start = time_values(&*store, event, pred::START).into_iter().min();
        let finish = time_values(&*store, event, pred::FINISH).into_iter().max();
        match (start, finish) {
            (Some(start), Some(finish)) => Ok((start, finish)),
            _ => Err(GraphError::EmptyResult(format!(
                "event {event} has no start/finish"
            ))),
        }
    }

    /// Every fact about the events and about the nodes they name directly.
    pub fn read_event_facts(
        &self,
        events: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<Triple>> {
        collect_event_facts(&*self.lock(), events, cancel)
    }
}

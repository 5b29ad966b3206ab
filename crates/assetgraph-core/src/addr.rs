//! IP addresses, address records, and name-to-address resolution.
//!
//! # Resolution
//!
//! `names_to_addrs` pairs names with the addresses they reach inside one
//! event. A name resolves directly through `a_record`/`aaaa_record`, or
//! indirectly through an alias chain:
//!
//! ```text
//!   hop 1:      name ─[srv_record | cname_record]─► n1
//!   hop 2..N:   n(k) ─[cname_record]─► n(k+1)
//!   any hop:    n(k) ─[a_record | aaaa_record]─► addr   (addr named by the event)
//! ```
//!
//! The walk is bounded by `GraphConfig::max_alias_hops`; alias loops end
//! there at the latest.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tokio_util::sync::CancellationToken;

use assetgraph_store::{GraphStore, NodeId};

use crate::edge::stage_edge;
use crate::error::{require, GraphError, Result};
use crate::event::stage_attribution;
use crate::fqdn::{stage_fqdn, FqdnParts};
use crate::node::{out_nodes, require_node, stage_node, NodeType};
use crate::{ensure_active, pred, Graph};

/// A name and an address it eventually resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameAddrPair {
    pub name: NodeId,
    pub addr: NodeId,
}

impl fmt::Display for NameAddrPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.addr)
    }
}

pub(crate) fn stage_address(
    batch: &mut assetgraph_store::Batch,
    addr: &str,
    source: &str,
    event: &str,
) -> Result<()> {
    stage_node(batch, addr, NodeType::IpAddr.as_str())?;
    stage_attribution(batch, addr, source, event)
}

/// Address nodes `name` points at that the event also names.
fn event_addrs<S: GraphStore + ?Sized>(
    store: &S,
    in_event: &BTreeSet<NodeId>,
    name: &str,
) -> Vec<NodeId> {
    out_nodes(store, name, &[pred::A_RECORD, pred::AAAA_RECORD])
        .into_iter()
        .filter(|addr| in_event.contains(addr))
        .filter(|addr| store.has_node(addr.as_str(), Some(NodeType::IpAddr.as_str())))
        .collect()
}

impl<S: GraphStore> Graph<S> {
    pub fn upsert_address(&self, addr: &str, source: &str, event: &str) -> Result<NodeId> {
        require(addr, "address")?;
        require(source, "source")?;

        self.write_in_event(event, |_, batch| stage_address(batch, addr, source, event))?;
        Ok(NodeId::from(addr))
    }

    pub fn upsert_a(&self, fqdn: &str, addr: &str, source: &str, event: &str) -> Result<()> {
        self.upsert_addr_record(fqdn, addr, pred::A_RECORD, source, event)
    }

    pub fn upsert_aaaa(&self, fqdn: &str, addr: &str, source: &str, event: &str) -> Result<()> {
        self.upsert_addr_record(fqdn, addr, pred::AAAA_RECORD, source, event)
    }

    fn upsert_addr_record(
        &self,
        fqdn: &str,
        addr: &str,
        predicate: &str,
        source: &str,
        event: &str,
    ) -> Result<()> {
        require(addr, "address")?;
        require(source, "source")?;
        let name = FqdnParts::parse(fqdn)?;

        self.write_in_event(event, |_, batch| {
            stage_fqdn(batch, &name, source, event)?;
            stage_address(batch, addr, source, event)?;
            stage_edge(batch, predicate, name.name, addr)
        })
    }

    /// Every `(name, address)` pair reachable inside `event`.
    ///
    /// With no `names`, the event's own names are used. Names with a direct
    /// address record are not walked further.
    pub fn names_to_addrs(
        &self,
        event: &str,
        names: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<NameAddrPair>> {
        require(event, "event id")?;
        ensure_active(cancel)?;

        let store = self.lock();
        require_node(&*store, event, Some(NodeType::Event.as_str()))?;

        let in_event: BTreeSet<NodeId> = out_nodes(&*store, event, &[]).into_iter().collect();
        let names: BTreeSet<NodeId> = if names.is_empty() {
            in_event
                .iter()
                .filter(|n| store.has_node(n.as_str(), Some(NodeType::Fqdn.as_str())))
                .cloned()
                .collect()
        } else {
            names.iter().map(|n| NodeId::from(*n)).collect()
        };

        let mut found: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut remaining = Vec::new();
        for name in names {
            ensure_active(cancel)?;
            let addrs = event_addrs(&*store, &in_event, name.as_str());
            if addrs.is_empty() {
                remaining.push(name);
            } else {
                found.entry(name).or_default().extend(addrs);
            }
        }

        let max_hops = self.config().max_alias_hops;
        for name in remaining {
            let mut visited = BTreeSet::from([name.clone()]);
            let mut frontier = vec![name.clone()];

            for hop in 1..=max_hops {
                ensure_active(cancel)?;
                let aliases: &[&str] = if hop == 1 {
                    &[pred::SRV_RECORD, pred::CNAME_RECORD]
                } else {
                    &[pred::CNAME_RECORD]
                };

                let mut next = Vec::new();
                for node in &frontier {
                    for target in out_nodes(&*store, node.as_str(), aliases) {
                        if visited.insert(target.clone()) {
                            next.push(target);
                        }
                    }
                }
                if next.is_empty() {
                    break;
                }

                for node in &next {
                    let addrs = event_addrs(&*store, &in_event, node.as_str());
                    if !addrs.is_empty() {
                        found.entry(name.clone()).or_default().extend(addrs);
                    }
                }
                frontier = next;
            }
        }

        let pairs: Vec<NameAddrPair> = found
            .into_iter()
            .flat_map(|(name, addrs)| {
                addrs.into_iter().map(move |addr| NameAddrPair {
                    name: name.clone(),
                    addr,
                })
            })
            .collect();
        if pairs.is_empty() {
            return Err(GraphError::EmptyResult(format!(
                "{}: no addresses were discovered",
                store.name()
            )));
        }
        Ok(pairs)
    }
}

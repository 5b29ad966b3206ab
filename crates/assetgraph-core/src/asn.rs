//! Autonomous systems and the infrastructure they announce.
//!
//! ```text
//!   (as) -[prefix]-> (netblock) -[contains]-> (ipaddr)
//! ```
//!
//! An AS keeps a single `description`; a new value replaces the old one.

use assetgraph_store::{Batch, GraphStore, Literal, NodeId};

use crate::addr::stage_address;
use crate::edge::stage_edge;
use crate::error::{require, GraphError, Result};
use crate::event::stage_attribution;
use crate::netblock::stage_netblock;
use crate::node::{out_nodes, require_node, stage_node, NodeType};
use crate::property::{stage_single_value, string_values};
use crate::{pred, Graph};

/// Source credited with addresses found while mapping infrastructure.
pub const INFRASTRUCTURE_ADDR_SOURCE: &str = "DNS";

fn stage_as<S: GraphStore + ?Sized>(
    store: &S,
    batch: &mut Batch,
    asn: &str,
    desc: &str,
    source: &str,
    event: &str,
) -> Result<()> {
    stage_node(batch, asn, NodeType::As.as_str())?;
    if !desc.is_empty() {
        stage_single_value(store, batch, asn, pred::DESCRIPTION, Literal::from(desc))?;
    }
    stage_attribution(batch, asn, source, event)
}

impl<S: GraphStore> Graph<S> {
    pub fn upsert_as(&self, asn: u32, desc: &str, source: &str, event: &str) -> Result<NodeId> {
        require(source, "source")?;
        let id = asn.to_string();

        self.write_in_event(event, |store, batch| {
            stage_as(store, batch, &id, desc, source, event)
        })?;
        Ok(NodeId::from(id))
    }

    /// Address, netblock and AS in one write, linked
    /// `as -[prefix]-> cidr -[contains]-> addr`.
    pub fn upsert_infrastructure(
        &self,
        asn: u32,
        desc: &str,
        addr: &str,
        cidr: &str,
        source: &str,
        event: &str,
    ) -> Result<()> {
        require(addr, "address")?;
        require(cidr, "netblock")?;
        require(source, "source")?;
        let id = asn.to_string();

        self.write_in_event(event, |store, batch| {
            stage_address(batch, addr, INFRASTRUCTURE_ADDR_SOURCE, event)?;
            stage_netblock(batch, cidr, source, event)?;
            stage_edge(batch, pred::CONTAINS, cidr, addr)?;
            stage_as(store, batch, &id, desc, source, event)?;
            stage_edge(batch, pred::PREFIX, &id, cidr)
        })
    }

    pub fn read_as_description(&self, asn: u32) -> Result<String> {
        let id = asn.to_string();
        let store = self.lock();
        require_node(&*store, &id, Some(NodeType::As.as_str()))?;

        string_values(&*store, &id, pred::DESCRIPTION)
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::EmptyResult(format!("AS{asn} has no description")))
    }

    /// Netblocks announced by the AS.
    pub fn read_as_prefixes(&self, asn: u32) -> Result<Vec<NodeId>> {
        let id = asn.to_string();
        let store = self.lock();
        require_node(&*store, &id, Some(NodeType::As.as_str()))?;

        let prefixes = out_nodes(&*store, &id, &[pred::PREFIX]);
        if prefixes.is_empty() {
            return Err(GraphError::EmptyResult(format!("AS{asn} has no prefixes")));
        }
        Ok(prefixes)
    }
}

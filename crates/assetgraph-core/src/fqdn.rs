//! DNS names and the records between them.
//!
//! Every name is stored with its registrable domain and public suffix:
//!
//! ```text
//!   www.example.co.uk -[root]-> example.co.uk -[tld]-> co.uk
//! ```
//!
//! The triple is written on every insert, so a registrable domain carries a
//! `root` self loop and `is_root_domain_node` holds for it.

use assetgraph_store::{Batch, GraphStore, NodeId};

use crate::edge::stage_edge;
use crate::error::{require, GraphError, Result};
use crate::event::stage_attribution;
use crate::node::{stage_node, NodeType};
use crate::{pred, Graph};

/// The registrable domain (eTLD+1) of `name`.
pub fn registrable_domain(name: &str) -> Option<&str> {
    psl::domain_str(name)
}

/// The public suffix (eTLD) of `name`.
pub fn public_suffix(name: &str) -> Option<&str> {
    psl::suffix_str(name)
}

/// A name split into the three nodes the graph stores for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FqdnParts<'a> {
    pub name: &'a str,
    pub domain: &'a str,
    pub tld: &'a str,
}

impl<'a> FqdnParts<'a> {
    pub fn parse(name: &'a str) -> Result<Self> {
        let malformed = name.is_empty()
            || name.split('.').any(str::is_empty)
            || name.chars().any(char::is_whitespace);
        if malformed {
            return Err(GraphError::InvalidDomain(name.to_string()));
        }

        match (registrable_domain(name), public_suffix(name)) {
            (Some(domain), Some(tld)) if !domain.is_empty() && !tld.is_empty() => {
                Ok(Self { name, domain, tld })
            }
            _ => Err(GraphError::InvalidDomain(name.to_string())),
        }
    }
}

pub(crate) fn stage_fqdn(
    batch: &mut Batch,
    parts: &FqdnParts<'_>,
    source: &str,
    event: &str,
) -> Result<()> {
    let fqdn = NodeType::Fqdn.as_str();
    stage_node(batch, parts.name, fqdn)?;
    stage_node(batch, parts.domain, fqdn)?;
    stage_node(batch, parts.tld, fqdn)?;

    stage_edge(batch, pred::ROOT, parts.name, parts.domain)?;
    stage_edge(batch, pred::TLD, parts.domain, parts.tld)?;

    stage_attribution(batch, parts.name, source, event)?;
    stage_attribution(batch, parts.domain, source, event)?;
    stage_edge(batch, pred::DOMAIN, event, parts.domain)?;
    stage_attribution(batch, parts.tld, source, event)
}

/// Both names with their hierarchy, then `from -[predicate]-> to`.
pub(crate) fn stage_alias(
    batch: &mut Batch,
    from: &FqdnParts<'_>,
    to: &FqdnParts<'_>,
    predicate: &str,
    source: &str,
    event: &str,
) -> Result<()> {
    stage_fqdn(batch, from, source, event)?;
    stage_fqdn(batch, to, source, event)?;
    stage_edge(batch, predicate, from.name, to.name)
}

impl<S: GraphStore> Graph<S> {
    /// Insert a name with its domain and public suffix, attributed to `source`
    /// during `event`.
    pub fn upsert_fqdn(&self, name: &str, source: &str, event: &str) -> Result<NodeId> {
        require(source, "source")?;
        let parts = FqdnParts::parse(name)?;

        self.write_in_event(event, |_, batch| stage_fqdn(batch, &parts, source, event))?;
        Ok(NodeId::from(name))
    }

    fn upsert_alias(
        &self,
        fqdn: &str,
        target: &str,
        predicate: &str,
        source: &str,
        event: &str,
    ) -> Result<()> {
        require(source, "source")?;
        let from = FqdnParts::parse(fqdn)?;
        let to = FqdnParts::parse(target)?;

        self.write_in_event(event, |_, batch| {
            stage_alias(batch, &from, &to, predicate, source, event)
        })
    }

    pub fn upsert_cname(&self, fqdn: &str, target: &str, source: &str, event: &str) -> Result<()> {
        self.upsert_alias(fqdn, target, pred::CNAME_RECORD, source, event)
    }

    pub fn upsert_ptr(&self, fqdn: &str, target: &str, source: &str, event: &str) -> Result<()> {
        self.upsert_alias(fqdn, target, pred::PTR_RECORD, source, event)
    }

    pub fn upsert_ns(&self, fqdn: &str, target: &str, source: &str, event: &str) -> Result<()> {
        self.upsert_alias(fqdn, target, pred::NS_RECORD, source, event)
    }

    pub fn upsert_mx(&self, fqdn: &str, target: &str, source: &str, event: &str) -> Result<()> {
        self.upsert_alias(fqdn, target, pred::MX_RECORD, source, event)
    }

    /// `service -[service]-> fqdn` and `service -[srv_record]-> target`.
    pub fn upsert_srv(
        &self,
        fqdn: &str,
        service: &str,
        target: &str,
        source: &str,
        event: &str,
    ) -> Result<()> {
        require(source, "source")?;
        let subdomain = FqdnParts::parse(fqdn)?;
        let service = FqdnParts::parse(service)?;
        let target = FqdnParts::parse(target)?;

        self.write_in_event(event, |_, batch| {
            stage_alias(batch, &service, &subdomain, pred::SERVICE, source, event)?;
            stage_alias(batch, &service, &target, pred::SRV_RECORD, source, event)
        })
    }

    pub fn is_cname_node(&self, fqdn: &str) -> bool {
        self.has_fqdn_edge(fqdn, pred::CNAME_RECORD, true)
    }

    pub fn is_ptr_node(&self, fqdn: &str) -> bool {
        self.has_fqdn_edge(fqdn, pred::PTR_RECORD, true)
    }

    pub fn is_ns_node(&self, fqdn: &str) -> bool {
        self.has_fqdn_edge(fqdn, pred::NS_RECORD, false)
    }

    pub fn is_mx_node(&self, fqdn: &str) -> bool {
        self.has_fqdn_edge(fqdn, pred::MX_RECORD, false)
    }

    pub fn is_root_domain_node(&self, fqdn: &str) -> bool {
        self.has_fqdn_edge(fqdn, pred::ROOT, false)
    }

    pub fn is_tld_node(&self, fqdn: &str) -> bool {
        self.has_fqdn_edge(fqdn, pred::TLD, false)
    }

    fn has_fqdn_edge(&self, fqdn: &str, predicate: &str, outgoing: bool) -> bool {
        let store = self.lock();
        if !store.has_node(fqdn, Some(NodeType::Fqdn.as_str())) {
            return false;
        }
        if outgoing {
            store
                .out_facts(fqdn, &[predicate])
                .iter()
                .any(|(_, object)| object.as_node().is_some())
        } else {
            !store.in_facts(fqdn, &[predicate]).is_empty()
        }
    }
}

//! Netblocks (CIDR ranges).

use assetgraph_store::{Batch, GraphStore, NodeId};

use crate::error::{require, Result};
use crate::event::stage_attribution;
use crate::node::{stage_node, NodeType};
use crate::Graph;

pub(crate) fn stage_netblock(
    batch: &mut Batch,
    cidr: &str,
    source: &str,
    event: &str,
) -> Result<()> {
    stage_node(batch, cidr, NodeType::Netblock.as_str())?;
    stage_attribution(batch, cidr, source, event)
}

impl<S: GraphStore> Graph<S> {
    pub fn upsert_netblock(&self, cidr: &str, source: &str, event: &str) -> Result<NodeId> {
        require(cidr, "netblock")?;
        require(source, "source")?;

        self.write_in_event(event, |_, batch| stage_netblock(batch, cidr, source, event))?;
        Ok(NodeId::from(cidr))
    }
}

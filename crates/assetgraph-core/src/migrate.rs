//! Copying facts between graphs.
//!
//! Scoped migration takes the facts about the chosen events plus the facts
//! about every node those events name directly. Nodes two hops away are not
//! copied, so facts pointing at them are dropped on the target side by the
//! replication options rather than failing the copy.

use tokio_util::sync::CancellationToken;

use assetgraph_store::{replicate, GraphStore, Triple};

use crate::error::{GraphError, Result};
use crate::event::{collect_event_facts, events_owning};
use crate::{ensure_active, Graph};

fn copy_facts<T: GraphStore>(
    target: &Graph<T>,
    facts: Vec<Triple>,
    cancel: &CancellationToken,
) -> Result<usize> {
    if facts.is_empty() {
        return Err(GraphError::NothingToMigrate);
    }
    ensure_active(cancel)?;
    Ok(replicate(&mut *target.lock(), facts)?)
}

impl<S: GraphStore> Graph<S> {
    /// Copy every fact into `target`.
    pub fn migrate<T: GraphStore>(
        &self,
        target: &Graph<T>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        ensure_active(cancel)?;
        let facts = self.lock().triples();
        copy_facts(target, facts, cancel)
    }

    /// Copy the events' facts and the facts about the nodes they name.
    pub fn migrate_events<T: GraphStore>(
        &self,
        target: &Graph<T>,
        events: &[&str],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let facts = collect_event_facts(&*self.lock(), events, cancel)?;
        copy_facts(target, facts, cancel)
    }

    /// Migrate the events that include every one of `domains`.
    pub fn migrate_events_in_scope<T: GraphStore>(
        &self,
        target: &Graph<T>,
        domains: &[&str],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if domains.is_empty() {
            return Err(GraphError::InvalidArgument(
                "no domain names provided".to_string(),
            ));
        }
        ensure_active(cancel)?;

        let facts = {
            let store = self.lock();
            let events: Vec<String> = events_owning(&*store, domains)
                .into_iter()
                .map(|e| e.into_string())
                .collect();
            let events: Vec<&str> = events.iter().map(String::as_str).collect();
            collect_event_facts(&*store, &events, cancel)?
        };
        copy_facts(target, facts, cancel)
    }
}

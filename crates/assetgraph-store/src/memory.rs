//! In-memory triple store.
//!
//! Node-object facts are kept in forward and backward bitmap indexes keyed by
//! `(node, predicate)`; literal facts are kept per subject with a reverse
//! `(predicate, literal) -> subjects` index so type lookups do not scan.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::interner::{StrId, StringInterner};
use crate::{
    ApplyOptions, Batch, Delta, GraphStore, Literal, NodeId, StoreError, StoreResult, Term,
    Triple, PRED_TYPE,
};

type NodeIndex = AHashMap<StrId, AHashMap<StrId, RoaringBitmap>>;

pub struct MemoryStore {
    name: String,
    interner: StringInterner,
    /// subject -> predicate -> node objects
    out_nodes: NodeIndex,
    /// object -> predicate -> subjects
    in_nodes: NodeIndex,
    /// subject -> predicate -> literal values
    literals: AHashMap<StrId, AHashMap<StrId, BTreeSet<Literal>>>,
    /// (predicate, literal) -> subjects
    by_literal: AHashMap<(StrId, Literal), RoaringBitmap>,
    len: usize,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interner: StringInterner::new(),
            out_nodes: AHashMap::new(),
            in_nodes: AHashMap::new(),
            literals: AHashMap::new(),
            by_literal: AHashMap::new(),
            len: 0,
        }
    }

    fn resolve(&self, raw: u32) -> Option<String> {
        self.interner.lookup(StrId::new(raw))
    }

    /// `None` means "every predicate"; unknown predicates are dropped, so a
    /// filter naming only unknown predicates matches nothing.
    fn predicate_filter(&self, predicates: &[&str]) -> Option<HashSet<StrId>> {
        if predicates.is_empty() {
            return None;
        }
        Some(
            predicates
                .iter()
                .filter_map(|p| self.interner.id_of(p))
                .collect(),
        )
    }

    fn contains(&self, triple: &Triple) -> bool {
        let (Some(s), Some(p)) = (
            self.interner.id_of(triple.subject.as_str()),
            self.interner.id_of(&triple.predicate),
        ) else {
            return false;
        };

        match &triple.object {
            Term::Node(o) => {
                let Some(o) = self.interner.id_of(o.as_str()) else {
                    return false;
                };
                self.out_nodes
                    .get(&s)
                    .and_then(|by_pred| by_pred.get(&p))
                    .is_some_and(|objs| objs.contains(o.raw()))
            }
            Term::Literal(lit) => self
                .literals
                .get(&s)
                .and_then(|by_pred| by_pred.get(&p))
                .is_some_and(|vals| vals.contains(lit)),
        }
    }

    fn insert_triple(&mut self, triple: &Triple) -> bool {
        let s = self.interner.intern(triple.subject.as_str());
        let p = self.interner.intern(&triple.predicate);

        let added = match &triple.object {
            Term::Node(o) => {
                let o = self.interner.intern(o.as_str());
                let added = self
                    .out_nodes
                    .entry(s)
                    .or_default()
                    .entry(p)
                    .or_default()
                    .insert(o.raw());
                self.in_nodes
                    .entry(o)
                    .or_default()
                    .entry(p)
                    .or_default()
                    .insert(s.raw());
                added
            }
            Term::Literal(lit) => {
                let added = self
                    .literals
                    .entry(s)
                    .or_default()
                    .entry(p)
                    .or_default()
                    .insert(lit.clone());
                self.by_literal
                    .entry((p, lit.clone()))
                    .or_default()
                    .insert(s.raw());
                added
            }
        };

        if added {
            self.len += 1;
        }
        added
    }

    fn remove_triple(&mut self, triple: &Triple) -> bool {
        let (Some(s), Some(p)) = (
            self.interner.id_of(triple.subject.as_str()),
            self.interner.id_of(&triple.predicate),
        ) else {
            return false;
        };

        let removed = match &triple.object {
            Term::Node(o) => {
                let Some(o) = self.interner.id_of(o.as_str()) else {
                    return false;
                };
                let removed = remove_from_index(&mut self.out_nodes, s, p, o.raw());
                remove_from_index(&mut self.in_nodes, o, p, s.raw());
                removed
            }
            Term::Literal(lit) => {
                let mut removed = false;
                if let Some(by_pred) = self.literals.get_mut(&s) {
                    if let Some(vals) = by_pred.get_mut(&p) {
                        removed = vals.remove(lit);
                        if vals.is_empty() {
                            by_pred.remove(&p);
                        }
                    }
                    if by_pred.is_empty() {
                        self.literals.remove(&s);
                    }
                }
                let key = (p, lit.clone());
                if let Some(subjects) = self.by_literal.get_mut(&key) {
                    subjects.remove(s.raw());
                    if subjects.is_empty() {
                        self.by_literal.remove(&key);
                    }
                }
                removed
            }
        };

        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Validate every delta against the current contents before anything is
    /// mutated. The returned deltas are exactly the ones that change the store.
    fn plan(&self, batch: Batch, opts: ApplyOptions) -> StoreResult<(Vec<Delta>, usize)> {
        let introduced: HashSet<String> = batch
            .deltas()
            .iter()
            .filter_map(|d| match d {
                Delta::Insert(t) if t.is_type_fact() => Some(t.subject.as_str().to_string()),
                _ => None,
            })
            .collect();
        let node_known = |id: &str| introduced.contains(id) || self.has_node(id, None);

        let mut inserting: HashSet<Triple> = HashSet::new();
        let mut removing: HashSet<Triple> = HashSet::new();
        let mut planned = Vec::with_capacity(batch.len());
        let mut skipped = 0usize;

        for delta in batch.into_deltas() {
            match delta {
                Delta::Insert(triple) => {
                    let dangling = if !triple.is_type_fact() && !node_known(triple.subject.as_str())
                    {
                        Some(triple.subject.to_string())
                    } else {
                        triple
                            .object
                            .as_node()
                            .filter(|o| !node_known(o.as_str()))
                            .map(|o| o.to_string())
                    };
                    if let Some(node) = dangling {
                        if opts.ignore_missing {
                            skipped += 1;
                            continue;
                        }
                        return Err(StoreError::DanglingReference {
                            store: self.name.clone(),
                            node,
                            fact: triple.to_string(),
                        });
                    }

                    let present = inserting.contains(&triple)
                        || (self.contains(&triple) && !removing.contains(&triple));
                    if present {
                        if opts.ignore_duplicate {
                            continue;
                        }
                        return Err(StoreError::Duplicate {
                            store: self.name.clone(),
                            fact: triple.to_string(),
                        });
                    }

                    removing.remove(&triple);
                    inserting.insert(triple.clone());
                    planned.push(Delta::Insert(triple));
                }
                Delta::Remove(triple) => {
                    let present = inserting.contains(&triple)
                        || (self.contains(&triple) && !removing.contains(&triple));
                    if !present {
                        if opts.ignore_duplicate {
                            continue;
                        }
                        return Err(StoreError::Missing {
                            store: self.name.clone(),
                            fact: triple.to_string(),
                        });
                    }

                    inserting.remove(&triple);
                    removing.insert(triple.clone());
                    planned.push(Delta::Remove(triple));
                }
            }
        }

        Ok((planned, skipped))
    }

    /// Insert facts without validation. Used when restoring a snapshot that
    /// was produced by a consistent store.
    pub(crate) fn load_triples(&mut self, triples: impl IntoIterator<Item = Triple>) {
        for triple in triples {
            self.insert_triple(&triple);
        }
    }
}

fn remove_from_index(index: &mut NodeIndex, key: StrId, pred: StrId, value: u32) -> bool {
    let Some(by_pred) = index.get_mut(&key) else {
        return false;
    };
    let mut removed = false;
    if let Some(values) = by_pred.get_mut(&pred) {
        removed = values.remove(value);
        if values.is_empty() {
            by_pred.remove(&pred);
        }
    }
    if by_pred.is_empty() {
        index.remove(&key);
    }
    removed
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl fmt::Display for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("facts", &self.len)
            .finish()
    }
}

impl GraphStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, batch: Batch, opts: ApplyOptions) -> StoreResult<usize> {
        let (planned, skipped) = self.plan(batch, opts)?;
        if skipped > 0 {
            tracing::debug!(
                store = %self.name,
                skipped,
                "skipped facts referencing absent nodes"
            );
        }

        let mut changed = 0;
        for delta in &planned {
            let did = match delta {
                Delta::Insert(t) => self.insert_triple(t),
                Delta::Remove(t) => self.remove_triple(t),
            };
            if did {
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn has_triple(&self, triple: &Triple) -> bool {
        self.contains(triple)
    }

    fn node_types(&self, id: &str) -> Vec<String> {
        let (Some(s), Some(p)) = (self.interner.id_of(id), self.interner.id_of(PRED_TYPE)) else {
            return Vec::new();
        };
        self.literals
            .get(&s)
            .and_then(|by_pred| by_pred.get(&p))
            .map(|vals| {
                vals.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn out_facts(&self, subject: &str, predicates: &[&str]) -> Vec<(String, Term)> {
        let Some(s) = self.interner.id_of(subject) else {
            return Vec::new();
        };
        let filter = self.predicate_filter(predicates);
        let wanted = |p: &StrId| filter.as_ref().map_or(true, |f| f.contains(p));

        let mut out = Vec::new();
        if let Some(by_pred) = self.out_nodes.get(&s) {
            for (p, objects) in by_pred.iter().filter(|(p, _)| wanted(*p)) {
                let Some(pred) = self.interner.lookup(*p) else {
                    continue;
                };
                for raw in objects.iter() {
                    if let Some(o) = self.resolve(raw) {
                        out.push((pred.clone(), Term::Node(NodeId::new(o))));
                    }
                }
            }
        }
        if let Some(by_pred) = self.literals.get(&s) {
            for (p, vals) in by_pred.iter().filter(|(p, _)| wanted(*p)) {
                let Some(pred) = self.interner.lookup(*p) else {
                    continue;
                };
                for v in vals {
                    out.push((pred.clone(), Term::Literal(v.clone())));
                }
            }
        }

        out.sort();
        out
    }

    fn in_facts(&self, object: &str, predicates: &[&str]) -> Vec<(String, NodeId)> {
        let Some(o) = self.interner.id_of(object) else {
            return Vec::new();
        };
        let Some(by_pred) = self.in_nodes.get(&o) else {
            return Vec::new();
        };
        let filter = self.predicate_filter(predicates);

        let mut out = Vec::new();
        for (p, subjects) in by_pred {
            if filter.as_ref().is_some_and(|f| !f.contains(p)) {
                continue;
            }
            let Some(pred) = self.interner.lookup(*p) else {
                continue;
            };
            for raw in subjects.iter() {
                if let Some(s) = self.resolve(raw) {
                    out.push((pred.clone(), NodeId::new(s)));
                }
            }
        }

        out.sort();
        out
    }

    fn subjects_with(&self, predicate: &str, object: &Term) -> Vec<NodeId> {
        let Some(p) = self.interner.id_of(predicate) else {
            return Vec::new();
        };

        let subjects = match object {
            Term::Node(o) => {
                let Some(o) = self.interner.id_of(o.as_str()) else {
                    return Vec::new();
                };
                self.in_nodes.get(&o).and_then(|by_pred| by_pred.get(&p))
            }
            Term::Literal(lit) => self.by_literal.get(&(p, lit.clone())),
        };

        let mut out: Vec<NodeId> = subjects
            .map(|bits| {
                bits.iter()
                    .filter_map(|raw| self.resolve(raw))
                    .map(NodeId::new)
                    .collect()
            })
            .unwrap_or_default();
        out.sort();
        out
    }

    fn triples(&self) -> Vec<Triple> {
        let mut out = Vec::with_capacity(self.len);

        for (s, by_pred) in &self.out_nodes {
            let Some(subject) = self.interner.lookup(*s) else {
                continue;
            };
            for (p, objects) in by_pred {
                let Some(pred) = self.interner.lookup(*p) else {
                    continue;
                };
                for raw in objects.iter() {
                    if let Some(o) = self.resolve(raw) {
                        out.push(Triple::edge(subject.as_str(), pred.as_str(), o));
                    }
                }
            }
        }
        for (s, by_pred) in &self.literals {
            let Some(subject) = self.interner.lookup(*s) else {
                continue;
            };
            for (p, vals) in by_pred {
                let Some(pred) = self.interner.lookup(*p) else {
                    continue;
                };
                for v in vals {
                    out.push(Triple::new(
                        subject.as_str(),
                        pred.as_str(),
                        Term::Literal(v.clone()),
                    ));
                }
            }
        }

        out.sort();
        out
    }

    fn len(&self) -> usize {
        self.len
    }
}

//! String interning for node ids and predicates.
//!
//! Adjacency is kept as bitmaps over `u32` ids, so every node id and predicate
//! is stored once and referenced by its [`StrId`]. Ids are never recycled: a
//! removed node keeps its slot, which is harmless for a store whose lifetime
//! is one graph handle.
//!
//! The interner belongs to one [`crate::MemoryStore`] and is only mutated
//! through `&mut` access to it, so plain maps suffice.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Interned string ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// String interner: maps strings to compact IDs
#[derive(Debug, Default)]
pub struct StringInterner {
    str_to_id: AHashMap<String, StrId>,
    id_to_str: Vec<String>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its ID
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }

        let id = StrId(self.id_to_str.len() as u32);
        self.id_to_str.push(s.to_string());
        self.str_to_id.insert(s.to_string(), id);
        id
    }

    /// Look up an existing ID for a string without inserting.
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.str_to_id.get(s).copied()
    }

    /// Look up string by ID
    pub fn lookup(&self, id: StrId) -> Option<String> {
        self.id_to_str.get(id.raw() as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }
}

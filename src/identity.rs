//! Optimistic-to-real id mapping and parent bookkeeping for one comment thread
use crate::types::CommentId;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Identity continuity for ids that change from optimistic to server-confirmed.
///
/// Owned by a `ReconciliationSession`; entries live until the session is disposed.
#[derive(Debug, Default, Clone)]
pub struct IdentityMap {
    // Insertion order decides which alias `optimistic_aliases` yields first.
    optimistic_to_real: IndexMap<CommentId, CommentId>,
    parent_of: HashMap<CommentId, CommentId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_optimistic_to_real(&mut self, optimistic_id: CommentId, real_id: CommentId) {
        if let Some(previous) = self.optimistic_to_real.insert(optimistic_id, real_id) {
            if previous != real_id {
                log::warn!(
                    "IdentityMap: optimistic id {} remapped from {} to {}",
                    optimistic_id, previous, real_id
                );
            }
        }
    }

    pub fn resolve_id(&self, id: CommentId) -> CommentId {
        self.optimistic_to_real.get(&id).copied().unwrap_or(id)
    }

    /// Store `parent_id` for the child and for every other key the child is known under.
    pub fn record_parent_child(&mut self, child_id: CommentId, parent_id: CommentId) {
        self.parent_of.insert(child_id, parent_id);

        if let Some(&real_id) = self.optimistic_to_real.get(&child_id) {
            self.parent_of.insert(real_id, parent_id);
        }
        let aliases: Vec<CommentId> = self.optimistic_aliases(child_id).collect();
        for alias in aliases {
            self.parent_of.insert(alias, parent_id);
        }
    }

    pub fn lookup_parent(&self, id: CommentId) -> Option<CommentId> {
        self.parent_of
            .get(&id)
            .or_else(|| self.parent_of.get(&self.resolve_id(id)))
            .copied()
    }

    /// Optimistic ids that were confirmed as `real_id`, oldest first.
    pub fn optimistic_aliases(&self, real_id: CommentId) -> impl Iterator<Item = CommentId> + '_ {
        self.optimistic_to_real
            .iter()
            .filter(move |&(_, &real)| real == real_id)
            .map(|(&optimistic, _)| optimistic)
    }

    pub fn len(&self) -> usize {
        self.optimistic_to_real.len() + self.parent_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.optimistic_to_real.is_empty() && self.parent_of.is_empty()
    }

    pub fn clear(&mut self) {
        self.optimistic_to_real.clear();
        self.parent_of.clear();
    }
}

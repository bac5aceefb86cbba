//! Caller-owned reconciliation state, one per comment thread
use crate::identity::IdentityMap;
use crate::types::{Comment, CommentId};
use crate::walker;
use std::collections::HashMap;
use std::sync::Arc;

/// Identity continuity for one comment thread's UI session.
///
/// Every tree mutator is a method on the session so that optimistic ids
/// resolve consistently across calls. Call `dispose` when the thread is closed.
#[derive(Debug, Default)]
pub struct ReconciliationSession {
    pub(crate) identity: IdentityMap,
}

impl ReconciliationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn map_optimistic_to_real(&mut self, optimistic_id: CommentId, real_id: CommentId) {
        self.identity.map_optimistic_to_real(optimistic_id, real_id);
    }

    pub fn resolve_id(&self, id: CommentId) -> CommentId {
        self.identity.resolve_id(id)
    }

    pub fn record_parent_child(&mut self, child_id: CommentId, parent_id: CommentId) {
        self.identity.record_parent_child(child_id, parent_id);
    }

    pub fn lookup_parent(&self, id: CommentId) -> Option<CommentId> {
        self.identity.lookup_parent(id)
    }

    pub fn find<'t>(&self, tree: &'t [Arc<Comment>], id: CommentId) -> Option<&'t Comment> {
        walker::find(tree, id, &self.identity)
    }

    /// Forget every id mapping and parent relationship.
    pub fn dispose(&mut self) {
        log::debug!("ReconciliationSession: disposing {} identity entries", self.identity.len());
        self.identity.clear();
    }
}

/// Context key that always exists in a `SessionRegistry`.
pub const DEFAULT_CONTEXT: &str = "main";

/// Sessions keyed by comment thread, for hosts that juggle several threads at once.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<String, ReconciliationSession>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(DEFAULT_CONTEXT.to_string(), ReconciliationSession::new());
        SessionRegistry { sessions }
    }

    /// Session for `context_key`, created on first use.
    pub fn session(&mut self, context_key: &str) -> &mut ReconciliationSession {
        self.sessions.entry(context_key.to_string()).or_insert_with(|| {
            log::debug!("SessionRegistry: opening context '{}'", context_key);
            ReconciliationSession::new()
        })
    }

    pub fn get(&self, context_key: &str) -> Option<&ReconciliationSession> {
        self.sessions.get(context_key)
    }

    /// Dispose one context. The default context is emptied but kept.
    pub fn clear_context(&mut self, context_key: &str) -> bool {
        if context_key == DEFAULT_CONTEXT {
            if let Some(session) = self.sessions.get_mut(DEFAULT_CONTEXT) {
                session.dispose();
            }
            return true;
        }
        match self.sessions.remove(context_key) {
            Some(mut session) => {
                session.dispose();
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&mut self) {
        log::debug!("SessionRegistry: clearing all {} contexts", self.sessions.len());
        self.sessions.clear();
        self.sessions.insert(DEFAULT_CONTEXT.to_string(), ReconciliationSession::new());
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

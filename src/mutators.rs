//! Pure tree mutators driven by UI and network events
//!
//! Every mutator takes the current thread and returns a new one. Lookups that
//! fail degrade to a safe fallback (insert at top level, or return the input
//! unchanged) and are logged; nothing here can fail.
use crate::session::ReconciliationSession;
use crate::types::{Comment, CommentId, CommentOrigin, CommentPatch, CommentTree};
use crate::walker::{self, Visit};
use serde_json::Value;
use std::sync::Arc;

impl ReconciliationSession {
    /// Append `reply` under `parent_id`, or at the top of the thread when the parent is missing.
    pub fn insert_reply(&mut self, tree: &[Arc<Comment>], parent_id: CommentId, reply: Comment) -> CommentTree {
        let parent = self.identity.resolve_id(parent_id);
        self.identity.record_parent_child(reply.id, parent);

        if walker::find(tree, reply.id, &self.identity).is_some() {
            log::debug!("insert_reply: comment {} already present, skipping", reply.id);
            return tree.to_vec();
        }

        if walker::find(tree, parent_id, &self.identity).is_none() {
            log::warn!(
                "insert_reply: parent {} not found, inserting comment {} at top level",
                parent, reply.id
            );
            return prepend(tree, reply);
        }

        let reply = Arc::new(reply);
        let mut placed = false;
        walker::transform(tree, |node, _| {
            if placed || !walker::matches(node, parent_id, parent) {
                return Visit::Keep;
            }
            placed = true;
            let mut host = node.clone();
            host.replies.push(Arc::clone(&reply));
            Visit::Replace(host)
        })
    }

    /// Merge `updated` over the node it refers to, keeping the node's replies.
    ///
    /// An update whose origin names an optimistic placeholder also matches that
    /// placeholder, which then takes the resolved real id. When several nodes
    /// match (the real comment arrived over the socket before the create
    /// response), they collapse into the first one in preorder, which takes the
    /// union of their replies.
    pub fn update_node(&mut self, tree: &[Arc<Comment>], updated: &Comment) -> CommentTree {
        let real = self.identity.resolve_id(updated.id);
        let placeholder = updated.origin.optimistic_id();
        if let Some(optimistic_id) = placeholder {
            self.identity.map_optimistic_to_real(optimistic_id, real);
        }

        let is_target =
            |node: &Comment| node.id == real || node.id == updated.id || placeholder == Some(node.id);
        let targets = walker::filter(tree, is_target);
        if targets.is_empty() {
            log::debug!("update_node: comment {} not found, tree unchanged", real);
            return tree.to_vec();
        }

        let mut combined_replies = None;
        if targets.len() > 1 {
            log::warn!(
                "update_node: {} nodes stand for comment {}, collapsing into one",
                targets.len(),
                real
            );
            let mut replies = targets[0].replies.clone();
            for duplicate in &targets[1..] {
                for reply in &duplicate.replies {
                    if !replies.iter().any(|r| r.id == reply.id) {
                        replies.push(Arc::clone(reply));
                    }
                }
            }
            combined_replies = Some(replies);
        }

        let mut kept = false;
        walker::transform(tree, |node, _| {
            if !is_target(node) {
                return Visit::Keep;
            }
            if kept {
                return Visit::Drop;
            }
            kept = true;
            match combined_replies.take() {
                Some(replies) => {
                    let mut host = node.clone();
                    host.replies = replies;
                    Visit::Replace(merge_update(&host, updated, real))
                }
                None => Visit::Replace(merge_update(node, updated, real)),
            }
        })
    }

    /// Remove a comment and its subtree, looking at the top level first.
    pub fn remove_node(&self, tree: &[Arc<Comment>], id: CommentId) -> CommentTree {
        let real = self.identity.resolve_id(id);

        let top_level: CommentTree = tree
            .iter()
            .filter(|node| !walker::matches(node, id, real))
            .cloned()
            .collect();
        if top_level.len() != tree.len() {
            return top_level;
        }

        let mut removed = 0usize;
        let out = walker::transform(tree, |node, parent| {
            if parent.is_some() && walker::matches(node, id, real) {
                removed += 1;
                Visit::Drop
            } else {
                Visit::Keep
            }
        });
        if removed == 0 {
            log::debug!("remove_node: comment {} not found, tree unchanged", real);
        }
        out
    }

    /// Undo a pending optimistic edit. Comments without one are left as they are.
    pub fn revert(&self, tree: &[Arc<Comment>], id: CommentId) -> CommentTree {
        let real = self.identity.resolve_id(id);
        walker::transform(tree, |node, _| {
            if !walker::matches(node, id, real) {
                return Visit::Keep;
            }
            match &node.origin {
                CommentOrigin::OptimisticEdit { original_content } => {
                    let mut reverted = node.clone();
                    reverted.content = original_content.clone();
                    reverted.origin = CommentOrigin::Confirmed;
                    Visit::Replace(reverted)
                }
                _ => {
                    log::debug!("revert: comment {} has no pending edit", node.id);
                    Visit::Keep
                }
            }
        })
    }

    /// Show `content` locally before the server confirms the edit.
    pub fn apply_optimistic_edit(&self, tree: &[Arc<Comment>], id: CommentId, content: Value) -> CommentTree {
        let real = self.identity.resolve_id(id);
        walker::transform(tree, |node, _| {
            if !walker::matches(node, id, real) {
                return Visit::Keep;
            }
            let mut edited = node.clone();
            if !matches!(edited.origin, CommentOrigin::OptimisticEdit { .. }) {
                edited.origin = CommentOrigin::OptimisticEdit {
                    original_content: node.content.clone(),
                };
            }
            edited.content = content.clone();
            Visit::Replace(edited)
        })
    }

    /// Fold a comment returned by the server (create, edit or socket event) into the thread.
    pub fn merge_server_response(&mut self, tree: &[Arc<Comment>], updated: &Comment) -> CommentTree {
        let real = self.identity.resolve_id(updated.id);
        let parent = updated.parent_id.map(|p| self.identity.resolve_id(p));
        if let Some(parent) = parent {
            self.identity.record_parent_child(real, parent);
        }

        // Known comment being refreshed.
        if walker::find(tree, real, &self.identity).is_some() {
            return self.update_node(tree, updated);
        }

        // Confirmation of a placeholder we rendered earlier.
        let candidates: Vec<CommentId> = self
            .identity
            .optimistic_aliases(real)
            .chain(updated.origin.optimistic_id())
            .collect();
        for optimistic_id in candidates {
            if walker::find(tree, optimistic_id, &self.identity).is_some() {
                log::debug!(
                    "merge_server_response: replacing placeholder {} with comment {}",
                    optimistic_id, real
                );
                let mut replacement = updated.clone();
                replacement.id = real;
                replacement.origin = CommentOrigin::PendingReplacement { optimistic_id };
                return self.update_node(tree, &replacement);
            }
        }

        // Never seen on this client.
        let mut fresh = updated.clone();
        fresh.id = real;
        match parent {
            Some(parent) => {
                let already_listed = walker::find(tree, parent, &self.identity)
                    .is_some_and(|host| host.replies.iter().any(|r| r.id == real));
                if already_listed {
                    log::debug!("merge_server_response: {} already listed under {}", real, parent);
                    return tree.to_vec();
                }
                self.insert_reply(tree, parent, fresh)
            }
            None => {
                if tree.iter().any(|node| node.id == real) {
                    log::debug!("merge_server_response: {} already at top level", real);
                    return tree.to_vec();
                }
                prepend(tree, fresh)
            }
        }
    }

    /// Shallow-merge a vote (or any partial field update) onto a comment.
    pub fn update_vote(&self, tree: &[Arc<Comment>], id: CommentId, patch: &CommentPatch) -> CommentTree {
        let real = self.identity.resolve_id(id);
        let mut hits = 0usize;
        let out = walker::transform(tree, |node, _| {
            if !walker::matches(node, id, real) {
                return Visit::Keep;
            }
            hits += 1;
            let mut voted = node.clone();
            patch.apply_to(&mut voted);
            Visit::Replace(voted)
        });
        if hits == 0 {
            log::debug!("update_vote: comment {} not found, tree unchanged", real);
        }
        out
    }
}

fn prepend(tree: &[Arc<Comment>], comment: Comment) -> CommentTree {
    let mut out = Vec::with_capacity(tree.len() + 1);
    out.push(Arc::new(comment));
    out.extend(tree.iter().cloned());
    out
}

fn merge_update(existing: &Comment, update: &Comment, real: CommentId) -> Comment {
    let mut merged = existing.clone();
    merged.id = real;
    if update.parent_id.is_some() {
        merged.parent_id = update.parent_id;
    }
    if !update.content.is_null() {
        merged.content = update.content.clone();
    }
    merged.origin = match (&existing.origin, &update.origin) {
        (CommentOrigin::PendingReplacement { .. }, CommentOrigin::Confirmed) => existing.origin.clone(),
        (_, incoming) => incoming.clone(),
    };
    merged
        .metadata
        .extend(update.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
        .fields
        .extend(update.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    // An update never erases children it does not carry.
    if existing.replies.is_empty() {
        merged.replies = update.replies.clone();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(id: i64) -> Comment {
        Comment::new(id)
    }

    fn tree_of(nodes: impl IntoIterator<Item = Comment>) -> CommentTree {
        nodes.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn insert_appends_to_parent() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1)]);
        let out = session.insert_reply(&tree, CommentId(1), leaf(2));
        assert_eq!(out, tree_of([leaf(1).with_replies([leaf(2)])]));
        assert_eq!(session.lookup_parent(CommentId(2)), Some(CommentId(1)));
    }

    #[test]
    fn insert_resolves_optimistic_parent() {
        let mut session = ReconciliationSession::new();
        session.map_optimistic_to_real(CommentId(-1), CommentId(10));
        let tree = tree_of([leaf(10)]);
        let out = session.insert_reply(&tree, CommentId(-1), leaf(11));
        assert_eq!(out[0].replies.len(), 1);
        assert_eq!(out[0].replies[0].id, CommentId(11));
    }

    #[test]
    fn insert_only_into_first_matching_parent() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([leaf(5)]), leaf(2).with_replies([leaf(5)])]);
        let out = session.insert_reply(&tree, CommentId(5), leaf(6));
        assert_eq!(out[0].replies[0].replies.len(), 1);
        assert!(out[1].replies[0].replies.is_empty());
    }

    #[test]
    fn update_keeps_existing_replies() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_content(json!("old")).with_replies([leaf(2), leaf(3)])]);
        let update = leaf(1).with_content(json!("new")).with_replies([leaf(9)]);
        let out = session.update_node(&tree, &update);
        assert_eq!(out[0].content, json!("new"));
        let reply_ids: Vec<_> = out[0].replies.iter().map(|r| r.id.0).collect();
        assert_eq!(reply_ids, vec![2, 3]);
    }

    #[test]
    fn update_takes_incoming_replies_when_node_has_none() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1)]);
        let out = session.update_node(&tree, &leaf(1).with_replies([leaf(4)]));
        assert_eq!(out[0].replies.len(), 1);
    }

    #[test]
    fn update_merges_fields_and_keeps_null_content() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1)
            .with_content(json!("body"))
            .with_field("score", json!(1))
            .with_field("author", json!("ada"))]);
        let out = session.update_node(&tree, &leaf(1).with_field("score", json!(2)));
        assert_eq!(out[0].content, json!("body"));
        assert_eq!(out[0].fields.get("score"), Some(&json!(2)));
        assert_eq!(out[0].fields.get("author"), Some(&json!("ada")));
    }

    #[test]
    fn update_of_missing_node_is_a_no_op() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1)]);
        assert_eq!(session.update_node(&tree, &leaf(7)), tree);
    }

    #[test]
    fn update_swaps_placeholder_identity() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(-3).with_replies([leaf(4)])]);
        let update = leaf(30).with_origin(CommentOrigin::PendingReplacement {
            optimistic_id: CommentId(-3),
        });
        let out = session.update_node(&tree, &update);
        assert_eq!(out[0].id, CommentId(30));
        assert_eq!(out[0].replies.len(), 1);
        assert_eq!(session.resolve_id(CommentId(-3)), CommentId(30));
    }

    #[test]
    fn update_collapses_placeholder_and_real_node() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([
            leaf(-5).with_replies([leaf(6)]),
            leaf(100).with_replies([leaf(7), leaf(6)]),
        ])]);
        let update = leaf(100).with_parent(1).with_origin(CommentOrigin::PendingReplacement {
            optimistic_id: CommentId(-5),
        });

        let out = session.update_node(&tree, &update);
        assert_eq!(out[0].replies.len(), 1);
        let merged = &out[0].replies[0];
        assert_eq!(merged.id, CommentId(100));
        let reply_ids: Vec<_> = merged.replies.iter().map(|r| r.id.0).collect();
        assert_eq!(reply_ids, vec![6, 7]);
    }

    #[test]
    fn remove_nested_reply() {
        let session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([leaf(2)])]);
        let out = session.remove_node(&tree, CommentId(2));
        assert_eq!(out, tree_of([leaf(1)]));
    }

    #[test]
    fn remove_top_level_leaves_nested_duplicates() {
        let session = ReconciliationSession::new();
        let tree = tree_of([leaf(1), leaf(2).with_replies([leaf(1)])]);
        let out = session.remove_node(&tree, CommentId(1));
        assert_eq!(out, tree_of([leaf(2).with_replies([leaf(1)])]));
    }

    #[test]
    fn remove_missing_returns_same_tree() {
        let session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([leaf(2)])]);
        assert_eq!(session.remove_node(&tree, CommentId(8)), tree);
    }

    #[test]
    fn edit_then_revert_restores_content() {
        let session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([leaf(5).with_content(json!("first"))])]);

        let edited = session.apply_optimistic_edit(&tree, CommentId(5), json!("second"));
        let edited = session.apply_optimistic_edit(&edited, CommentId(5), json!("third"));
        assert_eq!(edited[0].replies[0].content, json!("third"));
        assert_eq!(
            edited[0].replies[0].origin,
            CommentOrigin::OptimisticEdit { original_content: json!("first") }
        );

        let reverted = session.revert(&edited, CommentId(5));
        assert_eq!(reverted, tree);
    }

    #[test]
    fn revert_without_pending_edit_is_unchanged() {
        let session = ReconciliationSession::new();
        let tree = tree_of([leaf(5).with_content(json!("kept"))]);
        let out = session.revert(&tree, CommentId(5));
        assert_eq!(out, tree);
        assert!(Arc::ptr_eq(&out[0], &tree[0]));
    }

    #[test]
    fn vote_patch_is_shallow() {
        let session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([leaf(2).with_field("score", json!(0))])]);
        let mut patch = CommentPatch::field("score", json!(1));
        patch.fields.insert("userVote".into(), json!({"voteType": "upvote"}));
        let out = session.update_vote(&tree, CommentId(2), &patch);
        let reply = &out[0].replies[0];
        assert_eq!(reply.fields.get("score"), Some(&json!(1)));
        assert_eq!(reply.fields.get("userVote"), Some(&json!({"voteType": "upvote"})));
    }

    #[test]
    fn merge_refreshes_known_comment() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1).with_replies([leaf(2).with_content(json!("a"))])]);
        let out = session.merge_server_response(&tree, &leaf(2).with_parent(1).with_content(json!("b")));
        assert_eq!(out[0].replies.len(), 1);
        assert_eq!(out[0].replies[0].content, json!("b"));
    }

    #[test]
    fn merge_inserts_new_reply_under_parent() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1)]);
        let out = session.merge_server_response(&tree, &leaf(2).with_parent(1));
        assert_eq!(out[0].replies[0].id, CommentId(2));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn merge_prepends_new_root_comment_once() {
        let mut session = ReconciliationSession::new();
        let tree = tree_of([leaf(1)]);
        let out = session.merge_server_response(&tree, &leaf(2));
        let ids: Vec<_> = out.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![2, 1]);

        let again = session.merge_server_response(&out, &leaf(2));
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn merge_replaces_placeholder_found_through_alias() {
        let mut session = ReconciliationSession::new();
        session.map_optimistic_to_real(CommentId(-8), CommentId(80));
        let tree = tree_of([leaf(1).with_replies([leaf(-8).with_content(json!("draft"))])]);

        let out = session.merge_server_response(&tree, &leaf(80).with_parent(1).with_content(json!("posted")));
        let reply = &out[0].replies[0];
        assert_eq!(out[0].replies.len(), 1);
        assert_eq!(reply.id, CommentId(80));
        assert_eq!(reply.content, json!("posted"));
        assert_eq!(
            reply.origin,
            CommentOrigin::PendingReplacement { optimistic_id: CommentId(-8) }
        );
    }
}

//! Depth-first traversal and path-copying transforms over a comment tree
use crate::identity::IdentityMap;
use crate::types::{Comment, CommentId, CommentTree};
use std::sync::Arc;

/// What `transform` does with a visited node.
#[derive(Debug)]
pub enum Visit {
    /// Keep the node; its replies are still visited.
    Keep,
    /// Put this comment in the node's place and visit its replies.
    Replace(Comment),
    /// Remove the node together with its whole subtree.
    Drop,
}

/// Build a new tree by visiting every node depth-first, in order.
///
/// The input is never modified. Subtrees where every visit returned `Keep`
/// are shared with the input, so only the paths leading to a change are copied.
pub fn transform<F>(tree: &[Arc<Comment>], mut visit: F) -> CommentTree
where
    F: FnMut(&Comment, Option<&Comment>) -> Visit,
{
    transform_level(tree, None, &mut visit).unwrap_or_else(|| tree.to_vec())
}

/// Returns `None` when nothing at or below this level changed.
fn transform_level<F>(
    nodes: &[Arc<Comment>],
    parent: Option<&Comment>,
    visit: &mut F,
) -> Option<CommentTree>
where
    F: FnMut(&Comment, Option<&Comment>) -> Visit,
{
    let mut rebuilt: Option<CommentTree> = None;

    for (idx, node) in nodes.iter().enumerate() {
        let next = match visit(node.as_ref(), parent) {
            Visit::Drop => None,
            Visit::Keep => Some(match transform_level(&node.replies, Some(node.as_ref()), visit) {
                Some(replies) => {
                    let mut copy = Comment::clone(node);
                    copy.replies = replies;
                    Arc::new(copy)
                }
                None => Arc::clone(node),
            }),
            Visit::Replace(mut replacement) => {
                if let Some(replies) = transform_level(&replacement.replies, Some(&replacement), visit) {
                    replacement.replies = replies;
                }
                Some(Arc::new(replacement))
            }
        };

        let unchanged = matches!(&next, Some(kept) if Arc::ptr_eq(kept, node));
        if rebuilt.is_none() && !unchanged {
            rebuilt = Some(nodes[..idx].to_vec());
        }
        if let (Some(out), Some(next)) = (rebuilt.as_mut(), next) {
            out.push(next);
        }
    }

    rebuilt
}

/// Whether `node` is the comment sought as `sought`, whose resolved id is `real`.
pub fn matches(node: &Comment, sought: CommentId, real: CommentId) -> bool {
    node.id == real || node.id == sought || node.origin.optimistic_id() == Some(sought)
}

/// First node, in preorder, that matches `id` under the session's identity map.
pub fn find<'t>(tree: &'t [Arc<Comment>], id: CommentId, identity: &IdentityMap) -> Option<&'t Comment> {
    let real = identity.resolve_id(id);
    find_in(tree, None, id, real, identity)
}

fn find_in<'t>(
    nodes: &'t [Arc<Comment>],
    parent: Option<CommentId>,
    sought: CommentId,
    real: CommentId,
    identity: &IdentityMap,
) -> Option<&'t Comment> {
    for node in nodes {
        if matches(node, sought, real) {
            check_recorded_parent(identity, real, parent);
            return Some(node.as_ref());
        }
        if let Some(found) = find_in(&node.replies, Some(node.id), sought, real, identity) {
            return Some(found);
        }
    }
    None
}

/// Every node satisfying `pred`, in preorder. Matched nodes are still descended into.
pub fn filter<'t, P>(tree: &'t [Arc<Comment>], mut pred: P) -> Vec<&'t Comment>
where
    P: FnMut(&Comment) -> bool,
{
    let mut out = Vec::new();
    filter_in(tree, &mut pred, &mut out);
    out
}

fn filter_in<'t, P>(nodes: &'t [Arc<Comment>], pred: &mut P, out: &mut Vec<&'t Comment>)
where
    P: FnMut(&Comment) -> bool,
{
    for node in nodes {
        if pred(node.as_ref()) {
            out.push(node.as_ref());
        }
        filter_in(&node.replies, pred, out);
    }
}

// A match whose position disagrees with the recorded parent usually means two
// branches carry the same id.
fn check_recorded_parent(identity: &IdentityMap, real: CommentId, found_under: Option<CommentId>) {
    let Some(recorded) = identity.lookup_parent(real) else {
        return;
    };
    let actual = found_under.map(|p| identity.resolve_id(p));
    if actual != Some(recorded) {
        log::warn!(
            "find: comment {} found under {:?} but its recorded parent is {}",
            real, actual, recorded
        );
    }
}

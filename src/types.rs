//! Comment data model shared by the walker, the mutators and the bindings
use crate::converters::WireComment;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Numeric comment identifier. Server ids are positive, optimistic ids negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl From<i64> for CommentId {
    fn from(id: i64) -> Self {
        CommentId(id)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Top-level ordered sequence of a comment thread.
pub type CommentTree = Vec<Arc<Comment>>;

/// Where a comment's current state came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CommentOrigin {
    #[default]
    Confirmed,
    /// Server-confirmed comment that is, or replaced, the placeholder `optimistic_id`.
    PendingReplacement { optimistic_id: CommentId },
    /// Local edit not yet confirmed; `original_content` is what `revert` restores.
    OptimisticEdit { original_content: Value },
}

impl CommentOrigin {
    pub fn optimistic_id(&self) -> Option<CommentId> {
        match self {
            CommentOrigin::PendingReplacement { optimistic_id } => Some(*optimistic_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireComment", into = "WireComment")]
pub struct Comment {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,
    pub content: Value,
    pub origin: CommentOrigin,
    /// Metadata keys other than the origin flags.
    pub metadata: IndexMap<String, Value>,
    pub replies: Vec<Arc<Comment>>,
    /// Remaining backend fields (author, score, userVote, createdDate, ...).
    pub fields: IndexMap<String, Value>,
}

impl Comment {
    pub fn new(id: i64) -> Self {
        Comment {
            id: CommentId(id),
            ..Comment::default()
        }
    }

    /// A local placeholder carrying a fresh optimistic id.
    pub fn optimistic(content: Value) -> Self {
        Comment::new(next_optimistic_id().0).with_content(content)
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(CommentId(parent_id));
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_origin(mut self, origin: CommentOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_replies(mut self, replies: impl IntoIterator<Item = Comment>) -> Self {
        self.replies = replies.into_iter().map(Arc::new).collect();
        self
    }
}

/// Keys that belong to the comment's structure and are never merged from a patch.
pub(crate) const RESERVED_KEYS: [&str; 5] = ["id", "parentId", "content", "metadata", "replies"];

/// Partial update applied by `update_vote`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

impl CommentPatch {
    pub fn field(key: impl Into<String>, value: Value) -> Self {
        let mut patch = CommentPatch::default();
        patch.fields.insert(key.into(), value);
        patch
    }

    pub(crate) fn apply_to(&self, comment: &mut Comment) {
        if let Some(content) = &self.content {
            comment.content = content.clone();
        }
        for (key, value) in &self.fields {
            if RESERVED_KEYS.contains(&key.as_str()) {
                log::debug!("CommentPatch: ignoring reserved key '{}' for comment {}", key, comment.id);
                continue;
            }
            comment.fields.insert(key.clone(), value.clone());
        }
    }
}

/// Process-wide optimistic id generator (lock-free, atomic)
static NEXT_OPTIMISTIC_ID: AtomicI64 = AtomicI64::new(-1);

pub fn next_optimistic_id() -> CommentId {
    CommentId(NEXT_OPTIMISTIC_ID.fetch_sub(1, Ordering::SeqCst))
}

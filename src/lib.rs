//! Optimistic comment-thread reconciliation.
//!
//! A comment thread is rendered before the server has confirmed every change:
//! new replies carry temporary negative ids, edits show up before they are
//! saved, and votes are applied locally. [`ReconciliationSession`] keeps the
//! mapping from those temporary ids to server ids and exposes pure mutators
//! that fold each local or server event into a new [`CommentTree`].
//!
//! ```
//! use comment_reconciler::{Comment, CommentId, ReconciliationSession};
//! use std::sync::Arc;
//!
//! let mut session = ReconciliationSession::new();
//! let tree = vec![Arc::new(Comment::new(1))];
//! let tree = session.insert_reply(&tree, CommentId(1), Comment::new(-1));
//!
//! session.map_optimistic_to_real(CommentId(-1), CommentId(2));
//! let tree = session.merge_server_response(&tree, &Comment::new(2).with_parent(1));
//! assert_eq!(tree[0].replies[0].id, CommentId(2));
//! ```
mod converters;
mod errors;
mod identity;
mod mutators;
mod session;
mod types;
pub mod walker;

#[cfg(feature = "python")]
mod bindings;

pub use converters::{comment_from_value, tree_from_value, tree_to_value};
pub use errors::ReconcilerError;
pub use identity::IdentityMap;
pub use session::{DEFAULT_CONTEXT, ReconciliationSession, SessionRegistry};
pub use types::{Comment, CommentId, CommentOrigin, CommentPatch, CommentTree, next_optimistic_id};
pub use walker::Visit;

//! Conversions between the backend's loose JSON comment shape and the typed model
use crate::errors::ReconcilerError;
use crate::types::{Comment, CommentId, CommentOrigin, CommentTree};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Comment exactly as the API and the notification socket deliver it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireComment {
    id: CommentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<CommentId>,
    #[serde(default)]
    content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<WireMetadata>,
    #[serde(default)]
    replies: Vec<Arc<Comment>>,
    #[serde(flatten)]
    fields: IndexMap<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_optimistic_id: Option<CommentId>,
    #[serde(default, skip_serializing_if = "is_false")]
    was_optimistic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    is_optimistic_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_content: Option<Value>,
    #[serde(flatten)]
    extra: IndexMap<String, Value>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl WireMetadata {
    fn is_empty(&self) -> bool {
        self.original_optimistic_id.is_none()
            && !self.was_optimistic
            && !self.is_optimistic_update
            && self.original_content.is_none()
            && self.extra.is_empty()
    }

    fn into_origin(self, id: CommentId) -> Result<(CommentOrigin, IndexMap<String, Value>), ReconcilerError> {
        let origin = if self.is_optimistic_update {
            let original_content = self.original_content.ok_or_else(|| ReconcilerError::InvalidMetadata {
                id: id.0,
                details: "isOptimisticUpdate is set without originalContent".into(),
            })?;
            if self.original_optimistic_id.is_some() {
                log::debug!("converters: comment {} has a pending edit, dropping originalOptimisticId", id);
            }
            CommentOrigin::OptimisticEdit { original_content }
        } else if let Some(optimistic_id) = self.original_optimistic_id {
            CommentOrigin::PendingReplacement { optimistic_id }
        } else {
            CommentOrigin::Confirmed
        };
        Ok((origin, self.extra))
    }

    fn from_origin(origin: CommentOrigin, extra: IndexMap<String, Value>) -> Self {
        let mut metadata = WireMetadata {
            extra,
            ..WireMetadata::default()
        };
        match origin {
            CommentOrigin::Confirmed => {}
            CommentOrigin::PendingReplacement { optimistic_id } => {
                metadata.original_optimistic_id = Some(optimistic_id);
                metadata.was_optimistic = true;
            }
            CommentOrigin::OptimisticEdit { original_content } => {
                metadata.is_optimistic_update = true;
                metadata.original_content = Some(original_content);
            }
        }
        metadata
    }
}

impl TryFrom<WireComment> for Comment {
    type Error = ReconcilerError;

    fn try_from(wire: WireComment) -> Result<Self, Self::Error> {
        let (origin, metadata) = match wire.metadata {
            Some(bag) => bag.into_origin(wire.id)?,
            None => (CommentOrigin::Confirmed, IndexMap::new()),
        };
        Ok(Comment {
            id: wire.id,
            parent_id: wire.parent_id,
            content: wire.content,
            origin,
            metadata,
            replies: wire.replies,
            fields: wire.fields,
        })
    }
}

impl From<Comment> for WireComment {
    fn from(comment: Comment) -> Self {
        let metadata = WireMetadata::from_origin(comment.origin, comment.metadata);
        WireComment {
            id: comment.id,
            parent_id: comment.parent_id,
            content: comment.content,
            metadata: (!metadata.is_empty()).then_some(metadata),
            replies: comment.replies,
            fields: comment.fields,
        }
    }
}

/// Parse a single comment payload (e.g. a socket event body).
pub fn comment_from_value(value: Value) -> Result<Comment, ReconcilerError> {
    Ok(serde_json::from_value(value)?)
}

/// Parse a thread as returned by the comments endpoint.
pub fn tree_from_value(value: Value) -> Result<CommentTree, ReconcilerError> {
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        other => Err(ReconcilerError::TypeConversionError {
            expected: "array of comments".into(),
            actual: json_kind(&other).into(),
        }),
    }
}

pub fn tree_to_value(tree: &[Arc<Comment>]) -> Result<Value, ReconcilerError> {
    Ok(serde_json::to_value(tree)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(feature = "python")]
pub use self::python::{python_to_json, to_python};

#[cfg(feature = "python")]
mod python {
    use crate::errors::ReconcilerError;
    use pyo3::prelude::*;
    use pyo3::types::PyModule;
    use serde::Serialize;

    /// Convert a Python object to JSON through the stdlib `json` module
    pub fn python_to_json<'py>(
        py: Python<'py>,
        obj: &Bound<'py, PyAny>,
    ) -> Result<serde_json::Value, ReconcilerError> {
        let json_mod = PyModule::import(py, "json")?;
        let dumped = json_mod.getattr("dumps")?.call1((obj,))?;
        let s: String = dumped.extract()?;
        serde_json::from_str(&s).map_err(|e| ReconcilerError::TypeConversionError {
            expected: "JSON-serializable comment payload".into(),
            actual: e.to_string(),
        })
    }

    /// Hand a thread, a comment or any wire value back to Python as plain lists and dicts
    pub fn to_python<'py, T>(py: Python<'py>, value: &T) -> Result<Bound<'py, PyAny>, ReconcilerError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value)?;
        let json_mod = PyModule::import(py, "json")?;
        Ok(json_mod.getattr("loads")?.call1((encoded,))?)
    }

}

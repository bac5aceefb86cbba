//! Python module entry point: one `CommentReconciler` per host process
use crate::converters::{python_to_json, to_python};
use crate::errors::ReconcilerError;
use crate::session::{ReconciliationSession, SessionRegistry};
use crate::types::{Comment, CommentId, CommentPatch, CommentTree};
use crate::tree_from_value;
use pyo3::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};

#[pyclass]
pub struct CommentReconciler {
    registry: Arc<Mutex<SessionRegistry>>,
}

#[pymethods]
impl CommentReconciler {
    #[new]
    fn new() -> Self {
        log::info!("CommentReconciler: initialized");
        CommentReconciler {
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
        }
    }

    #[staticmethod]
    fn next_optimistic_id() -> i64 {
        crate::types::next_optimistic_id().0
    }

    fn clear_context(&self, context_key: &str) -> PyResult<bool> {
        Ok(self.lock()?.clear_context(context_key))
    }

    fn clear_all_contexts(&self) -> PyResult<()> {
        self.lock()?.clear_all();
        Ok(())
    }

    fn map_optimistic_to_real(&self, context_key: &str, optimistic_id: i64, real_id: i64) -> PyResult<()> {
        self.lock()?
            .session(context_key)
            .map_optimistic_to_real(CommentId(optimistic_id), CommentId(real_id));
        Ok(())
    }

    fn resolve_id(&self, context_key: &str, id: i64) -> PyResult<i64> {
        Ok(self.lock()?.session(context_key).resolve_id(CommentId(id)).0)
    }

    fn lookup_parent(&self, context_key: &str, id: i64) -> PyResult<Option<i64>> {
        Ok(self.lock()?.session(context_key).lookup_parent(CommentId(id)).map(|p| p.0))
    }

    fn find<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        id: i64,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        let mut registry = self.lock()?;
        match registry.session(context_key).find(&tree, CommentId(id)) {
            Some(found) => Ok(to_python(py, found)?),
            None => Ok(py.None().into_bound(py)),
        }
    }

    fn insert_reply<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        parent_id: i64,
        reply: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        let reply = read_comment(py, reply)?;
        self.with_session(py, context_key, |session| {
            session.insert_reply(&tree, CommentId(parent_id), reply)
        })
    }

    fn update_node<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        updated: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        let updated = read_comment(py, updated)?;
        self.with_session(py, context_key, |session| session.update_node(&tree, &updated))
    }

    fn remove_node<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        id: i64,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        self.with_session(py, context_key, |session| session.remove_node(&tree, CommentId(id)))
    }

    fn revert<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        id: i64,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        self.with_session(py, context_key, |session| session.revert(&tree, CommentId(id)))
    }

    fn apply_optimistic_edit<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        id: i64,
        content: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        let content = python_to_json(py, content)?;
        self.with_session(py, context_key, |session| {
            session.apply_optimistic_edit(&tree, CommentId(id), content)
        })
    }

    fn merge_server_response<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        updated: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        let updated = read_comment(py, updated)?;
        self.with_session(py, context_key, |session| {
            session.merge_server_response(&tree, &updated)
        })
    }

    fn update_vote<'py>(
        &self,
        py: Python<'py>,
        context_key: &str,
        tree: &Bound<'py, PyAny>,
        id: i64,
        patch: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let tree = read_tree(py, tree)?;
        let patch: CommentPatch =
            serde_json::from_value(python_to_json(py, patch)?).map_err(ReconcilerError::from)?;
        self.with_session(py, context_key, |session| {
            session.update_vote(&tree, CommentId(id), &patch)
        })
    }
}

// Rust-only helpers not exposed to Python
impl CommentReconciler {
    fn lock(&self) -> Result<MutexGuard<'_, SessionRegistry>, ReconcilerError> {
        self.registry.lock().map_err(|_| ReconcilerError::RegistryPoisoned)
    }

    fn with_session<'py, F>(&self, py: Python<'py>, context_key: &str, op: F) -> PyResult<Bound<'py, PyAny>>
    where
        F: FnOnce(&mut ReconciliationSession) -> CommentTree,
    {
        let tree = {
            let mut registry = self.lock()?;
            op(registry.session(context_key))
        };
        Ok(to_python(py, &tree)?)
    }
}

fn read_tree<'py>(py: Python<'py>, obj: &Bound<'py, PyAny>) -> Result<CommentTree, ReconcilerError> {
    tree_from_value(python_to_json(py, obj)?)
}

fn read_comment<'py>(py: Python<'py>, obj: &Bound<'py, PyAny>) -> Result<Comment, ReconcilerError> {
    crate::comment_from_value(python_to_json(py, obj)?)
}

#[pymodule]
fn comment_reconciler(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<CommentReconciler>()?;
    m.add("DEFAULT_CONTEXT", crate::session::DEFAULT_CONTEXT)?;
    Ok(())
}

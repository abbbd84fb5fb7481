//! Type-erased handle to a backend-native series embedded in an expression.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use common_config::BackendKind;

/// A native series captured by an expression tree.
///
/// Expression trees are backend-neutral, so the series is stored behind
/// `dyn Any` together with the backend that owns it. Translation downcasts
/// it back for the matching backend; handles are compared by identity.
#[derive(Clone)]
pub struct SeriesRef {
    kind: BackendKind,
    name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl SeriesRef {
    /// Wrap a native series owned by `kind`.
    pub fn new<S: Any + Send + Sync>(kind: BackendKind, name: impl Into<String>, series: S) -> Self {
        Self {
            kind,
            name: name.into(),
            inner: Arc::new(series),
        }
    }

    /// The owning backend.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The series name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The native series, if it is of type `S`.
    pub fn downcast<S: Any + Clone>(&self) -> Option<S> {
        self.inner.downcast_ref::<S>().cloned()
    }
}

impl fmt::Debug for SeriesRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesRef")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SeriesRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

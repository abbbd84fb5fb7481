//! Deferred values: a node of the partition task graph.
//!
//! A [`Deferred`] wraps a computation that runs at most once, on first
//! [`Deferred::compute`], and is shared by every clone. Derived nodes hold
//! their inputs, so computing a node computes its whole upstream graph.

use std::fmt;
use std::sync::{Arc, OnceLock};

use common_error::TesseraResult;
use log::debug;

type Thunk<T> = Arc<dyn Fn() -> TesseraResult<T> + Send + Sync>;

pub struct Deferred<T> {
    label: Arc<str>,
    thunk: Thunk<T>,
    cell: Arc<OnceLock<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            thunk: Arc::clone(&self.thunk),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("label", &self.label)
            .field("computed", &self.cell.get().is_some())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    pub fn new<F>(label: impl Into<Arc<str>>, thunk: F) -> Self
    where
        F: Fn() -> TesseraResult<T> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            thunk: Arc::new(thunk),
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// An already computed value.
    pub fn ready(label: impl Into<Arc<str>>, value: T) -> Self
    where
        T: Clone,
    {
        let cell = OnceLock::new();
        let _ = cell.set(value.clone());
        Self {
            label: label.into(),
            thunk: Arc::new(move || Ok(value.clone())),
            cell: Arc::new(cell),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Run the computation unless it already ran. Failures are not cached.
    pub fn compute(&self) -> TesseraResult<&T> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        debug!("computing deferred `{}`", self.label);
        let value = (self.thunk)()?;
        Ok(self.cell.get_or_init(|| value))
    }

    /// A new node computing `f` over this one's value.
    pub fn map<U, F>(&self, label: impl Into<Arc<str>>, f: F) -> Deferred<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> TesseraResult<U> + Send + Sync + 'static,
    {
        let input = self.clone();
        Deferred::new(label, move || f(input.compute()?))
    }

    /// A new node computing `f` over this one's value and `other`'s.
    pub fn zip<U, V, F>(&self, other: &Deferred<U>, label: impl Into<Arc<str>>, f: F) -> Deferred<V>
    where
        U: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: Fn(&T, &U) -> TesseraResult<V> + Send + Sync + 'static,
    {
        let left = self.clone();
        let right = other.clone();
        Deferred::new(label, move || f(left.compute()?, right.compute()?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use common_error::TesseraError;

    use super::*;

    #[test]
    fn test_runs_once_and_shares_result() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let base = Deferred::new("base", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(21)
        });
        let doubled = base.map("double", |v| Ok(v * 2));
        assert!(!doubled.is_computed());
        assert_eq!(*doubled.compute().unwrap(), 42);
        assert_eq!(*base.clone().compute().unwrap(), 21);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_errors_surface_on_compute() {
        let failing: Deferred<i32> =
            Deferred::new("boom", || Err(TesseraError::value_error("bad partition")));
        let sum = failing.zip(&Deferred::ready("one", 1), "sum", |a, b| Ok(a + b));
        assert!(matches!(sum.compute(), Err(TesseraError::ValueError(_))));
        assert_eq!(sum.label(), "sum");
    }
}

//! Group-by builder shared by eager and lazy frames.

use std::sync::Arc;

use common_error::TesseraResult;
use tessera_backends::BackendRegistry;
use tessera_expr::ExprArgs;

use crate::any_frame::AnyFrame;

/// A neutral frame wrapping one native frame.
pub trait NeutralFrame: Sized {
    fn any(&self) -> &AnyFrame;

    fn registry(&self) -> &Arc<BackendRegistry>;

    /// A frame of the same flavour around `frame`.
    fn wrap(&self, frame: AnyFrame) -> Self;
}

/// Pending grouping of a frame by key columns.
#[derive(Debug)]
pub struct GroupBy<'a, F> {
    frame: &'a F,
    keys: Vec<String>,
    drop_null_keys: bool,
}

impl<'a, F: NeutralFrame> GroupBy<'a, F> {
    pub(crate) fn new(frame: &'a F, keys: Vec<String>) -> Self {
        Self {
            frame,
            keys,
            drop_null_keys: false,
        }
    }

    /// Drop groups whose key is null instead of keeping them as a group.
    #[must_use]
    pub fn drop_null_keys(mut self, drop: bool) -> Self {
        self.drop_null_keys = drop;
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// One row per group: the keys followed by each aggregation.
    pub fn agg(&self, args: impl Into<ExprArgs>) -> TesseraResult<F> {
        let out = self
            .frame
            .any()
            .group_by_agg(&self.keys, args.into(), self.drop_null_keys)?;
        Ok(self.frame.wrap(out))
    }
}

//! Operations common to [`DataFrame`](crate::DataFrame) and
//! [`LazyFrame`](crate::LazyFrame).

/// Implement the shared frame surface for a type implementing
/// [`NeutralFrame`](crate::group_by::NeutralFrame).
macro_rules! impl_frame_ops {
    ($frame:ty) => {
        impl $frame {
            pub fn kind(&self) -> common_config::BackendKind {
                self.frame.kind()
            }

            pub fn columns(&self) -> Vec<String> {
                self.frame.columns()
            }

            /// Column names with their logical dtypes.
            pub fn schema(&self) -> common_error::TesseraResult<Vec<tessera_core::Field>> {
                self.frame.schema()
            }

            /// A frame holding exactly the outputs of `args`, in order.
            pub fn select(
                &self,
                args: impl Into<tessera_expr::ExprArgs>,
            ) -> common_error::TesseraResult<Self> {
                Ok(self.wrap(self.frame.select(args.into())?))
            }

            /// This frame with the outputs of `args` replacing same-named
            /// columns or appended.
            pub fn with_columns(
                &self,
                args: impl Into<tessera_expr::ExprArgs>,
            ) -> common_error::TesseraResult<Self> {
                Ok(self.wrap(self.frame.with_columns(args.into())?))
            }

            /// Keep the rows where every predicate holds.
            pub fn filter(
                &self,
                args: impl Into<tessera_expr::ExprArgs>,
            ) -> common_error::TesseraResult<Self> {
                Ok(self.wrap(self.frame.filter(args.into())?))
            }

            pub fn sort<S: Into<String>>(
                &self,
                by: impl IntoIterator<Item = S>,
                descending: &[bool],
            ) -> common_error::TesseraResult<Self> {
                let by: Vec<String> = by.into_iter().map(Into::into).collect();
                Ok(self.wrap(self.frame.sort(&by, descending)?))
            }

            pub fn head(&self, n: usize) -> common_error::TesseraResult<Self> {
                Ok(self.wrap(self.frame.head(n)?))
            }

            pub fn rename<K: Into<String>, V: Into<String>>(
                &self,
                mapping: impl IntoIterator<Item = (K, V)>,
            ) -> common_error::TesseraResult<Self> {
                let mapping = mapping
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect();
                Ok(self.wrap(self.frame.rename(&mapping)?))
            }

            pub fn drop<S: Into<String>>(
                &self,
                names: impl IntoIterator<Item = S>,
            ) -> common_error::TesseraResult<Self> {
                let names: Vec<String> = names.into_iter().map(Into::into).collect();
                Ok(self.wrap(self.frame.drop(&names)?))
            }

            /// Start a group-by on `keys`.
            pub fn group_by<S: Into<String>>(
                &self,
                keys: impl IntoIterator<Item = S>,
            ) -> $crate::group_by::GroupBy<'_, Self> {
                $crate::group_by::GroupBy::new(self, keys.into_iter().map(Into::into).collect())
            }

            /// `self <op> other` column by column.
            pub fn binary(
                &self,
                op: tessera_expr::expr::BinaryOp,
                other: impl Into<$crate::any_frame::FrameOperand>,
            ) -> common_error::TesseraResult<Self> {
                Ok(self.wrap(self.frame.binary(op, &other.into(), false)?))
            }

            /// `other <op> self` column by column.
            pub fn reflected(
                &self,
                op: tessera_expr::expr::BinaryOp,
                other: &$crate::any_frame::FrameOperand,
            ) -> common_error::TesseraResult<Self> {
                Ok(self.wrap(self.frame.binary(op, other, true)?))
            }

            /// Materialize as an Arrow record batch.
            pub fn to_batch(&self) -> common_error::TesseraResult<arrow::record_batch::RecordBatch> {
                self.frame.to_batch()
            }

            pub fn native(&self) -> &$crate::any_frame::AnyFrame {
                &self.frame
            }
        }

        impl $crate::group_by::NeutralFrame for $frame {
            fn any(&self) -> &$crate::any_frame::AnyFrame {
                &self.frame
            }

            fn registry(&self) -> &std::sync::Arc<tessera_backends::BackendRegistry> {
                &self.registry
            }

            fn wrap(&self, frame: $crate::any_frame::AnyFrame) -> Self {
                Self {
                    frame,
                    registry: std::sync::Arc::clone(&self.registry),
                }
            }
        }
    };
}

pub(crate) use impl_frame_ops;

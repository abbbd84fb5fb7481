//! One native frame of any backend.
//!
//! [`AnyFrame`] is a closed enum over the four native frame types. Every
//! operation matches on it once through [`dispatch!`] and then runs the
//! generic compliant machinery for that backend.

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use common_config::BackendKind;
use common_error::{TesseraError, TesseraResult};
use log::debug;
use tessera_backends::{
    ArrowFrame, BackendRegistry, Columnar, Indexed, IndexedFrame, Partitioned, PartitionedFrame,
    Sql, SqlFrame,
};
use tessera_core::{Field, Value};
use tessera_expr::compliant::group_by::{self, AggregationRequest};
use tessera_expr::compliant::{
    self, native_series, parse_into_exprs, Backend, Comparand, CompliantFrame, Namespace,
};
use tessera_expr::expr::{BinaryOp, SeriesRef};
use tessera_expr::ExprArgs;

use crate::series::Series;

/// Run `$body` with `$native` bound to the native frame and `$B` aliased to
/// its backend.
macro_rules! dispatch {
    ($frame:expr, |$native:ident: $B:ident| $body:expr) => {
        match $frame {
            AnyFrame::Columnar($native) => {
                type $B = Columnar;
                $body
            }
            AnyFrame::Indexed($native) => {
                type $B = Indexed;
                $body
            }
            AnyFrame::Partitioned($native) => {
                type $B = Partitioned;
                $body
            }
            AnyFrame::Sql($native) => {
                type $B = Sql;
                $body
            }
        }
    };
}

/// A native frame of one of the backends.
#[derive(Debug, Clone)]
pub enum AnyFrame {
    Columnar(ArrowFrame),
    Indexed(IndexedFrame),
    Partitioned(PartitionedFrame),
    Sql(SqlFrame),
}

macro_rules! impl_from_native {
    ($($native:ty => $variant:ident),*) => {
        $(
            impl From<$native> for AnyFrame {
                fn from(frame: $native) -> Self {
                    Self::$variant(frame)
                }
            }
        )*
    };
}

impl_from_native!(
    ArrowFrame => Columnar,
    IndexedFrame => Indexed,
    PartitionedFrame => Partitioned,
    SqlFrame => Sql
);

/// Right-hand side of a frame-wide binary operation.
#[derive(Debug, Clone)]
pub enum FrameOperand {
    Scalar(Value),
    Series(SeriesRef),
}

impl FrameOperand {
    fn comparand<B: Backend>(&self) -> TesseraResult<Comparand<B>> {
        Ok(match self {
            Self::Scalar(value) => Comparand::Scalar(value.clone()),
            Self::Series(series) => Comparand::Series(native_series::<B>(series)?),
        })
    }
}

impl From<SeriesRef> for FrameOperand {
    fn from(series: SeriesRef) -> Self {
        Self::Series(series)
    }
}

impl From<&Series> for FrameOperand {
    fn from(series: &Series) -> Self {
        Self::Series(series.handle())
    }
}

macro_rules! scalar_frame_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FrameOperand {
                fn from(v: $t) -> Self {
                    Self::Scalar(Value::from(v))
                }
            }
        )*
    };
}

scalar_frame_operand!(bool, i64, i32, f64, &str, String, Value);

fn mixed_backends(expected: BackendKind, found: BackendKind) -> TesseraError {
    TesseraError::type_error(format!(
        "cannot combine {expected} and {found} frames; all frames must come from one backend"
    ))
}

/// How frames are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatMethod {
    /// Stack rows; the column-name sets must match.
    #[default]
    Vertical,
    /// Place columns side by side; names must be unique.
    Horizontal,
}

impl AnyFrame {
    /// Build a frame of backend `kind` from `batch`.
    pub fn new(
        registry: &BackendRegistry,
        kind: BackendKind,
        batch: RecordBatch,
    ) -> TesseraResult<Self> {
        Ok(match kind {
            BackendKind::Columnar => registry.columnar(batch)?.into(),
            BackendKind::Indexed => registry.indexed(batch)?.into(),
            BackendKind::Partitioned => registry.partitioned(batch)?.into(),
            BackendKind::Sql => registry.sql(batch)?.into(),
        })
    }

    pub fn kind(&self) -> BackendKind {
        dispatch!(self, |_frame: B| B::KIND)
    }

    pub fn columns(&self) -> Vec<String> {
        dispatch!(self, |frame: B| CompliantFrame::<B>::columns(frame))
    }

    /// Column names with their logical dtypes.
    pub fn schema(&self) -> TesseraResult<Vec<Field>> {
        dispatch!(self, |frame: B| {
            frame
                .columns()
                .into_iter()
                .map(|name| {
                    let dtype = B::to_logical(&frame.dtype_of(&name)?);
                    Ok(Field::new(name, dtype))
                })
                .collect()
        })
    }

    pub fn select(&self, args: ExprArgs) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| {
            let exprs = parse_into_exprs(args, &Namespace::<B>::new())?;
            debug!("select on {}: {} expressions", B::KIND, exprs.len());
            compliant::select::<B>(frame, &exprs).map(Self::from)
        })
    }

    pub fn with_columns(&self, args: ExprArgs) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| {
            let exprs = parse_into_exprs(args, &Namespace::<B>::new())?;
            debug!("with_columns on {}: {} expressions", B::KIND, exprs.len());
            compliant::with_columns::<B>(frame, &exprs).map(Self::from)
        })
    }

    /// Keep the rows where every predicate holds.
    pub fn filter(&self, args: ExprArgs) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| {
            let ns = Namespace::<B>::new();
            let predicates = parse_into_exprs(args, &ns)?;
            compliant::filter::<B>(frame, predicates, &ns).map(Self::from)
        })
    }

    pub fn group_by_agg(
        &self,
        keys: &[String],
        args: ExprArgs,
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| {
            let request = AggregationRequest {
                keys: keys.to_vec(),
                exprs: parse_into_exprs(args, &Namespace::<B>::new())?,
                drop_null_keys,
            };
            group_by::agg::<B>(frame, request).map(Self::from)
        })
    }

    /// Apply `op` column-wise against a scalar or a series; `reflected`
    /// puts the frame on the right.
    pub fn binary(
        &self,
        op: BinaryOp,
        other: &FrameOperand,
        reflected: bool,
    ) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| {
            compliant::frame_binary::<B>(frame, op, &other.comparand::<B>()?, reflected)
                .map(Self::from)
        })
    }

    pub fn sort(&self, by: &[String], descending: &[bool]) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| frame.sort(by, descending).map(Self::from))
    }

    pub fn head(&self, n: usize) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| CompliantFrame::<B>::head(frame, n).map(Self::from))
    }

    pub fn rename(&self, mapping: &BTreeMap<String, String>) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| frame.rename(mapping).map(Self::from))
    }

    pub fn drop(&self, names: &[String]) -> TesseraResult<Self> {
        dispatch!(self, |frame: B| CompliantFrame::<B>::drop(frame, names).map(Self::from))
    }

    /// One column as a neutral series; only eager frames have them.
    pub fn column(&self, name: &str) -> TesseraResult<Series> {
        match self {
            Self::Columnar(frame) => Ok(Series::from_native(frame.column(name)?)),
            Self::Indexed(frame) => Ok(Series::from_native(frame.column(name)?)),
            lazy => Err(TesseraError::value_error(format!(
                "cannot take column `{name}` of a {} frame; collect it first",
                lazy.kind()
            ))),
        }
    }

    /// Materialize into an eager frame. Partitioned frames become Indexed,
    /// Sql frames become Columnar, eager frames are returned as they are.
    pub fn collect(&self, registry: &BackendRegistry) -> TesseraResult<Self> {
        match self {
            Self::Columnar(_) | Self::Indexed(_) => Ok(self.clone()),
            Self::Partitioned(frame) => {
                registry.ensure_enabled(BackendKind::Indexed)?;
                debug!("collecting a partitioned frame into the indexed backend");
                Ok(frame.collect(registry.indexed_options())?.into())
            }
            Self::Sql(frame) => {
                registry.ensure_enabled(BackendKind::Columnar)?;
                debug!("collecting a sql frame into the columnar backend");
                Ok(frame.collect()?.into())
            }
        }
    }

    pub fn to_batch(&self) -> TesseraResult<RecordBatch> {
        dispatch!(self, |frame: B| CompliantFrame::<B>::to_batch(frame))
    }

    /// Concatenate frames of one backend.
    pub fn concat(frames: &[Self], how: ConcatMethod) -> TesseraResult<Self> {
        let Some(first) = frames.first() else {
            return Err(TesseraError::value_error("No items to concatenate"));
        };
        if how == ConcatMethod::Horizontal {
            let mut seen = Vec::new();
            for name in frames.iter().flat_map(Self::columns) {
                if seen.contains(&name) {
                    return Err(TesseraError::value_error(format!(
                        "column `{name}` appears in more than one frame; \
                         horizontal concatenation needs unique names"
                    )));
                }
                seen.push(name);
            }
        }
        dispatch!(first, |_first: B| {
            let natives = frames
                .iter()
                .map(|frame| B::native_frame(frame))
                .collect::<TesseraResult<Vec<_>>>()?;
            match how {
                ConcatMethod::Vertical => CompliantFrame::<B>::concat_vertical(&natives),
                ConcatMethod::Horizontal => CompliantFrame::<B>::concat_horizontal(&natives),
            }
            .map(Self::from)
        })
    }
}

/// Recover the native frame of a backend from an [`AnyFrame`].
trait NativeFrame: Backend {
    fn native_frame(frame: &AnyFrame) -> TesseraResult<Self::Frame>;
}

macro_rules! impl_native_frame {
    ($($backend:ty => $variant:ident),*) => {
        $(
            impl NativeFrame for $backend {
                fn native_frame(frame: &AnyFrame) -> TesseraResult<<Self as Backend>::Frame> {
                    match frame {
                        AnyFrame::$variant(native) => Ok(native.clone()),
                        other => Err(mixed_backends(Self::KIND, other.kind())),
                    }
                }
            }
        )*
    };
}

impl_native_frame!(
    Columnar => Columnar,
    Indexed => Indexed,
    Partitioned => Partitioned,
    Sql => Sql
);

//! Neutral frames for Tessera.
//!
//! [`DataFrame`] (eager) and [`LazyFrame`] wrap one native frame of a
//! backend together with the [`BackendRegistry`] that built it. Every
//! operation parses its arguments into neutral expressions, translates them
//! for that backend and hands the result back wrapped again, so user code
//! never sees native types.

#![allow(clippy::missing_errors_doc)]

pub mod any_frame;
pub mod dataframe;
pub mod group_by;
pub mod lazy;
mod ops;
pub mod series;

use log::debug;

pub use any_frame::{AnyFrame, ConcatMethod, FrameOperand};
pub use common_error::{TesseraError, TesseraResult};
pub use dataframe::DataFrame;
pub use group_by::{GroupBy, NeutralFrame};
pub use lazy::LazyFrame;
pub use series::{AnySeries, Series, SeriesOperand};
pub use tessera_backends::BackendRegistry;

/// Concatenate frames that all come from one backend.
///
/// Vertical concatenation needs identical column-name sets and keeps the
/// first frame's column order; horizontal concatenation needs unique names.
pub fn concat<F: NeutralFrame>(frames: &[F], how: ConcatMethod) -> TesseraResult<F> {
    let Some(first) = frames.first() else {
        return Err(TesseraError::value_error("No items to concatenate"));
    };
    debug!("concat {:?} of {} frames", how, frames.len());
    let natives: Vec<AnyFrame> = frames.iter().map(|f| f.any().clone()).collect();
    Ok(first.wrap(AnyFrame::concat(&natives, how)?))
}

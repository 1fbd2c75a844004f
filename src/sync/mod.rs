//! The mirroring engine: the reconciler that aligns one tree with another,
//! and the driver that runs it on an interval.

mod cycle;
mod reconciler;

pub use cycle::{CycleDriver, CycleError};
pub use reconciler::{PassSummary, ReconcileError, Reconciler};

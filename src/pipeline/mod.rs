//! Pipeline assembly and driving.
//!
//! [`OptimizerRegistry`] is pure wiring: a kind-to-constructor table built
//! explicitly at startup (no global singleton) whose factory is the single
//! place a hard error can originate. [`Pipeline`] owns a stage list and
//! drives it over instruction sequences - one sweep, to a bounded fixpoint,
//! or in parallel over a batch - always continuing past failed passes with
//! the last good sequence.

mod driver;
mod registry;

pub use driver::{BatchReport, KindStats, Pipeline, PipelineReport};
pub use registry::OptimizerRegistry;

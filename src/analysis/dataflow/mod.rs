//! Classical dataflow analyses over instruction sequences.
//!
//! The framework separates three concerns, each swappable on its own:
//!
//! - [`MeetSemiLattice`] - the fact domain and how facts merge
//! - [`DataFlowAnalysis`] - direction, boundary conditions, and the
//!   per-instruction transfer function
//! - [`DataFlowSolver`] - worklist iteration to a fixpoint over the
//!   instruction-level CFG
//!
//! Two concrete analyses ship with the crate and are exposed as reusable
//! utilities (the dataflow optimization pass consumes both, and a completed
//! elimination predicate can build on them safely):
//!
//! - [`AvailableExpressions`] - forward; which expression signatures have
//!   already been computed and not invalidated by a STORE/MOV
//! - [`LiveVariables`] - backward; which variable names may still be read,
//!   bounded by a look-back window instead of true def-use chains

mod available;
mod framework;
mod lattice;
mod liveness;
mod solver;

pub use available::{AvailSet, AvailableExpressions};
pub use framework::{AnalysisResults, DataFlowAnalysis, Direction};
pub use lattice::MeetSemiLattice;
pub use liveness::{LiveSet, LiveVariables, DEFAULT_LOOKBACK_WINDOW};
pub use solver::DataFlowSolver;

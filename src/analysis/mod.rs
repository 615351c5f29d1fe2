//! Program analysis infrastructure for instruction sequences.
//!
//! Everything in this module is ephemeral: a pass builds what it needs from
//! the instruction sequence it was handed, uses it, and drops it. Nothing is
//! persisted across pass invocations, because instruction indices may shift
//! between passes.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - instruction-level CFG with reachability and
//!   back-edge (loop) discovery
//! - [`dataflow`] - the dataflow framework: direction, lattice, worklist
//!   solver, and the two concrete analyses (available expressions, live
//!   variables)

mod cfg;
pub mod dataflow;

pub use cfg::{BackEdge, ControlFlowGraph};

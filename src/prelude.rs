//! Common imports for working with `optforge`.
//!
//! ```rust
//! use optforge::prelude::*;
//! ```

pub use crate::analysis::dataflow::{AvailableExpressions, DataFlowSolver, LiveVariables};
pub use crate::analysis::ControlFlowGraph;
pub use crate::instruction::{Instruction, InstructionKind, Opcode, Operand};
pub use crate::passes::{
    Improvement, OptimizationContext, OptimizationKind, OptimizationPass, OptimizationResult,
    PassEffects,
};
pub use crate::pipeline::{OptimizerRegistry, Pipeline, PipelineReport};
pub use crate::{Error, Result};

//! The optimization passes and the contract they share.
//!
//! Every pass implements [`OptimizationPass`]: a fast applicability probe
//! ([`OptimizationPass::can_optimize`]), the transform itself
//! ([`OptimizationPass::optimize`]), and a provided
//! [`OptimizationPass::apply`] wrapper that guards, times, measures, and
//! contains failure. `apply` is the single boundary where errors are caught,
//! so one failing pass can never abort a multi-pass pipeline.
//!
//! Passes are pure functions over their input sequence. Any internal cache
//! (the CSE expression table, the peephole pattern cursor) lives for one
//! `optimize` call and is discarded.
//!
//! Any pass that deletes, inserts, or moves instructions must rewrite
//! branch targets through [`crate::instruction::remap_branch_targets`];
//! each pass declares what it may do to the stream via [`PassEffects`].

use std::time::Instant;

use bitflags::bitflags;

use crate::instruction::Instruction;
use crate::Result;

mod algebraic;
mod blocks;
mod branches;
mod context;
mod cse;
mod dataflow;
mod dce;
mod folding;
mod inline;
mod loops;
mod peephole;

pub use algebraic::InstructionOptimizer;
pub use blocks::BasicBlockOptimizer;
pub use branches::BranchOptimizer;
pub use context::{Improvement, OptimizationContext, OptimizationKind, OptimizationResult};
pub use cse::CommonSubexpressionElimination;
pub use dataflow::DataFlowOptimizer;
pub use dce::DeadCodeElimination;
pub use folding::ConstantFolding;
pub use inline::FunctionInliner;
pub use loops::LoopOptimizer;
pub use peephole::{PeepholeOptimizer, PeepholePattern};

bitflags! {
    /// What a pass may do to the instruction stream.
    ///
    /// Declared up front so the driver can sanity-check that a pass which
    /// shrank or grew the stream also declared the corresponding effect
    /// (and therefore went through branch-target renumbering).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PassEffects: u8 {
        /// The pass may remove instructions.
        const DELETE = 1 << 0;
        /// The pass may insert instructions.
        const INSERT = 1 << 1;
        /// The pass may move instructions relative to each other.
        const REORDER = 1 << 2;
        /// The pass may rewrite an instruction in place (1:1).
        const REWRITE = 1 << 3;
    }
}

impl PassEffects {
    /// Returns `true` if the pass may change instruction indices and is
    /// therefore obligated to renumber branch targets.
    #[must_use]
    pub const fn shifts_indices(self) -> bool {
        self.intersects(Self::DELETE.union(Self::INSERT).union(Self::REORDER))
    }
}

/// The contract every optimization pass implements.
///
/// `optimize` is assumed to be invoked only when `can_optimize` holds, but
/// must still behave safely (identity) when called without the guard.
pub trait OptimizationPass: Send + Sync {
    /// Short stable pass name for telemetry.
    fn name(&self) -> &'static str;

    /// The kind tag this pass implements.
    fn kind(&self) -> OptimizationKind;

    /// One-line human description.
    fn description(&self) -> &'static str;

    /// What this pass may do to the stream.
    fn effects(&self) -> PassEffects;

    /// Fast, non-mutating applicability probe.
    fn can_optimize(&self, instructions: &[Instruction]) -> bool;

    /// The transform. Must renumber branch targets if it shifts indices.
    ///
    /// # Errors
    ///
    /// Implementation-specific failures; callers go through [`apply`]
    /// (which contains them) rather than calling this directly.
    ///
    /// [`apply`]: OptimizationPass::apply
    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>>;

    /// Guarded, timed, measured application.
    ///
    /// Returns a failed [`OptimizationResult`] (original sequence preserved)
    /// when the context is disabled or at level 0, when `can_optimize` does
    /// not hold, or when `optimize` errors. Failure never propagates past
    /// this boundary.
    fn apply(&self, instructions: &[Instruction], ctx: &OptimizationContext) -> OptimizationResult {
        let started = Instant::now();

        if !ctx.enabled || ctx.level == 0 {
            return OptimizationResult::failed(
                self.kind(),
                instructions,
                started.elapsed(),
                format!("{} is disabled by its context", self.name()),
            );
        }

        if !self.can_optimize(instructions) {
            return OptimizationResult::failed(
                self.kind(),
                instructions,
                started.elapsed(),
                format!("{} is not applicable to this sequence", self.name()),
            );
        }

        match self.optimize(instructions) {
            Ok(optimized) => OptimizationResult::succeeded(
                self.kind(),
                instructions,
                optimized,
                started.elapsed(),
            ),
            Err(error) => OptimizationResult::failed(
                self.kind(),
                instructions,
                started.elapsed(),
                error.to_string(),
            ),
        }
    }
}

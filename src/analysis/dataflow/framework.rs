//! Dataflow analysis framework trait and direction.
//!
//! Any specific analysis (available expressions, live variables) implements
//! [`DataFlowAnalysis`] to work with the worklist solver. Facts live at
//! instruction granularity: the transfer function describes how flowing
//! through one instruction transforms the abstract state.

use crate::analysis::dataflow::lattice::MeetSemiLattice;
use crate::instruction::Instruction;

/// Direction of a dataflow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Information flows from entry to exit.
    ///
    /// Examples: available expressions, reaching definitions.
    Forward,

    /// Information flows from exit(s) to entry.
    ///
    /// Examples: live variables, very busy expressions.
    Backward,
}

/// A dataflow analysis over an instruction sequence.
///
/// Implementations provide the transfer function and boundary conditions;
/// [`DataFlowSolver`](crate::analysis::dataflow::DataFlowSolver) handles
/// iteration to a fixpoint over the instruction-level CFG.
///
/// For forward analyses: `out[i] = transfer(i, in[i])`.
/// For backward analyses: `in[i] = transfer(i, out[i])`.
pub trait DataFlowAnalysis {
    /// The fact type at each program point.
    type Fact: MeetSemiLattice;

    /// The direction of this analysis.
    const DIRECTION: Direction;

    /// The fact at the boundary: function entry for forward analyses,
    /// function exit(s) for backward analyses.
    fn boundary(&self, instructions: &[Instruction]) -> Self::Fact;

    /// The fact used to initialize all interior points before iteration.
    /// Usually the top element of the lattice.
    fn initial(&self, instructions: &[Instruction]) -> Self::Fact;

    /// Applies one instruction's effect to a fact.
    fn transfer(&self, index: usize, instruction: &Instruction, input: &Self::Fact) -> Self::Fact;
}

/// Computed facts at every instruction boundary.
#[derive(Debug, Clone)]
pub struct AnalysisResults<F> {
    /// Fact before each instruction (forward) or flowing into it (backward).
    pub in_facts: Vec<F>,
    /// Fact after each instruction.
    pub out_facts: Vec<F>,
}

impl<F> AnalysisResults<F> {
    /// Wraps computed facts.
    #[must_use]
    pub fn new(in_facts: Vec<F>, out_facts: Vec<F>) -> Self {
        Self {
            in_facts,
            out_facts,
        }
    }

    /// Fact holding immediately before instruction `index`.
    #[must_use]
    pub fn before(&self, index: usize) -> Option<&F> {
        self.in_facts.get(index)
    }

    /// Fact holding immediately after instruction `index`.
    #[must_use]
    pub fn after(&self, index: usize) -> Option<&F> {
        self.out_facts.get(index)
    }

    /// Number of program points analyzed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_facts.len()
    }

    /// Returns `true` if nothing was analyzed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_facts.is_empty()
    }
}

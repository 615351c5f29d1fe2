//! Worklist-based dataflow solver.
//!
//! Iterates transfer functions over the instruction-level CFG until a
//! fixpoint is reached, seeding the worklist in reverse postorder (forward)
//! or postorder (backward) so most facts stabilize in one sweep on reducible
//! graphs.

use std::collections::VecDeque;

use crate::analysis::dataflow::framework::{AnalysisResults, DataFlowAnalysis, Direction};
use crate::analysis::dataflow::lattice::MeetSemiLattice;
use crate::analysis::ControlFlowGraph;
use crate::instruction::Instruction;

/// Worklist-based dataflow solver.
///
/// # Usage
///
/// ```rust
/// use optforge::analysis::dataflow::{AvailableExpressions, DataFlowSolver};
/// use optforge::instruction::Instruction;
///
/// let program = vec![Instruction::push(1), Instruction::op(optforge::instruction::Opcode::Ret)];
/// let results = DataFlowSolver::new(AvailableExpressions::default()).solve(&program);
/// assert_eq!(results.len(), 2);
/// ```
pub struct DataFlowSolver<A: DataFlowAnalysis> {
    analysis: A,
    iterations: usize,
}

impl<A: DataFlowAnalysis> DataFlowSolver<A> {
    /// Creates a solver for the given analysis.
    #[must_use]
    pub fn new(analysis: A) -> Self {
        Self {
            analysis,
            iterations: 0,
        }
    }

    /// Number of worklist steps performed so far.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Solves the analysis to a fixpoint over `instructions`.
    pub fn solve(mut self, instructions: &[Instruction]) -> AnalysisResults<A::Fact> {
        let len = instructions.len();
        if len == 0 {
            return AnalysisResults::new(Vec::new(), Vec::new());
        }

        let cfg = ControlFlowGraph::build(instructions);
        let initial = self.analysis.initial(instructions);
        let boundary = self.analysis.boundary(instructions);

        let mut in_facts = vec![initial.clone(); len];
        let mut out_facts = vec![initial; len];
        let mut in_worklist = vec![false; len];
        let mut worklist: VecDeque<usize> = VecDeque::with_capacity(len);

        match A::DIRECTION {
            Direction::Forward => {
                in_facts[0] = boundary;
                for index in cfg.reverse_postorder() {
                    worklist.push_back(index);
                    in_worklist[index] = true;
                }
            }
            Direction::Backward => {
                for exit in cfg.exits() {
                    out_facts[exit] = boundary.clone();
                }
                for index in cfg.postorder() {
                    worklist.push_back(index);
                    in_worklist[index] = true;
                }
            }
        }

        while let Some(index) = worklist.pop_front() {
            in_worklist[index] = false;
            self.iterations += 1;

            match A::DIRECTION {
                Direction::Forward => {
                    // in[i] = meet over predecessors' out; entry keeps its boundary.
                    if index != 0 {
                        if let Some(met) = Self::meet_all(cfg.predecessors(index), &out_facts) {
                            in_facts[index] = met;
                        }
                    }
                    let out =
                        self.analysis
                            .transfer(index, &instructions[index], &in_facts[index]);
                    if out != out_facts[index] {
                        out_facts[index] = out;
                        for &succ in cfg.successors(index) {
                            if !in_worklist[succ] {
                                worklist.push_back(succ);
                                in_worklist[succ] = true;
                            }
                        }
                    }
                }
                Direction::Backward => {
                    // out[i] = meet over successors' in; exits keep their boundary.
                    if !cfg.successors(index).is_empty() {
                        if let Some(met) = Self::meet_all(cfg.successors(index), &in_facts) {
                            out_facts[index] = met;
                        }
                    }
                    let input =
                        self.analysis
                            .transfer(index, &instructions[index], &out_facts[index]);
                    if input != in_facts[index] {
                        in_facts[index] = input;
                        for &pred in cfg.predecessors(index) {
                            if !in_worklist[pred] {
                                worklist.push_back(pred);
                                in_worklist[pred] = true;
                            }
                        }
                    }
                }
            }
        }

        AnalysisResults::new(in_facts, out_facts)
    }

    fn meet_all(indices: &[usize], facts: &[A::Fact]) -> Option<A::Fact> {
        let mut result: Option<A::Fact> = None;
        for &index in indices {
            let fact = &facts[index];
            result = Some(match result {
                None => fact.clone(),
                Some(acc) => acc.meet(fact),
            });
        }
        result
    }
}

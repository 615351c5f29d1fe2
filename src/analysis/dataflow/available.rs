//! Available-expressions analysis.
//!
//! An expression is *available* at a program point if it was computed on
//! every path reaching that point and no intervening STORE or MOV wrote to a
//! destination its operands reference. This is a forward *must* analysis:
//! meet is intersection.
//!
//! The expression signature is the structural [`ExprKey`] (opcode + exact
//! operand tuple), so commutative reorderings are distinct expressions -
//! the same deliberate conservatism as common-subexpression elimination.

use std::collections::HashSet;

use crate::analysis::dataflow::framework::{AnalysisResults, DataFlowAnalysis, Direction};
use crate::analysis::dataflow::lattice::MeetSemiLattice;
use crate::analysis::dataflow::solver::DataFlowSolver;
use crate::instruction::{ExprKey, Instruction, Opcode};

/// The set of expression signatures available at one program point.
///
/// The top element (`all = true`) stands for "every expression" and only
/// appears on points the solver has not yet reached from the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailSet {
    all: bool,
    keys: HashSet<ExprKey>,
}

impl AvailSet {
    /// The empty set: nothing available.
    #[must_use]
    pub fn none() -> Self {
        Self {
            all: false,
            keys: HashSet::new(),
        }
    }

    /// The universe: used as the optimistic initial value.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all: true,
            keys: HashSet::new(),
        }
    }

    /// Returns `true` if the expression is available here.
    #[must_use]
    pub fn contains(&self, key: &ExprKey) -> bool {
        self.all || self.keys.contains(key)
    }

    /// Number of concretely known available expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no expression is available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all && self.keys.is_empty()
    }

    fn insert(&mut self, key: ExprKey) {
        if !self.all {
            self.keys.insert(key);
        }
    }

    fn kill_mentions(&mut self, symbol: &str) {
        self.keys.retain(|key| !key.mentions(symbol));
    }
}

impl MeetSemiLattice for AvailSet {
    /// Meet is intersection: available only if available on every path.
    fn meet(&self, other: &Self) -> Self {
        if self.all {
            return other.clone();
        }
        if other.all {
            return self.clone();
        }
        Self {
            all: false,
            keys: self.keys.intersection(&other.keys).cloned().collect(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

/// Available-expressions analysis over an instruction sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailableExpressions;

impl AvailableExpressions {
    /// Runs the analysis through the worklist solver.
    #[must_use]
    pub fn compute(instructions: &[Instruction]) -> AnalysisResults<AvailSet> {
        DataFlowSolver::new(Self).solve(instructions)
    }
}

impl DataFlowAnalysis for AvailableExpressions {
    type Fact = AvailSet;
    const DIRECTION: Direction = Direction::Forward;

    fn boundary(&self, _instructions: &[Instruction]) -> Self::Fact {
        // Nothing has been computed at entry.
        AvailSet::none()
    }

    fn initial(&self, _instructions: &[Instruction]) -> Self::Fact {
        AvailSet::all()
    }

    fn transfer(&self, _index: usize, instruction: &Instruction, input: &Self::Fact) -> Self::Fact {
        let mut out = input.clone();

        // STORE/MOV to a destination invalidates every expression whose
        // operands reference it.
        if matches!(instruction.opcode(), Opcode::Store | Opcode::Mov) {
            if let Some(dest) = instruction.operands().first().and_then(|o| o.as_symbol()) {
                out.kill_mentions(dest);
            }
        }

        if let Some(key) = ExprKey::of(instruction) {
            out.insert(key);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operand;

    fn add(a: &str, b: &str) -> Instruction {
        Instruction::new(Opcode::Add, vec![a.into(), b.into()])
    }

    #[test]
    fn test_expression_becomes_available() {
        let program = vec![add("a", "b"), add("a", "b"), Instruction::op(Opcode::Ret)];
        let results = AvailableExpressions::compute(&program);

        let key = ExprKey::of(&program[0]).unwrap();
        assert!(!results.before(0).unwrap().contains(&key));
        assert!(results.before(1).unwrap().contains(&key));
        assert!(results.before(2).unwrap().contains(&key));
    }

    #[test]
    fn test_store_kills_availability() {
        let program = vec![
            add("a", "b"),
            Instruction::new(Opcode::Store, vec![Operand::Symbol("a".into())]),
            add("a", "b"),
            Instruction::op(Opcode::Ret),
        ];
        let results = AvailableExpressions::compute(&program);

        let key = ExprKey::of(&program[0]).unwrap();
        assert!(results.before(1).unwrap().contains(&key));
        assert!(!results.before(2).unwrap().contains(&key));
        // Recomputed at 2, so available again at 3.
        assert!(results.before(3).unwrap().contains(&key));
    }

    #[test]
    fn test_store_to_unrelated_destination_preserves() {
        let program = vec![
            add("a", "b"),
            Instruction::new(Opcode::Store, vec![Operand::Symbol("c".into())]),
            Instruction::op(Opcode::Ret),
        ];
        let results = AvailableExpressions::compute(&program);
        let key = ExprKey::of(&program[0]).unwrap();
        assert!(results.before(2).unwrap().contains(&key));
    }

    #[test]
    fn test_meet_is_intersection() {
        // JZ 3 splits control; ADD a,b computed only on the fallthrough arm,
        // so it is not available at the join.
        let program = vec![
            Instruction::branch(Opcode::Jz, 2),
            add("a", "b"),
            add("c", "d"),
            Instruction::op(Opcode::Ret),
        ];
        let results = AvailableExpressions::compute(&program);
        let key = ExprKey::of(&program[1]).unwrap();
        assert!(!results.before(2).unwrap().contains(&key));
    }
}

//! Peephole optimization over small fixed instruction windows.
//!
//! Holds a table of window patterns and their replacement sequences. The
//! scan runs left to right; at each position the longest registered pattern
//! that matches by exact opcode + operand + kind equality is applied, the
//! replacement is emitted, and the scan advances past the window. Unmatched
//! instructions are emitted unchanged and the scan advances by one.
//!
//! A window is skipped when a branch targets its interior, and branch
//! targets are renumbered after any collapse.
//!
//! Built-in patterns:
//!
//! - `PUSH 0, MUL` -> `PUSH 0`
//! - `PUSH 1, MUL` -> `PUSH 1`

use std::collections::HashSet;

use crate::instruction::{remap_branch_targets, IndexMap, Instruction, Opcode};
use crate::passes::folding::branch_target_set;
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// One window pattern and its replacement sequence.
#[derive(Debug, Clone)]
pub struct PeepholePattern {
    window: Vec<Instruction>,
    replacement: Vec<Instruction>,
}

impl PeepholePattern {
    /// Creates a pattern. The window must be non-empty; the replacement may
    /// be shorter, longer, or empty.
    #[must_use]
    pub fn new(window: Vec<Instruction>, replacement: Vec<Instruction>) -> Self {
        debug_assert!(!window.is_empty());
        Self {
            window,
            replacement,
        }
    }

    fn matches_at(&self, instructions: &[Instruction], start: usize) -> bool {
        instructions.len() - start >= self.window.len()
            && self
                .window
                .iter()
                .zip(&instructions[start..])
                .all(|(pattern, actual)| structurally_equal(pattern, actual))
    }
}

/// Exact opcode + operand + kind equality; cycle estimates and metadata do
/// not participate in matching.
fn structurally_equal(a: &Instruction, b: &Instruction) -> bool {
    a.opcode() == b.opcode() && a.operands() == b.operands() && a.kind() == b.kind()
}

/// The peephole-optimization pass.
#[derive(Debug, Clone)]
pub struct PeepholeOptimizer {
    /// Sorted longest-window-first so the longest match wins at each
    /// position.
    patterns: Vec<PeepholePattern>,
}

impl Default for PeepholeOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PeepholeOptimizer {
    /// Creates the optimizer with the built-in pattern table.
    #[must_use]
    pub fn new() -> Self {
        let mut optimizer = Self {
            patterns: Vec::new(),
        };
        for value in [0, 1] {
            optimizer.add_pattern(PeepholePattern::new(
                vec![Instruction::push(value), Instruction::op(Opcode::Mul)],
                vec![Instruction::push(value)],
            ));
        }
        optimizer
    }

    /// Registers an additional pattern, keeping longest-first order.
    pub fn add_pattern(&mut self, pattern: PeepholePattern) {
        self.patterns.push(pattern);
        self.patterns
            .sort_by(|a, b| b.window.len().cmp(&a.window.len()));
    }

    /// Builder form of [`add_pattern`](Self::add_pattern).
    #[must_use]
    pub fn with_pattern(mut self, pattern: PeepholePattern) -> Self {
        self.add_pattern(pattern);
        self
    }

    fn match_at<'a>(
        &'a self,
        instructions: &[Instruction],
        start: usize,
        protected: &HashSet<usize>,
    ) -> Option<&'a PeepholePattern> {
        self.patterns.iter().find(|pattern| {
            pattern.matches_at(instructions, start)
                && (start + 1..start + pattern.window.len()).all(|i| !protected.contains(&i))
        })
    }
}

impl OptimizationPass for PeepholeOptimizer {
    fn name(&self) -> &'static str {
        "peephole-optimization"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::PeepholeOptimization
    }

    fn description(&self) -> &'static str {
        "Rewrites small fixed instruction windows from a pattern table"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE | PassEffects::INSERT | PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        let protected = branch_target_set(instructions);
        (0..instructions.len()).any(|i| self.match_at(instructions, i, &protected).is_some())
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let protected = branch_target_set(instructions);
        let mut out = Vec::with_capacity(instructions.len());
        let mut assignments = vec![None; instructions.len()];
        let mut changed = false;
        let mut i = 0;

        while i < instructions.len() {
            if let Some(pattern) = self.match_at(instructions, i, &protected) {
                assignments[i] = Some(out.len());
                out.extend(pattern.replacement.iter().cloned());
                changed = true;
                i += pattern.window.len();
                continue;
            }
            assignments[i] = Some(out.len());
            out.push(instructions[i].clone());
            i += 1;
        }

        if !changed {
            return Ok(out);
        }
        let map = IndexMap::from_assignments(&assignments, out.len());
        Ok(remap_branch_targets(out, &map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Operand;

    fn optimize(program: &[Instruction]) -> Vec<Instruction> {
        PeepholeOptimizer::new().optimize(program).unwrap()
    }

    #[test]
    fn test_multiply_by_zero_window() {
        let program = vec![Instruction::push(0), Instruction::op(Opcode::Mul)];
        assert_eq!(optimize(&program), vec![Instruction::push(0)]);
    }

    #[test]
    fn test_multiply_by_one_window() {
        let program = vec![Instruction::push(1), Instruction::op(Opcode::Mul)];
        assert_eq!(optimize(&program), vec![Instruction::push(1)]);
    }

    #[test]
    fn test_is_idempotent() {
        let program = vec![
            Instruction::push(7),
            Instruction::push(1),
            Instruction::op(Opcode::Mul),
            Instruction::op(Opcode::Ret),
        ];
        let once = optimize(&program);
        assert_eq!(once.len(), 3);
        assert_eq!(optimize(&once), once);
    }

    #[test]
    fn test_operand_mismatch_does_not_match() {
        // PUSH 2, MUL matches no registered window.
        let program = vec![Instruction::push(2), Instruction::op(Opcode::Mul)];
        assert_eq!(optimize(&program), program);
        assert!(!PeepholeOptimizer::new().can_optimize(&program));
    }

    #[test]
    fn test_branch_targets_are_renumbered_after_collapse() {
        let program = vec![
            Instruction::branch(Opcode::Jmp, 3),
            Instruction::push(1),
            Instruction::op(Opcode::Mul),
            Instruction::op(Opcode::Ret),
        ];
        let optimized = optimize(&program);
        assert_eq!(optimized.len(), 3);
        assert_eq!(optimized[0].branch_target(), Some(2));
        assert_eq!(optimized[2].opcode(), Opcode::Ret);
    }

    #[test]
    fn test_longest_pattern_wins() {
        // A three-wide custom pattern overlapping the built-in two-wide one.
        let custom = PeepholePattern::new(
            vec![
                Instruction::push(1),
                Instruction::op(Opcode::Mul),
                Instruction::op(Opcode::Pop),
            ],
            vec![Instruction::op(Opcode::Nop)],
        );
        let optimizer = PeepholeOptimizer::new().with_pattern(custom);

        let program = vec![
            Instruction::push(1),
            Instruction::op(Opcode::Mul),
            Instruction::op(Opcode::Pop),
        ];
        let optimized = optimizer.optimize(&program).unwrap();
        assert_eq!(optimized, vec![Instruction::op(Opcode::Nop)]);
    }

    #[test]
    fn test_pattern_with_targeted_interior_is_skipped() {
        let program = vec![
            Instruction::branch(Opcode::Jz, 2),
            Instruction::push(0),
            Instruction::op(Opcode::Mul),
            Instruction::op(Opcode::Ret),
        ];
        assert_eq!(optimize(&program), program);
    }

    #[test]
    fn test_replacement_operands_must_match_exactly() {
        let a = Instruction::push(0);
        let b = Instruction::new(Opcode::Push, vec![Operand::Symbol("x".into())]);
        assert!(!structurally_equal(&a, &b));
    }
}

//! Common-subexpression elimination.
//!
//! Tracks a structural key (opcode + exact operand tuple) per computation.
//! A later instruction whose key already appeared is rewritten into a `LOAD`
//! of the first computation's result slot, with provenance recorded.
//!
//! Deliberately conservative: only lexically identical tuples unify, so
//! `ADD a b` and `ADD b a` remain distinct. The expression table lives for a
//! single `optimize` call. Rewrites are strictly 1:1, so no branch target
//! ever shifts.

use std::collections::HashMap;

use crate::instruction::{ExprKey, Instruction, Opcode, Operand};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The common-subexpression-elimination pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonSubexpressionElimination;

impl OptimizationPass for CommonSubexpressionElimination {
    fn name(&self) -> &'static str {
        "common-subexpression-elimination"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::CommonSubexpressionElimination
    }

    fn description(&self) -> &'static str {
        "Replaces repeated identical computations with a load of the first result"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        let mut seen = HashMap::new();
        instructions.iter().filter_map(ExprKey::of).any(|key| {
            let count = seen.entry(key).or_insert(0usize);
            *count += 1;
            *count > 1
        })
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let (rewritten, _) = eliminate_duplicates(instructions);
        Ok(rewritten)
    }
}

/// The symbolic slot a computation's result is referenced through.
pub(crate) fn result_slot(index: usize) -> String {
    format!("%cse{index}")
}

/// Rewrites duplicate computations into loads of the first result.
///
/// Returns the rewritten sequence and the (identity) old-to-new assignments,
/// matching the shape of the other block-level sub-steps.
pub(crate) fn eliminate_duplicates(
    instructions: &[Instruction],
) -> (Vec<Instruction>, Vec<Option<usize>>) {
    let mut first_seen: HashMap<ExprKey, usize> = HashMap::new();
    let mut out = Vec::with_capacity(instructions.len());

    for (index, instruction) in instructions.iter().enumerate() {
        let replacement = ExprKey::of(instruction).and_then(|key| match first_seen.get(&key) {
            Some(&first) => Some(load_of(first, instruction)),
            None => {
                first_seen.insert(key, index);
                None
            }
        });
        out.push(replacement.unwrap_or_else(|| instruction.clone()));
    }

    let assignments = (0..instructions.len()).map(Some).collect();
    (out, assignments)
}

fn load_of(first: usize, original: &Instruction) -> Instruction {
    let mut load = Instruction::new(Opcode::Load, vec![Operand::Symbol(result_slot(first))]);
    for (key, value) in original.provenance() {
        load = load.with_metadata(&key, value);
    }
    load
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::META_ORIGIN_OPCODE;

    fn add(a: &str, b: &str) -> Instruction {
        Instruction::new(Opcode::Add, vec![a.into(), b.into()])
    }

    #[test]
    fn test_second_identical_computation_becomes_load() {
        let program = vec![add("a", "b"), add("a", "b"), Instruction::op(Opcode::Ret)];
        let optimized = CommonSubexpressionElimination.optimize(&program).unwrap();

        assert_eq!(optimized[0], program[0]);
        assert_eq!(optimized[1].opcode(), Opcode::Load);
        assert_eq!(
            optimized[1].operands()[0],
            Operand::Symbol(result_slot(0))
        );
        assert_eq!(
            optimized[1].metadata().get(META_ORIGIN_OPCODE).unwrap(),
            "ADD"
        );
        assert_eq!(optimized.len(), program.len());
    }

    #[test]
    fn test_commutative_reordering_is_not_unified() {
        let program = vec![add("a", "b"), add("b", "a")];
        let optimized = CommonSubexpressionElimination.optimize(&program).unwrap();
        assert_eq!(optimized, program);
        assert!(!CommonSubexpressionElimination.can_optimize(&program));
    }

    #[test]
    fn test_table_is_per_call() {
        let pass = CommonSubexpressionElimination;
        let program = vec![add("a", "b")];
        // A second call must not remember the first call's expressions.
        assert_eq!(pass.optimize(&program).unwrap(), program);
        assert_eq!(pass.optimize(&program).unwrap(), program);
    }

    #[test]
    fn test_non_computations_are_ignored() {
        let program = vec![
            Instruction::push(1),
            Instruction::push(1),
            Instruction::op(Opcode::Ret),
        ];
        assert!(!CommonSubexpressionElimination.can_optimize(&program));
    }
}

//! Dead-code elimination via CFG reachability.
//!
//! Builds the instruction-level CFG, walks it depth-first from index 0, and
//! drops every instruction the walk never reaches, preserving the relative
//! order of survivors. Instructions reachable only through a backward (loop)
//! edge are reachable like any other and are retained.
//!
//! Deleting instructions shifts every later index, so surviving branch
//! targets are renumbered through the old-to-new [`IndexMap`]; a removed
//! target resolves to the next surviving instruction.

use crate::analysis::ControlFlowGraph;
use crate::instruction::{remap_branch_targets, IndexMap, Instruction};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The dead-code-elimination pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeElimination;

impl OptimizationPass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::DeadCodeElimination
    }

    fn description(&self) -> &'static str {
        "Removes instructions unreachable from the entry point"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE
    }

    fn can_optimize(&self, _instructions: &[Instruction]) -> bool {
        true
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let (survivors, assignments) = eliminate_unreachable(instructions);
        let map = IndexMap::from_assignments(&assignments, survivors.len());
        Ok(remap_branch_targets(survivors, &map))
    }
}

/// Drops unreachable instructions, returning the survivors (targets not yet
/// renumbered) and the old-to-new assignments.
pub(crate) fn eliminate_unreachable(
    instructions: &[Instruction],
) -> (Vec<Instruction>, Vec<Option<usize>>) {
    let reachable = ControlFlowGraph::build(instructions).reachable();
    let mut survivors = Vec::with_capacity(instructions.len());
    let mut assignments = vec![None; instructions.len()];

    for (index, instruction) in instructions.iter().enumerate() {
        if reachable[index] {
            assignments[index] = Some(survivors.len());
            survivors.push(instruction.clone());
        }
    }

    (survivors, assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;

    fn optimize(program: &[Instruction]) -> Vec<Instruction> {
        DeadCodeElimination.optimize(program).unwrap()
    }

    #[test]
    fn test_drops_skipped_instructions_and_renumbers() {
        let program = vec![
            Instruction::branch(Opcode::Jmp, 3),
            Instruction::push(1),
            Instruction::push(2),
            Instruction::op(Opcode::Ret),
        ];
        let optimized = optimize(&program);

        assert_eq!(optimized.len(), 2);
        assert_eq!(optimized[0].branch_target(), Some(1));
        assert_eq!(optimized[1].opcode(), Opcode::Ret);
    }

    #[test]
    fn test_retains_loop_body_reachable_via_back_edge() {
        // Index 1 is skipped on entry and reachable only through the
        // backward JZ edge; it must survive.
        let program = vec![
            Instruction::branch(Opcode::Jmp, 2),
            Instruction::push(1),
            Instruction::op(Opcode::Cmp),
            Instruction::branch(Opcode::Jz, 1),
            Instruction::op(Opcode::Ret),
        ];
        assert_eq!(optimize(&program), program);
    }

    #[test]
    fn test_instructions_after_ret_are_dropped() {
        let program = vec![
            Instruction::op(Opcode::Ret),
            Instruction::push(1),
            Instruction::push(2),
        ];
        let optimized = optimize(&program);
        assert_eq!(optimized.len(), 1);
        assert_eq!(optimized[0].opcode(), Opcode::Ret);
    }

    #[test]
    fn test_empty_sequence_is_identity() {
        assert!(optimize(&[]).is_empty());
    }

    #[test]
    fn test_fully_reachable_sequence_is_unchanged() {
        let program = vec![
            Instruction::push(1),
            Instruction::op(Opcode::Pop),
            Instruction::op(Opcode::Ret),
        ];
        assert_eq!(optimize(&program), program);
    }
}

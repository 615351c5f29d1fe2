//! Loop detection and invariant code motion.
//!
//! A loop is any JMP/JZ/JNZ whose target index is strictly less than its own
//! index; the body spans `[target, branch]`. Per loop, computations whose
//! operands are all literals are iteration-independent and are hoisted to
//! immediately before the loop header, preserving their relative order.
//!
//! Motion shifts positions inside the body, so branch targets are rewritten:
//! a target that pointed at a hoisted instruction (the header included) now
//! lands on the first remaining body instruction, which keeps the hoisted
//! code outside the iteration path. Instructions that other branches target
//! are pinned in place rather than hoisted.
//!
//! Loops are processed independently in discovery order against the list as
//! mutated by earlier loops; nested or overlapping loops are not merged.

use crate::analysis::ControlFlowGraph;
use crate::instruction::Instruction;
use crate::passes::folding::branch_target_set;
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The loop-optimization pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopOptimizer;

impl OptimizationPass for LoopOptimizer {
    fn name(&self) -> &'static str {
        "loop-optimization"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::LoopOptimization
    }

    fn description(&self) -> &'static str {
        "Hoists loop-invariant literal computations out of loop bodies"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::REORDER | PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        !ControlFlowGraph::back_edges(instructions).is_empty()
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let mut current = instructions.to_vec();
        let mut handled = 0;

        // Back edges are re-detected after each loop's motion since the
        // motion shifts body positions.
        loop {
            let edges = ControlFlowGraph::back_edges(&current);
            if handled >= edges.len() {
                break;
            }
            let edge = edges[handled];
            current = self.hoist_invariants(current, edge.target, edge.branch);
            handled += 1;
        }

        Ok(current)
    }
}

impl LoopOptimizer {
    /// Strength-reduction extension point.
    ///
    /// Returns a cheaper equivalent for a loop-body instruction, or `None`
    /// to keep it. No reduction is implemented yet; the hook exists so body
    /// rewriting plugs into the same motion machinery.
    fn reduce_strength(&self, _instruction: &Instruction) -> Option<Instruction> {
        None
    }

    /// Hoists invariant body instructions of the loop `[header, branch]` to
    /// immediately before the header and rewrites branch targets.
    fn hoist_invariants(
        &self,
        instructions: Vec<Instruction>,
        header: usize,
        branch: usize,
    ) -> Vec<Instruction> {
        let targeted = branch_target_set(&instructions);

        let mut hoisted = Vec::new();
        let mut remaining = Vec::new();
        for index in header..branch {
            let instruction = &instructions[index];
            // The header is free to move (targets onto it follow the loop);
            // any other targeted instruction stays put.
            let pinned = index != header && targeted.contains(&index);
            if !pinned && invariant(instruction) {
                hoisted.push(index);
            } else {
                remaining.push(index);
            }
        }

        if hoisted.is_empty() {
            return instructions;
        }

        // New position of every old index; total length is unchanged.
        let body_start = header + hoisted.len();
        let mut new_position = vec![0usize; instructions.len()];
        let mut branch_landing = vec![0usize; instructions.len()];
        for index in 0..instructions.len() {
            if index < header || index >= branch {
                new_position[index] = index;
                branch_landing[index] = index;
            }
        }
        for (rank, &old) in hoisted.iter().enumerate() {
            new_position[old] = header + rank;
            // Jumping to a hoisted instruction now enters the loop where the
            // body begins; the hoisted code runs once, ahead of the loop.
            branch_landing[old] = body_start;
        }
        for (rank, &old) in remaining.iter().enumerate() {
            new_position[old] = body_start + rank;
            branch_landing[old] = body_start + rank;
        }

        let mut reordered = Vec::with_capacity(instructions.len());
        let mut slots: Vec<Option<Instruction>> = vec![None; instructions.len()];
        for (old, instruction) in instructions.into_iter().enumerate() {
            let rewritten = if old >= header && old < branch {
                self.reduce_strength(&instruction).unwrap_or(instruction)
            } else {
                instruction
            };
            slots[new_position[old]] = Some(rewritten);
        }
        for slot in slots {
            // Every slot is filled: new_position is a permutation.
            if let Some(instruction) = slot {
                reordered.push(instruction);
            }
        }

        reordered
            .into_iter()
            .map(|instruction| match instruction.branch_target() {
                Some(old) if old < branch_landing.len() => {
                    let landing = branch_landing[old];
                    if landing == old {
                        instruction
                    } else {
                        instruction.with_branch_target(landing)
                    }
                }
                _ => instruction,
            })
            .collect()
    }
}

/// Iteration-independent: a computation over literal operands only.
fn invariant(instruction: &Instruction) -> bool {
    instruction.is_computation()
        && !instruction.operands().is_empty()
        && instruction.all_literal_operands()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Opcode, Operand};

    fn lit_add(a: i64, b: i64) -> Instruction {
        Instruction::new(Opcode::Add, vec![Operand::Literal(a), Operand::Literal(b)])
    }

    fn sym_add(a: &str, b: &str) -> Instruction {
        Instruction::new(Opcode::Add, vec![a.into(), b.into()])
    }

    #[test]
    fn test_detects_loops_via_back_edges() {
        let looping = vec![
            Instruction::op(Opcode::Cmp),
            Instruction::branch(Opcode::Jnz, 0),
        ];
        let straight = vec![
            Instruction::op(Opcode::Cmp),
            Instruction::branch(Opcode::Jnz, 2),
            Instruction::op(Opcode::Ret),
        ];
        assert!(LoopOptimizer.can_optimize(&looping));
        assert!(!LoopOptimizer.can_optimize(&straight));
    }

    #[test]
    fn test_hoists_literal_computation_and_retargets_back_edge() {
        // Loop body [1, 3): an invariant ADD at the header plus a CMP.
        let program = vec![
            Instruction::push(0),
            lit_add(2, 3),
            Instruction::op(Opcode::Cmp),
            Instruction::branch(Opcode::Jnz, 1),
            Instruction::op(Opcode::Ret),
        ];
        let optimized = LoopOptimizer.optimize(&program).unwrap();

        assert_eq!(optimized.len(), program.len());
        // The ADD keeps its slot ahead of the loop; the back edge now skips
        // it, entering at the CMP.
        assert_eq!(optimized[1], lit_add(2, 3));
        assert_eq!(optimized[2].opcode(), Opcode::Cmp);
        assert_eq!(optimized[3].branch_target(), Some(2));
    }

    #[test]
    fn test_hoists_mid_body_invariant_preserving_order() {
        let program = vec![
            sym_add("i", "n"),
            lit_add(4, 4),
            lit_add(5, 5),
            Instruction::branch(Opcode::Jnz, 0),
            Instruction::op(Opcode::Ret),
        ];
        let optimized = LoopOptimizer.optimize(&program).unwrap();

        // Both literal ADDs move before the symbolic one, in order.
        assert_eq!(optimized[0], lit_add(4, 4));
        assert_eq!(optimized[1], lit_add(5, 5));
        assert_eq!(optimized[2], sym_add("i", "n"));
        // The back edge follows the moved header.
        assert_eq!(optimized[3].branch_target(), Some(2));
    }

    #[test]
    fn test_symbolic_body_is_not_hoisted() {
        let program = vec![
            sym_add("i", "n"),
            Instruction::op(Opcode::Cmp),
            Instruction::branch(Opcode::Jz, 0),
            Instruction::op(Opcode::Ret),
        ];
        assert_eq!(LoopOptimizer.optimize(&program).unwrap(), program);
    }

    #[test]
    fn test_targeted_mid_body_instruction_is_pinned() {
        // The JZ at 0 jumps straight at the invariant ADD, pinning it.
        let program = vec![
            Instruction::branch(Opcode::Jz, 2),
            sym_add("i", "n"),
            lit_add(4, 4),
            Instruction::branch(Opcode::Jnz, 1),
            Instruction::op(Opcode::Ret),
        ];
        assert_eq!(LoopOptimizer.optimize(&program).unwrap(), program);
    }
}

//! Per-basic-block sub-pipeline.
//!
//! Partitions the stream into maximal straight-line runs, each ended by a
//! JMP/JZ/JNZ/CALL/RET terminator (kept as the block's last instruction),
//! then runs constant folding, dead-code elimination, and
//! common-subexpression elimination over each block body and concatenates
//! the results. Windows never cross a block boundary.
//!
//! Each sub-step reports its old-to-new assignments instead of renumbering
//! locally; the assignments are composed per block, lifted to global
//! indices, and branch targets are rewritten once over the whole stream.

use std::collections::HashSet;

use crate::instruction::{remap_branch_targets, IndexMap, Instruction};
use crate::passes::cse::eliminate_duplicates;
use crate::passes::dce::eliminate_unreachable;
use crate::passes::folding::{branch_target_set, compose_assignments, fold_to_fixpoint};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The basic-block-optimization pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicBlockOptimizer;

impl OptimizationPass for BasicBlockOptimizer {
    fn name(&self) -> &'static str {
        "basic-block-optimization"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::BasicBlockOptimization
    }

    fn description(&self) -> &'static str {
        "Runs fold, dead-code, and CSE sub-steps over each straight-line block"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE | PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        !instructions.is_empty()
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let global_targets = branch_target_set(instructions);
        let mut out = Vec::with_capacity(instructions.len());
        let mut assignments = vec![None; instructions.len()];

        let mut start = 0;
        while start < instructions.len() {
            let mut end = start;
            while end < instructions.len() && !instructions[end].opcode().is_block_terminator() {
                end += 1;
            }
            let body = &instructions[start..end];

            // Targets landing inside this block, in block-local indices.
            let protected: HashSet<usize> = global_targets
                .iter()
                .filter(|&&target| target >= start && target < end)
                .map(|&target| target - start)
                .collect();

            let (folded, fold_assign) = fold_to_fixpoint(body, &protected);
            let (survivors, dce_assign) = eliminate_unreachable(&folded);
            let (rewritten, cse_assign) = eliminate_duplicates(&survivors);
            let local =
                compose_assignments(&compose_assignments(&fold_assign, &dce_assign), &cse_assign);

            let offset = out.len();
            for (local_old, slot) in local.iter().enumerate() {
                if let Some(new) = slot {
                    assignments[start + local_old] = Some(offset + new);
                }
            }
            out.extend(rewritten);

            if end < instructions.len() {
                assignments[end] = Some(out.len());
                out.push(instructions[end].clone());
            }
            start = end + 1;
        }

        let map = IndexMap::from_assignments(&assignments, out.len());
        Ok(remap_branch_targets(out, &map))
    }
}

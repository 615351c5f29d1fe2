//! Compare-and-branch fusion.
//!
//! Scans for a `CMP` immediately followed by a `JZ`/`JNZ` and asks the
//! fusion hook for a single combined instruction. The VM defines no fused
//! compare-and-branch encoding yet, so the hook returns `None` and every
//! stream passes through unchanged; the scan, the window collapse, and the
//! target renumbering are all in place for when an encoding lands. An
//! unmatched `CMP` is always emitted as-is, never dropped.

use crate::instruction::{remap_branch_targets, IndexMap, Instruction, Opcode};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The branch-optimization pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchOptimizer;

impl OptimizationPass for BranchOptimizer {
    fn name(&self) -> &'static str {
        "branch-optimization"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::BranchOptimization
    }

    fn description(&self) -> &'static str {
        "Fuses compare instructions into the conditional branches consuming them"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE | PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        instructions
            .iter()
            .any(|i| matches!(i.opcode(), Opcode::Cmp | Opcode::Jz | Opcode::Jnz))
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let mut out = Vec::with_capacity(instructions.len());
        let mut assignments = vec![None; instructions.len()];
        let mut changed = false;
        let mut i = 0;

        while i < instructions.len() {
            if instructions[i].opcode() == Opcode::Cmp && i + 1 < instructions.len() {
                let next = &instructions[i + 1];
                if matches!(next.opcode(), Opcode::Jz | Opcode::Jnz) {
                    if let Some(fused) = self.fuse(&instructions[i], next) {
                        assignments[i] = Some(out.len());
                        out.push(fused);
                        changed = true;
                        i += 2;
                        continue;
                    }
                }
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

impl BranchOptimizer {
    /// Fusion extension point: one instruction equivalent to `compare`
    /// followed by `branch`, or `None` to keep the pair.
    ///
    /// There is no fused compare-and-branch opcode in the vocabulary yet.
    #[allow(clippy::unused_self)]
    fn fuse(&self, _compare: &Instruction, _branch: &Instruction) -> Option<Instruction> {
        None
    }
}

//! Allow-list function inlining.
//!
//! A `CALL` whose target name appears in the fixed allow-list is replaced by
//! the registered literal instruction body; any other call is left
//! untouched. This is explicit allow-list inlining of known-small functions,
//! not cost-based inlining. Bodies must be straight-line (no internal
//! branches): their instructions are spliced verbatim at the call site, and
//! downstream branch targets are renumbered for the size change.

use std::collections::HashMap;

use crate::instruction::{remap_branch_targets, IndexMap, Instruction, Opcode};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The function-inlining pass.
#[derive(Debug, Clone, Default)]
pub struct FunctionInliner {
    bodies: HashMap<String, Vec<Instruction>>,
}

impl FunctionInliner {
    /// Creates an inliner with an empty allow-list (every call passes
    /// through).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function body, builder style.
    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>, body: Vec<Instruction>) -> Self {
        debug_assert!(body.iter().all(|i| !i.opcode().is_branch()));
        self.bodies.insert(name.into(), body);
        self
    }

    /// Names currently on the allow-list.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.bodies.keys().map(String::as_str)
    }

    fn body_for(&self, instruction: &Instruction) -> Option<&[Instruction]> {
        if instruction.opcode() != Opcode::Call {
            return None;
        }
        let name = instruction.operands().first()?.as_symbol()?;
        self.bodies.get(name).map(Vec::as_slice)
    }
}

impl OptimizationPass for FunctionInliner {
    fn name(&self) -> &'static str {
        "function-inlining"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::FunctionInlining
    }

    fn description(&self) -> &'static str {
        "Splices allow-listed function bodies over their call sites"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE | PassEffects::INSERT
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        instructions.iter().any(|i| self.body_for(i).is_some())
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let mut out = Vec::with_capacity(instructions.len());
        let mut assignments = vec![None; instructions.len()];
        let mut changed = false;

        for (index, instruction) in instructions.iter().enumerate() {
            assignments[index] = Some(out.len());
            match self.body_for(instruction) {
                Some(body) => {
                    out.extend(body.iter().cloned());
                    changed = true;
                }
                None => out.push(instruction.clone()),
            }
        }

        if !changed {
            return Ok(out);
        }
        let map = IndexMap::from_assignments(&assignments, out.len());
        Ok(remap_branch_targets(out, &map))
    }
}

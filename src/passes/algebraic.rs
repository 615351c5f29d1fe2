//! Single-instruction algebraic identities.
//!
//! Rewrites an instruction in place, regardless of position, when an
//! operand makes the operation trivial:
//!
//! - `MUL x, 0` (either side) -> push literal `0`
//! - `MUL x, 1` (either side) -> the surviving value
//! - `DIV x, 1` -> the dividend
//!
//! "The surviving value" is a literal `PUSH` when it is a literal and a
//! `LOAD` of the symbol otherwise, provenance recorded either way. Every
//! rewrite is 1:1, so indices never shift; rewritten instructions are plain
//! memory operations and never match again, making the pass idempotent.

use crate::instruction::{Instruction, Opcode, Operand};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The algebraic-identity pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructionOptimizer;

impl OptimizationPass for InstructionOptimizer {
    fn name(&self) -> &'static str {
        "instruction-optimization"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::InstructionOptimization
    }

    fn description(&self) -> &'static str {
        "Simplifies single instructions through algebraic identities"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        instructions.iter().any(|i| simplify(i).is_some())
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        Ok(instructions
            .iter()
            .map(|instruction| simplify(instruction).unwrap_or_else(|| instruction.clone()))
            .collect())
    }
}

/// Returns the simplified form of one instruction, or `None` when no
/// identity applies.
fn simplify(instruction: &Instruction) -> Option<Instruction> {
    let operands = instruction.operands();
    if operands.len() != 2 {
        return None;
    }
    let (lhs, rhs) = (&operands[0], &operands[1]);

    match instruction.opcode() {
        Opcode::Mul => {
            // Zero dominates before the unit is considered.
            if lhs.as_literal() == Some(0) || rhs.as_literal() == Some(0) {
                return Some(Instruction::folded_push(0, instruction));
            }
            if rhs.as_literal() == Some(1) {
                return Some(value_of(lhs, instruction));
            }
            if lhs.as_literal() == Some(1) {
                return Some(value_of(rhs, instruction));
            }
            None
        }
        Opcode::Div => {
            if rhs.as_literal() == Some(1) {
                return Some(value_of(lhs, instruction));
            }
            None
        }
        _ => None,
    }
}

/// An instruction yielding the operand's value, carrying the provenance of
/// the instruction it replaces.
fn value_of(operand: &Operand, original: &Instruction) -> Instruction {
    match operand {
        Operand::Literal(value) => Instruction::folded_push(*value, original),
        Operand::Symbol(name) => {
            let mut load =
                Instruction::new(Opcode::Load, vec![Operand::Symbol(name.clone())]);
            for (key, value) in original.provenance() {
                load = load.with_metadata(&key, value);
            }
            load
        }
    }
}

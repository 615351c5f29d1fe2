//! Constant folding.
//!
//! Two shapes are folded into a single literal `PUSH` (kind MEMORY, one
//! cycle, provenance recorded):
//!
//! - an ARITHMETIC/LOGICAL instruction whose operand list is all-literal
//!   with the operation's arity, rewritten 1:1 in place
//! - the stack-shaped windows `PUSH a, PUSH b, <binop>` and
//!   `PUSH a, <unop>` where the operation carries no operands of its own
//!
//! Division or remainder by a literal zero is never folded, preserving the
//! VM's own divide-by-zero semantics; any other evaluation failure
//! (overflow, bad arity) also leaves the instruction unmodified. A window
//! is skipped when a branch targets its interior, since the collapsed
//! replacement would have no position for that target to land on.
//!
//! Folding runs to a local fixpoint so chains like
//! `PUSH 2, PUSH 3, ADD, PUSH 4, MUL` collapse in one `optimize` call,
//! making the pass idempotent. Window collapses shift indices, so branch
//! targets are renumbered before returning.

use std::collections::HashSet;

use crate::instruction::{remap_branch_targets, IndexMap, Instruction, Opcode};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The constant-folding pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantFolding;

impl OptimizationPass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::ConstantFolding
    }

    fn description(&self) -> &'static str {
        "Evaluates all-literal computations and stack-shaped literal windows at optimization time"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE | PassEffects::REWRITE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        let protected = branch_target_set(instructions);
        (0..instructions.len()).any(|i| {
            operand_fold_candidate(&instructions[i])
                || window_at(instructions, i, &protected).is_some()
        })
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let protected = branch_target_set(instructions);
        let (folded, assignments) = fold_to_fixpoint(instructions, &protected);
        let map = IndexMap::from_assignments(&assignments, folded.len());
        Ok(remap_branch_targets(folded, &map))
    }
}

/// Collects every branch target in the sequence.
pub(crate) fn branch_target_set(instructions: &[Instruction]) -> HashSet<usize> {
    instructions
        .iter()
        .filter_map(Instruction::branch_target)
        .collect()
}

/// Composes two old-to-new assignment vectors: `first` maps the original
/// indices into an intermediate sequence, `second` maps that intermediate
/// sequence into the final one.
pub(crate) fn compose_assignments(
    first: &[Option<usize>],
    second: &[Option<usize>],
) -> Vec<Option<usize>> {
    first
        .iter()
        .map(|slot| slot.and_then(|mid| second.get(mid).copied().flatten()))
        .collect()
}

/// Folds repeatedly until no instruction changes, returning the final
/// sequence and the composed original-index assignments.
///
/// `protected` holds indices (into `instructions`) that a branch targets;
/// windows containing one in their interior are not collapsed. Branch
/// targets inside the returned sequence are NOT rewritten; the caller remaps
/// them through the assignments exactly once.
pub(crate) fn fold_to_fixpoint(
    instructions: &[Instruction],
    protected: &HashSet<usize>,
) -> (Vec<Instruction>, Vec<Option<usize>>) {
    let mut current = instructions.to_vec();
    let mut protected = protected.clone();
    let mut overall: Vec<Option<usize>> = (0..instructions.len()).map(Some).collect();

    loop {
        let (next, assignments, changed) = fold_once(&current, &protected);
        if !changed {
            return (current, overall);
        }

        let map = IndexMap::from_assignments(&assignments, next.len());
        protected = protected.iter().map(|&t| map.resolve(t)).collect();
        overall = compose_assignments(&overall, &assignments);
        current = next;
    }
}

/// One left-to-right folding sweep.
fn fold_once(
    instructions: &[Instruction],
    protected: &HashSet<usize>,
) -> (Vec<Instruction>, Vec<Option<usize>>, bool) {
    let mut out = Vec::with_capacity(instructions.len());
    let mut assignments = vec![None; instructions.len()];
    let mut changed = false;
    let mut i = 0;

    while i < instructions.len() {
        if let Some((width, folded)) = window_at(instructions, i, protected) {
            assignments[i] = Some(out.len());
            out.push(folded);
            changed = true;
            i += width;
            continue;
        }

        let instruction = &instructions[i];
        assignments[i] = Some(out.len());
        if operand_fold_candidate(instruction) {
            // Only Ok folds; evaluation failures keep the instruction.
            if let Some(args) = instruction.literal_operands() {
                if let Ok(value) = instruction.opcode().evaluate(&args) {
                    out.push(Instruction::folded_push(value, instruction));
                    changed = true;
                    i += 1;
                    continue;
                }
            }
        }
        out.push(instruction.clone());
        i += 1;
    }

    (out, assignments, changed)
}

/// A computation whose operand list carries its arguments as literals.
fn operand_fold_candidate(instruction: &Instruction) -> bool {
    instruction.is_computation()
        && instruction.opcode().eval_arity() == Some(instruction.operands().len())
        && !instruction.operands().is_empty()
        && instruction.all_literal_operands()
}

/// Matches a foldable stack window starting at `start`, longest first.
///
/// Returns the window width and the replacement instruction, or `None` when
/// no window matches, its interior is branch-targeted, or evaluation fails.
fn window_at(
    instructions: &[Instruction],
    start: usize,
    protected: &HashSet<usize>,
) -> Option<(usize, Instruction)> {
    // PUSH a, PUSH b, <binop>
    if start + 2 < instructions.len()
        && !protected.contains(&(start + 1))
        && !protected.contains(&(start + 2))
    {
        if let (Some(a), Some(b)) = (
            push_literal(&instructions[start]),
            push_literal(&instructions[start + 1]),
        ) {
            let op = &instructions[start + 2];
            if stack_operation(op, 2) {
                if let Ok(value) = op.opcode().evaluate(&[a, b]) {
                    return Some((3, Instruction::folded_push(value, op)));
                }
            }
        }
    }

    // PUSH a, <unop>
    if start + 1 < instructions.len() && !protected.contains(&(start + 1)) {
        if let Some(a) = push_literal(&instructions[start]) {
            let op = &instructions[start + 1];
            if stack_operation(op, 1) {
                if let Ok(value) = op.opcode().evaluate(&[a]) {
                    return Some((2, Instruction::folded_push(value, op)));
                }
            }
        }
    }

    None
}

fn push_literal(instruction: &Instruction) -> Option<i64> {
    if instruction.opcode() == Opcode::Push && instruction.operands().len() == 1 {
        instruction.operands()[0].as_literal()
    } else {
        None
    }
}

/// A computation that takes its arguments from the stack (no operands).
fn stack_operation(instruction: &Instruction, arity: usize) -> bool {
    instruction.is_computation()
        && instruction.operands().is_empty()
        && instruction.opcode().eval_arity() == Some(arity)
}

//! Dataflow-guided elimination.
//!
//! Runs both shipped analyses over the sequence - available expressions
//! (forward) and live variables (backward) - and removes only instructions
//! proven redundant by the first AND dead by the second. The elimination
//! predicate additionally requires that the instruction's result has no
//! unmodeled consumer; stack effects are not modeled yet, so the predicate
//! never fires and every sequence passes through unchanged. The analyses
//! themselves are real, computed on every application, and exposed through
//! [`crate::analysis::dataflow`] for a completed predicate to build on.

use crate::analysis::dataflow::{
    AnalysisResults, AvailSet, AvailableExpressions, LiveSet, LiveVariables,
};
use crate::instruction::{remap_branch_targets, ExprKey, IndexMap, Instruction};
use crate::passes::{OptimizationKind, OptimizationPass, PassEffects};
use crate::Result;

/// The dataflow-optimization pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFlowOptimizer;

impl OptimizationPass for DataFlowOptimizer {
    fn name(&self) -> &'static str {
        "dataflow-optimization"
    }

    fn kind(&self) -> OptimizationKind {
        OptimizationKind::DataFlowOptimization
    }

    fn description(&self) -> &'static str {
        "Removes instructions proven redundant and dead by dataflow analysis"
    }

    fn effects(&self) -> PassEffects {
        PassEffects::DELETE
    }

    fn can_optimize(&self, instructions: &[Instruction]) -> bool {
        !instructions.is_empty()
    }

    fn optimize(&self, instructions: &[Instruction]) -> Result<Vec<Instruction>> {
        let available = AvailableExpressions::compute(instructions);
        let live = LiveVariables::compute(instructions);

        let mut out = Vec::with_capacity(instructions.len());
        let mut assignments = vec![None; instructions.len()];
        for (index, instruction) in instructions.iter().enumerate() {
            if should_eliminate(index, instruction, &available, &live) {
                continue;
            }
            assignments[index] = Some(out.len());
            out.push(instruction.clone());
        }

        if out.len() == instructions.len() {
            return Ok(out);
        }
        let map = IndexMap::from_assignments(&assignments, out.len());
        Ok(remap_branch_targets(out, &map))
    }
}

/// The elimination predicate: erase only with proof from both analyses.
///
/// Redundancy proof: the instruction's expression signature is available on
/// entry, so an earlier computation already produced the value. Deadness
/// proof: none of its symbolic operands is live on exit. Both hold for real
/// sequences, but neither covers the evaluation stack - an unmodeled
/// consumer may still pop this instruction's result - so the final answer
/// stays `false` until stack effects are part of the analyses.
fn should_eliminate(
    index: usize,
    instruction: &Instruction,
    available: &AnalysisResults<AvailSet>,
    live: &AnalysisResults<LiveSet>,
) -> bool {
    let Some(key) = ExprKey::of(instruction) else {
        return false;
    };

    let redundant = available
        .before(index)
        .is_some_and(|facts| facts.contains(&key));
    let dead = live.after(index).is_some_and(|facts| {
        instruction
            .operands()
            .iter()
            .filter_map(|operand| operand.as_symbol())
            .all(|symbol| !facts.is_live(symbol))
    });

    if !redundant || !dead {
        return false;
    }

    // Proof of redundancy and deadness does not yet extend to stack
    // consumers.
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Opcode;

    fn add(a: &str, b: &str) -> Instruction {
        Instruction::new(Opcode::Add, vec![a.into(), b.into()])
    }

    #[test]
    fn test_never_eliminates_without_stack_model() {
        // Textbook-redundant and dead by both analyses, still preserved.
        let program = vec![add("a", "b"), add("a", "b"), Instruction::op(Opcode::Ret)];
        assert_eq!(DataFlowOptimizer.optimize(&program).unwrap(), program);
    }

    #[test]
    fn test_predicate_sees_both_proofs() {
        let program = vec![add("a", "b"), add("a", "b"), Instruction::op(Opcode::Ret)];
        let available = AvailableExpressions::compute(&program);
        let live = LiveVariables::compute(&program);

        let key = ExprKey::of(&program[1]).unwrap();
        assert!(available.before(1).unwrap().contains(&key));
        assert!(!live.after(1).unwrap().is_live("a"));
        assert!(!should_eliminate(1, &program[1], &available, &live));
    }

    #[test]
    fn test_empty_sequence_is_not_applicable() {
        assert!(!DataFlowOptimizer.can_optimize(&[]));
    }
}

//! End-to-end pipeline tests over the public API.

use std::time::Duration;

use optforge::instruction::{Instruction, Opcode, Operand};
use optforge::passes::{
    ConstantFolding, DeadCodeElimination, FunctionInliner, InstructionOptimizer,
    OptimizationContext, OptimizationKind, OptimizationPass, PeepholeOptimizer,
};
use optforge::pipeline::{OptimizerRegistry, Pipeline};
use strum::IntoEnumIterator;

fn apply(pass: &dyn OptimizationPass, program: &[Instruction]) -> Vec<Instruction> {
    let result = pass.apply(program, &OptimizationContext::new(pass.kind()));
    result.instructions
}

#[test]
fn folding_collapses_stack_expression_to_one_push() {
    let program = vec![
        Instruction::push(2),
        Instruction::push(3),
        Instruction::op(Opcode::Add),
    ];

    let result = ConstantFolding.apply(
        &program,
        &OptimizationContext::new(OptimizationKind::ConstantFolding),
    );

    assert!(result.success);
    assert_eq!(result.instructions.len(), 1);
    assert_eq!(result.instructions[0].operands(), &[Operand::Literal(5)]);
    assert_eq!(result.instructions[0].estimated_cycles(), 1);
    assert_eq!(result.improvement.instructions_removed, 2);
    assert!(result.improvement.cycles_saved > 0);
}

#[test]
fn folding_leaves_division_by_zero_alone() {
    let program = vec![
        Instruction::new(Opcode::Push, vec![Operand::Symbol("x".into())]),
        Instruction::push(0),
        Instruction::op(Opcode::Div),
    ];

    let result = ConstantFolding.apply(
        &program,
        &OptimizationContext::new(OptimizationKind::ConstantFolding),
    );

    // Not applicable is reported, never a crash or a wrong fold.
    assert!(!result.success);
    assert_eq!(result.instructions, program);
}

#[test]
fn dead_code_elimination_drops_skipped_range_and_renumbers() {
    let program = vec![
        Instruction::branch(Opcode::Jmp, 3),
        Instruction::push(1),
        Instruction::push(2),
        Instruction::op(Opcode::Ret),
    ];

    let optimized = apply(&DeadCodeElimination, &program);
    assert_eq!(optimized.len(), 2);
    assert_eq!(optimized[0].opcode(), Opcode::Jmp);
    assert_eq!(optimized[0].branch_target(), Some(1));
    assert_eq!(optimized[1].opcode(), Opcode::Ret);
}

#[test]
fn dead_code_elimination_keeps_back_edge_targets() {
    let program = vec![
        Instruction::branch(Opcode::Jmp, 2),
        Instruction::push(1),
        Instruction::op(Opcode::Cmp),
        Instruction::branch(Opcode::Jz, 1),
        Instruction::op(Opcode::Ret),
    ];

    assert_eq!(apply(&DeadCodeElimination, &program), program);
}

#[test]
fn peephole_applies_multiplication_identities() {
    for value in [0, 1] {
        let program = vec![Instruction::push(value), Instruction::op(Opcode::Mul)];
        let optimized = apply(&PeepholeOptimizer::new(), &program);
        assert_eq!(optimized, vec![Instruction::push(value)]);
    }
}

#[test]
fn rewriting_passes_are_idempotent() {
    let program = vec![
        Instruction::push(2),
        Instruction::push(3),
        Instruction::op(Opcode::Add),
        Instruction::push(1),
        Instruction::op(Opcode::Mul),
        Instruction::new(Opcode::Mul, vec!["x".into(), Operand::Literal(1)]),
        Instruction::op(Opcode::Ret),
    ];

    let passes: Vec<Box<dyn OptimizationPass>> = vec![
        Box::new(ConstantFolding),
        Box::new(PeepholeOptimizer::new()),
        Box::new(InstructionOptimizer),
    ];
    for pass in passes {
        let once = pass.optimize(&program).unwrap();
        let twice = pass.optimize(&once).unwrap();
        assert_eq!(twice, once, "{} is not idempotent", pass.name());
    }
}

#[test]
fn registry_builds_every_kind_and_rejects_missing_ones() {
    let registry = OptimizerRegistry::with_builtins();
    for kind in OptimizationKind::iter() {
        let pass = registry.build(kind).expect("builtin kind must build");
        assert_eq!(pass.kind(), kind);
        assert!(!pass.name().is_empty());
        assert!(!pass.description().is_empty());
    }

    let empty = OptimizerRegistry::new();
    assert!(empty.build(OptimizationKind::LoopOptimization).is_err());
}

#[test]
fn inliner_splices_allow_listed_body() {
    let inliner = FunctionInliner::new().with_function(
        "double",
        vec![Instruction::push(2), Instruction::op(Opcode::Mul)],
    );
    let program = vec![
        Instruction::push(21),
        Instruction::new(Opcode::Call, vec![Operand::Symbol("double".into())]),
        Instruction::op(Opcode::Ret),
    ];

    let optimized = apply(&inliner, &program);
    assert_eq!(optimized.len(), 4);
    assert_eq!(optimized[1], Instruction::push(2));
    assert_eq!(optimized[2].opcode(), Opcode::Mul);

    let unknown = vec![
        Instruction::new(Opcode::Call, vec![Operand::Symbol("triple".into())]),
        Instruction::op(Opcode::Ret),
    ];
    let result = inliner.apply(
        &unknown,
        &OptimizationContext::new(OptimizationKind::FunctionInlining),
    );
    assert!(!result.success);
    assert_eq!(result.instructions, unknown);
}

#[test]
fn pipeline_chains_passes_and_renumbers_shifted_targets() {
    // Folding collapses indices 1-3 into one PUSH; the JMP at 0 skipping them
    // and the JZ at 4 jumping back over them must both follow the shift.
    let program = vec![
        Instruction::branch(Opcode::Jmp, 4),
        Instruction::push(2),
        Instruction::push(3),
        Instruction::op(Opcode::Add),
        Instruction::branch(Opcode::Jz, 1),
        Instruction::op(Opcode::Ret),
    ];

    let registry = OptimizerRegistry::with_builtins();
    let pipeline = Pipeline::new().with_stage(
        registry.build(OptimizationKind::ConstantFolding).unwrap(),
        OptimizationContext::new(OptimizationKind::ConstantFolding),
    );

    let report = pipeline.run(&program);
    assert_eq!(report.instructions.len(), 4);
    assert_eq!(report.instructions[0].branch_target(), Some(2));
    assert_eq!(report.instructions[2].branch_target(), Some(1));
    assert_eq!(report.instructions[3].opcode(), Opcode::Ret);
}

#[test]
fn fixpoint_driver_is_bounded_and_total() {
    let registry = OptimizerRegistry::with_builtins();
    let mut pipeline = Pipeline::new()
        .with_max_iterations(4)
        .with_timeout(Duration::from_millis(200));
    for kind in [
        OptimizationKind::ConstantFolding,
        OptimizationKind::DeadCodeElimination,
        OptimizationKind::PeepholeOptimization,
    ] {
        pipeline.add_stage(
            registry.build(kind).unwrap(),
            OptimizationContext::new(kind),
        );
    }

    let program = vec![
        Instruction::branch(Opcode::Jmp, 3),
        Instruction::push(9),
        Instruction::push(9),
        Instruction::push(2),
        Instruction::push(3),
        Instruction::op(Opcode::Add),
        Instruction::op(Opcode::Ret),
    ];

    let report = pipeline.run_to_fixpoint(&program);
    assert!(report.results.len() <= 4);
    assert!(!report.instructions.is_empty());
    assert_eq!(
        *report.instructions.last().unwrap(),
        Instruction::op(Opcode::Ret)
    );
}

#[test]
fn batch_driver_is_deterministic_across_sequences() {
    let registry = OptimizerRegistry::with_builtins();
    let pipeline = Pipeline::new().with_stage(
        registry.build(OptimizationKind::ConstantFolding).unwrap(),
        OptimizationContext::new(OptimizationKind::ConstantFolding),
    );

    let sequences: Vec<Vec<Instruction>> = (0..16)
        .map(|i| {
            vec![
                Instruction::push(i),
                Instruction::push(i + 1),
                Instruction::op(Opcode::Add),
                Instruction::op(Opcode::Ret),
            ]
        })
        .collect();

    let batch = pipeline.optimize_batch(&sequences);
    assert_eq!(batch.reports.len(), sequences.len());
    for (i, report) in batch.reports.iter().enumerate() {
        assert_eq!(report.instructions.len(), 2);
        assert_eq!(
            report.instructions[0].operands(),
            &[Operand::Literal(2 * i as i64 + 1)]
        );
    }

    let stats = batch.per_kind[&OptimizationKind::ConstantFolding];
    assert_eq!(stats.applications, sequences.len());
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.instructions_removed, 2 * sequences.len() as i64);
}

#[test]
fn declared_effects_match_observed_behavior() {
    let registry = OptimizerRegistry::with_builtins();
    let program = vec![
        Instruction::branch(Opcode::Jmp, 3),
        Instruction::push(2),
        Instruction::push(3),
        Instruction::op(Opcode::Ret),
    ];

    for kind in OptimizationKind::iter() {
        let pass = registry.build(kind).unwrap();
        let result = pass.apply(&program, &OptimizationContext::new(kind));
        if result.success && result.instructions.len() != program.len() {
            assert!(
                pass.effects().shifts_indices(),
                "{} shrank the stream without declaring it",
                pass.name()
            );
        }
    }
}

#[test]
fn disabled_context_is_a_reported_no_op() {
    let program = vec![
        Instruction::push(2),
        Instruction::push(3),
        Instruction::op(Opcode::Add),
    ];
    let ctx = OptimizationContext::new(OptimizationKind::ConstantFolding).disabled();

    let result = ConstantFolding.apply(&program, &ctx);
    assert!(!result.success);
    assert_eq!(result.instructions, program);
    assert!(!result.errors.is_empty());
}

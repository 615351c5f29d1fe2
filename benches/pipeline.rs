//! Benchmarks for the optimization pipeline.
//!
//! Measures the hot paths a driver exercises per sequence:
//! - single-pass application (folding, dead-code, peephole)
//! - CFG construction and dataflow solving
//! - a full multi-stage fixpoint run

extern crate optforge;

use criterion::{criterion_group, criterion_main, Criterion};
use optforge::analysis::dataflow::{AvailableExpressions, LiveVariables};
use optforge::analysis::ControlFlowGraph;
use optforge::instruction::{Instruction, Opcode, Operand};
use optforge::passes::{OptimizationContext, OptimizationKind, OptimizationPass};
use optforge::pipeline::{OptimizerRegistry, Pipeline};
use std::hint::black_box;

/// A synthetic sequence mixing foldable windows, a loop, and branches.
fn workload(expressions: usize) -> Vec<Instruction> {
    let mut program = Vec::new();
    for i in 0..expressions as i64 {
        program.push(Instruction::push(i));
        program.push(Instruction::push(i + 1));
        program.push(Instruction::op(Opcode::Add));
    }
    let loop_header = program.len();
    program.push(Instruction::new(
        Opcode::Add,
        vec![Operand::Symbol("i".into()), Operand::Literal(1)],
    ));
    program.push(Instruction::op(Opcode::Cmp));
    program.push(Instruction::branch(Opcode::Jnz, loop_header));
    program.push(Instruction::op(Opcode::Ret));
    program
}

fn bench_constant_folding(c: &mut Criterion) {
    let program = workload(64);
    let registry = OptimizerRegistry::with_builtins();
    let pass = registry.build(OptimizationKind::ConstantFolding).unwrap();
    let ctx = OptimizationContext::new(OptimizationKind::ConstantFolding);

    c.bench_function("pass_constant_folding_64", |b| {
        b.iter(|| black_box(pass.apply(black_box(&program), &ctx)));
    });
}

fn bench_dead_code_elimination(c: &mut Criterion) {
    let mut program = vec![Instruction::branch(Opcode::Jmp, 129)];
    program.extend(workload(42));
    let registry = OptimizerRegistry::with_builtins();
    let pass = registry
        .build(OptimizationKind::DeadCodeElimination)
        .unwrap();
    let ctx = OptimizationContext::new(OptimizationKind::DeadCodeElimination);

    c.bench_function("pass_dead_code_elimination", |b| {
        b.iter(|| black_box(pass.apply(black_box(&program), &ctx)));
    });
}

fn bench_peephole(c: &mut Criterion) {
    let mut program = Vec::new();
    for _ in 0..64 {
        program.push(Instruction::push(1));
        program.push(Instruction::op(Opcode::Mul));
    }
    program.push(Instruction::op(Opcode::Ret));
    let registry = OptimizerRegistry::with_builtins();
    let pass = registry
        .build(OptimizationKind::PeepholeOptimization)
        .unwrap();
    let ctx = OptimizationContext::new(OptimizationKind::PeepholeOptimization);

    c.bench_function("pass_peephole_64_windows", |b| {
        b.iter(|| black_box(pass.apply(black_box(&program), &ctx)));
    });
}

fn bench_cfg_construction(c: &mut Criterion) {
    let program = workload(128);

    c.bench_function("cfg_build_reachable", |b| {
        b.iter(|| {
            let cfg = ControlFlowGraph::build(black_box(&program));
            black_box(cfg.reachable())
        });
    });
}

fn bench_dataflow_analyses(c: &mut Criterion) {
    let mut program = Vec::new();
    for i in 0..32 {
        program.push(Instruction::new(
            Opcode::Add,
            vec![
                Operand::Symbol(format!("v{}", i % 8)),
                Operand::Symbol(format!("v{}", (i + 1) % 8)),
            ],
        ));
        program.push(Instruction::new(
            Opcode::Store,
            vec![Operand::Symbol(format!("v{}", i % 8))],
        ));
    }
    program.push(Instruction::op(Opcode::Ret));

    c.bench_function("dataflow_available_expressions", |b| {
        b.iter(|| black_box(AvailableExpressions::compute(black_box(&program))));
    });
    c.bench_function("dataflow_live_variables", |b| {
        b.iter(|| black_box(LiveVariables::compute(black_box(&program))));
    });
}

fn bench_full_pipeline_fixpoint(c: &mut Criterion) {
    let program = workload(32);
    let registry = OptimizerRegistry::with_builtins();
    let mut pipeline = Pipeline::new();
    for kind in [
        OptimizationKind::ConstantFolding,
        OptimizationKind::DeadCodeElimination,
        OptimizationKind::PeepholeOptimization,
        OptimizationKind::InstructionOptimization,
        OptimizationKind::LoopOptimization,
    ] {
        pipeline.add_stage(
            registry.build(kind).unwrap(),
            OptimizationContext::new(kind),
        );
    }

    c.bench_function("pipeline_fixpoint_five_stages", |b| {
        b.iter(|| black_box(pipeline.run_to_fixpoint(black_box(&program))));
    });
}

criterion_group!(
    benches,
    bench_constant_folding,
    bench_dead_code_elimination,
    bench_peephole,
    bench_cfg_construction,
    bench_dataflow_analyses,
    bench_full_pipeline_fixpoint,
);
criterion_main!(benches);

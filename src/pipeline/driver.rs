//! The pipeline driver.
//!
//! A [`Pipeline`] owns an ordered list of stages (pass + context) and drives
//! them over instruction sequences. Failure never aborts a run: a failed
//! pass contributes its failed [`OptimizationResult`] and the driver
//! continues from the last good sequence.
//!
//! Fixpoint driving is bounded by both an application count and a
//! wall-clock budget, since fold / dead-code / fold chains are not
//! guaranteed to converge in a fixed number of naive sweeps; on exceeding
//! either bound the best sequence so far is returned, never an error.
//!
//! Batch driving fans disjoint sequences out over rayon and aggregates
//! per-kind counters in a [`DashMap`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::instruction::Instruction;
use crate::passes::{
    Improvement, OptimizationContext, OptimizationKind, OptimizationPass, OptimizationResult,
};

/// Default bound on pass applications in fixpoint mode.
const DEFAULT_MAX_ITERATIONS: usize = 32;
/// Default wall-clock budget in fixpoint mode.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

struct Stage {
    pass: Box<dyn OptimizationPass>,
    context: OptimizationContext,
}

/// An ordered pass pipeline.
pub struct Pipeline {
    stages: Vec<Stage>,
    max_iterations: usize,
    timeout: Duration,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Creates an empty pipeline with default fixpoint bounds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Appends a stage, builder style.
    #[must_use]
    pub fn with_stage(
        mut self,
        pass: Box<dyn OptimizationPass>,
        context: OptimizationContext,
    ) -> Self {
        self.add_stage(pass, context);
        self
    }

    /// Appends a stage.
    pub fn add_stage(&mut self, pass: Box<dyn OptimizationPass>, context: OptimizationContext) {
        self.stages.push(Stage { pass, context });
    }

    /// Bounds the total number of pass applications in fixpoint mode.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Bounds the wall-clock time spent in fixpoint mode.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage once, in order.
    #[must_use]
    pub fn run(&self, instructions: &[Instruction]) -> PipelineReport {
        let started = Instant::now();
        let mut current = instructions.to_vec();
        let mut results = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let result = self.apply_stage(stage, &mut current);
            results.push(result);
        }

        PipelineReport {
            original_len: instructions.len(),
            instructions: current,
            results,
            iterations: self.stages.len().min(1),
            elapsed: started.elapsed(),
        }
    }

    /// Re-runs the stage list until the sequence stops changing, a bound is
    /// hit, or the budget expires - whichever comes first.
    ///
    /// Always returns the cheapest sequence observed so far; exceeding
    /// `max_iterations` or the timeout is not an error.
    #[must_use]
    pub fn run_to_fixpoint(&self, instructions: &[Instruction]) -> PipelineReport {
        let started = Instant::now();
        let mut current = instructions.to_vec();
        let mut best = current.clone();
        let mut results = Vec::new();
        let mut applications = 0;
        let mut sweeps = 0;

        'sweeps: loop {
            let before_sweep = current.clone();
            sweeps += 1;

            for stage in &self.stages {
                if applications >= self.max_iterations || started.elapsed() >= self.timeout {
                    break 'sweeps;
                }
                applications += 1;
                let result = self.apply_stage(stage, &mut current);
                results.push(result);

                if cheaper(&current, &best) {
                    best = current.clone();
                }
            }

            if current == before_sweep {
                break;
            }
        }

        PipelineReport {
            original_len: instructions.len(),
            instructions: best,
            results,
            iterations: sweeps,
            elapsed: started.elapsed(),
        }
    }

    /// Optimizes disjoint sequences in parallel (one [`run`](Self::run)
    /// sweep each) and aggregates per-kind statistics.
    #[must_use]
    pub fn optimize_batch(&self, sequences: &[Vec<Instruction>]) -> BatchReport {
        let per_kind: DashMap<OptimizationKind, KindStats> = DashMap::new();

        let reports: Vec<PipelineReport> = sequences
            .par_iter()
            .map(|sequence| {
                let report = self.run(sequence);
                for result in &report.results {
                    let mut stats = per_kind.entry(result.kind).or_default();
                    stats.applications += 1;
                    if result.success {
                        stats.instructions_removed += result.improvement.instructions_removed;
                        stats.cycles_saved += result.improvement.cycles_saved;
                    } else {
                        stats.failures += 1;
                    }
                }
                report
            })
            .collect();

        BatchReport {
            reports,
            per_kind: per_kind.into_iter().collect(),
        }
    }

    fn apply_stage(&self, stage: &Stage, current: &mut Vec<Instruction>) -> OptimizationResult {
        let result = stage.pass.apply(current, &stage.context);
        if result.success {
            debug_assert!(
                result.instructions.len() == current.len()
                    || stage.pass.effects().shifts_indices(),
                "{} changed the sequence length without declaring an index-shifting effect",
                stage.pass.name()
            );
            current.clone_from(&result.instructions);
        }
        result
    }
}

/// Outcome of driving one sequence through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    original_len: usize,
    /// The optimized sequence.
    pub instructions: Vec<Instruction>,
    /// Per-application results, in application order.
    pub results: Vec<OptimizationResult>,
    /// Number of sweeps over the stage list.
    pub iterations: usize,
    /// Total wall-clock time.
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Total instructions removed relative to the driver's input.
    #[must_use]
    pub fn instructions_removed(&self) -> i64 {
        self.original_len as i64 - self.instructions.len() as i64
    }

    /// Improvement of the final sequence over an original.
    #[must_use]
    pub fn improvement_over(&self, original: &[Instruction]) -> Improvement {
        Improvement::between(original, &self.instructions)
    }

    /// Number of failed pass applications.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Aggregated counters for one optimization kind across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Total applications of this kind.
    pub applications: usize,
    /// Applications that reported failure.
    pub failures: usize,
    /// Instructions removed by successful applications.
    pub instructions_removed: i64,
    /// Estimated cycles saved by successful applications.
    pub cycles_saved: i64,
}

/// Outcome of a parallel batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// One report per input sequence, in input order.
    pub reports: Vec<PipelineReport>,
    /// Aggregated counters per optimization kind.
    pub per_kind: HashMap<OptimizationKind, KindStats>,
}

/// Strict-weak order on sequences: fewer estimated cycles, then fewer
/// instructions.
fn cheaper(candidate: &[Instruction], best: &[Instruction]) -> bool {
    let cost = |s: &[Instruction]| {
        (
            s.iter().map(|i| u64::from(i.estimated_cycles())).sum::<u64>(),
            s.len(),
        )
    };
    cost(candidate) < cost(best)
}

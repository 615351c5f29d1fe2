//! Per-pass configuration and per-application outcome value types.

use std::collections::HashMap;
use std::time::Duration;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::instruction::Instruction;

/// The closed set of optimization kinds.
///
/// Matched exhaustively in the registry's factory, so adding a pass is a
/// compile-time-checked addition rather than a stringly-typed lookup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum OptimizationKind {
    /// Evaluate all-literal computations at optimization time.
    ConstantFolding,
    /// Drop instructions unreachable from index 0.
    DeadCodeElimination,
    /// Reuse earlier results of lexically identical computations.
    CommonSubexpressionElimination,
    /// Hoist loop-invariant literal computations out of loop bodies.
    LoopOptimization,
    /// Fuse compare-and-branch instruction pairs.
    BranchOptimization,
    /// Dataflow-guided elimination (available expressions + liveness).
    DataFlowOptimization,
    /// Local window-pattern rewriting.
    PeepholeOptimization,
    /// Per-instruction algebraic identities.
    InstructionOptimization,
    /// Allow-list call inlining.
    FunctionInlining,
    /// Per-basic-block sub-pipeline (fold, dead code, CSE).
    BasicBlockOptimization,
}

/// Configuration supplied by the driver for one pass.
///
/// Created per invocation and discarded once the corresponding
/// [`OptimizationResult`] has been reported.
#[derive(Debug, Clone)]
pub struct OptimizationContext {
    /// Which optimization this context configures.
    pub kind: OptimizationKind,
    /// Disabled contexts make `apply` a reported no-op.
    pub enabled: bool,
    /// Optimization level: 0 none, 1 conservative, 2 standard, 3 aggressive.
    pub level: u8,
    /// Wall-clock budget for one application (enforced by the driver across
    /// fixpoint iterations).
    pub timeout: Duration,
    /// Upper bound on fixpoint iterations in the driver.
    pub max_iterations: usize,
    /// Free-form statistics the driver may attach for telemetry.
    pub statistics: HashMap<String, f64>,
}

impl OptimizationContext {
    /// Creates a context with default settings (enabled, level 2, one-second
    /// budget, at most ten iterations).
    #[must_use]
    pub fn new(kind: OptimizationKind) -> Self {
        Self {
            kind,
            enabled: true,
            level: 2,
            timeout: Duration::from_secs(1),
            max_iterations: 10,
            statistics: HashMap::new(),
        }
    }

    /// Sets the optimization level (clamped to 0..=3).
    #[must_use]
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level.min(3);
        self
    }

    /// Disables the pass without removing it from the pipeline.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Overrides the per-application timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the iteration bound.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Instruction-count and cycle-count deltas of one pass application.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Improvement {
    /// Instructions removed (negative when the pass grew the sequence,
    /// e.g. inlining).
    pub instructions_removed: i64,
    /// Instruction-count reduction in percent of the original count.
    pub instruction_percent: f64,
    /// Estimated cycles saved.
    pub cycles_saved: i64,
    /// Cycle reduction in percent of the original estimate.
    pub cycle_percent: f64,
}

impl Improvement {
    /// Computes the deltas between an original and an optimized sequence.
    #[must_use]
    pub fn between(original: &[Instruction], optimized: &[Instruction]) -> Self {
        let count_before = original.len() as i64;
        let count_after = optimized.len() as i64;
        let cycles_before: i64 = original
            .iter()
            .map(|i| i64::from(i.estimated_cycles()))
            .sum();
        let cycles_after: i64 = optimized
            .iter()
            .map(|i| i64::from(i.estimated_cycles()))
            .sum();

        let percent = |before: i64, delta: i64| {
            if before == 0 {
                0.0
            } else {
                delta as f64 * 100.0 / before as f64
            }
        };

        Self {
            instructions_removed: count_before - count_after,
            instruction_percent: percent(count_before, count_before - count_after),
            cycles_saved: cycles_before - cycles_after,
            cycle_percent: percent(cycles_before, cycles_before - cycles_after),
        }
    }
}

/// Outcome of one pass application.
///
/// This is the only way failure crosses the `apply` boundary: a pass never
/// propagates an error or panic to the pipeline driver.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Which optimization produced this result.
    pub kind: OptimizationKind,
    /// Whether the application ran to completion.
    pub success: bool,
    /// The resulting instruction sequence (the original one on failure).
    pub instructions: Vec<Instruction>,
    /// Wall-clock time spent inside the pass.
    pub elapsed: Duration,
    /// Number of optimize invocations this result covers.
    pub iterations: usize,
    /// Count and cycle deltas (zero on failure).
    pub improvement: Improvement,
    /// Error descriptions; empty on success.
    pub errors: Vec<String>,
}

impl OptimizationResult {
    /// Builds a successful result, computing improvements against the
    /// original sequence.
    #[must_use]
    pub fn succeeded(
        kind: OptimizationKind,
        original: &[Instruction],
        optimized: Vec<Instruction>,
        elapsed: Duration,
    ) -> Self {
        let improvement = Improvement::between(original, &optimized);
        Self {
            kind,
            success: true,
            instructions: optimized,
            elapsed,
            iterations: 1,
            improvement,
            errors: Vec::new(),
        }
    }

    /// Builds a failed result carrying the original sequence unchanged.
    #[must_use]
    pub fn failed(
        kind: OptimizationKind,
        original: &[Instruction],
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            success: false,
            instructions: original.to_vec(),
            elapsed,
            iterations: 0,
            improvement: Improvement::default(),
            errors: vec![error.into()],
        }
    }

    /// Returns `true` if the pass changed the sequence.
    #[must_use]
    pub fn changed(&self, original: &[Instruction]) -> bool {
        self.success && self.instructions != original
    }
}

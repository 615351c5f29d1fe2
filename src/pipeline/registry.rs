//! The kind-to-constructor registry.

use std::collections::HashMap;

use crate::passes::{
    BasicBlockOptimizer, BranchOptimizer, CommonSubexpressionElimination, ConstantFolding,
    DataFlowOptimizer, DeadCodeElimination, FunctionInliner, InstructionOptimizer, LoopOptimizer,
    OptimizationKind, OptimizationPass, PeepholeOptimizer,
};
use crate::{Error, Result};

type PassFactory = fn() -> Box<dyn OptimizationPass>;

/// Registry mapping optimization kinds to pass constructors.
///
/// Built explicitly at startup and passed by reference to whatever assembles
/// a pipeline; mutated only during registration, read-only thereafter, so
/// concurrent lookups need no locking. Carries no optimization logic itself.
#[derive(Default)]
pub struct OptimizerRegistry {
    factories: HashMap<OptimizationKind, PassFactory>,
}

impl OptimizerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in pass registered.
    ///
    /// The built-in [`FunctionInliner`] starts with an empty allow-list and
    /// the built-in [`PeepholeOptimizer`] with the default pattern table;
    /// register a custom factory to configure either.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(OptimizationKind::ConstantFolding, || {
            Box::new(ConstantFolding)
        });
        registry.register(OptimizationKind::DeadCodeElimination, || {
            Box::new(DeadCodeElimination)
        });
        registry.register(OptimizationKind::CommonSubexpressionElimination, || {
            Box::new(CommonSubexpressionElimination)
        });
        registry.register(OptimizationKind::LoopOptimization, || Box::new(LoopOptimizer));
        registry.register(OptimizationKind::BranchOptimization, || {
            Box::new(BranchOptimizer)
        });
        registry.register(OptimizationKind::DataFlowOptimization, || {
            Box::new(DataFlowOptimizer)
        });
        registry.register(OptimizationKind::PeepholeOptimization, || {
            Box::new(PeepholeOptimizer::new())
        });
        registry.register(OptimizationKind::InstructionOptimization, || {
            Box::new(InstructionOptimizer)
        });
        registry.register(OptimizationKind::FunctionInlining, || {
            Box::new(FunctionInliner::new())
        });
        registry.register(OptimizationKind::BasicBlockOptimization, || {
            Box::new(BasicBlockOptimizer)
        });
        registry
    }

    /// Registers (or replaces) the factory for a kind.
    pub fn register(&mut self, kind: OptimizationKind, factory: PassFactory) {
        self.factories.insert(kind, factory);
    }

    /// Constructs a pass instance for the requested kind.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownKind`] when the kind was never registered. This is
    /// the one deliberately fatal condition in the crate: a wiring-time
    /// caller-configuration error, not a runtime data condition.
    pub fn build(&self, kind: OptimizationKind) -> Result<Box<dyn OptimizationPass>> {
        self.factories
            .get(&kind)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownKind(kind.to_string()))
    }

    /// Returns `true` if the kind has a registered factory.
    #[must_use]
    pub fn contains(&self, kind: OptimizationKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// The registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = OptimizationKind> + '_ {
        self.factories.keys().copied()
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

//! Live-variables analysis with a bounded look-back window.
//!
//! A variable is *live* at a program point if an ARITHMETIC instruction may
//! still read it. True def-use chains are not tracked; instead each use keeps
//! its variable live for a bounded window of prior instructions (default 10),
//! which approximates dependency edges while staying cheap. A STORE or MOV to
//! a variable kills its liveness at that point, per the classical
//! `IN = USE ∪ (OUT − DEF)` formulation.
//!
//! This is a backward *may* analysis: meet is union, keeping the larger
//! remaining window when both paths carry the variable.

use std::collections::HashMap;

use crate::analysis::dataflow::framework::{AnalysisResults, DataFlowAnalysis, Direction};
use crate::analysis::dataflow::lattice::MeetSemiLattice;
use crate::analysis::dataflow::solver::DataFlowSolver;
use crate::instruction::{Instruction, InstructionKind, Opcode};

/// Default number of instructions a use keeps its variable live for.
pub const DEFAULT_LOOKBACK_WINDOW: u32 = 10;

/// The set of live variables at one program point.
///
/// Each variable carries the number of instructions its liveness still
/// extends backward; the solver's transfer function decrements it per
/// instruction traversed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiveSet {
    remaining: HashMap<String, u32>,
}

impl LiveSet {
    /// The empty set: nothing live.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if the variable is live here.
    #[must_use]
    pub fn is_live(&self, variable: &str) -> bool {
        self.remaining.contains_key(variable)
    }

    /// Iterates over the live variable names.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.remaining.keys().map(String::as_str)
    }

    /// Number of live variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Returns `true` if no variable is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    fn age(&mut self) {
        self.remaining.retain(|_, distance| {
            *distance -= 1;
            *distance > 0
        });
    }

    fn kill(&mut self, variable: &str) {
        self.remaining.remove(variable);
    }

    fn use_variable(&mut self, variable: &str, window: u32) {
        let distance = self.remaining.entry(variable.to_string()).or_insert(0);
        *distance = (*distance).max(window);
    }
}

impl MeetSemiLattice for LiveSet {
    /// Meet is union: live if live on any successor path.
    fn meet(&self, other: &Self) -> Self {
        let mut merged = self.remaining.clone();
        for (name, &distance) in &other.remaining {
            let entry = merged.entry(name.clone()).or_insert(0);
            *entry = (*entry).max(distance);
        }
        Self { remaining: merged }
    }

    fn is_bottom(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Live-variables analysis over an instruction sequence.
#[derive(Debug, Clone, Copy)]
pub struct LiveVariables {
    window: u32,
}

impl Default for LiveVariables {
    fn default() -> Self {
        Self {
            window: DEFAULT_LOOKBACK_WINDOW,
        }
    }
}

impl LiveVariables {
    /// Creates the analysis with a custom look-back window.
    #[must_use]
    pub fn with_window(window: u32) -> Self {
        Self { window: window.max(1) }
    }

    /// Runs the analysis with the default window.
    #[must_use]
    pub fn compute(instructions: &[Instruction]) -> AnalysisResults<LiveSet> {
        DataFlowSolver::new(Self::default()).solve(instructions)
    }
}

impl DataFlowAnalysis for LiveVariables {
    type Fact = LiveSet;
    const DIRECTION: Direction = Direction::Backward;

    fn boundary(&self, _instructions: &[Instruction]) -> Self::Fact {
        // Nothing is live at function exit.
        LiveSet::none()
    }

    fn initial(&self, _instructions: &[Instruction]) -> Self::Fact {
        LiveSet::none()
    }

    fn transfer(&self, _index: usize, instruction: &Instruction, output: &Self::Fact) -> Self::Fact {
        let mut live = output.clone();
        live.age();

        // Definitions kill liveness before uses are added.
        if matches!(instruction.opcode(), Opcode::Store | Opcode::Mov) {
            if let Some(dest) = instruction.operands().first().and_then(|o| o.as_symbol()) {
                live.kill(dest);
            }
        }

        if instruction.kind() == InstructionKind::Arithmetic {
            for operand in instruction.operands() {
                if let Some(symbol) = operand.as_symbol() {
                    live.use_variable(symbol, self.window);
                }
            }
        }

        live
    }
}

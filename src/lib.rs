// Copyright 2026 The optforge authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # optforge
//!
//! An instruction-level optimization pipeline for stack-based bytecode
//! virtual machines. `optforge` takes a flat, index-addressed sequence of VM
//! instructions and rewrites it into a semantically equivalent, smaller
//! and/or cheaper sequence before execution.
//!
//! ## Features
//!
//! - **Immutable instruction model** - every rewrite produces a new
//!   [`Instruction`](instruction::Instruction) value with provenance metadata
//! - **Control-flow analysis** - instruction-level CFG construction with
//!   reachability and back-edge (loop) discovery
//! - **Classical dataflow** - available expressions and live variables,
//!   computed by a reusable worklist solver
//! - **Ten built-in passes** - constant folding, dead-code elimination, CSE,
//!   loop-invariant hoisting, branch fusion, dataflow-guided elimination,
//!   peephole rewriting, algebraic identities, allow-list inlining, and a
//!   per-basic-block sub-pipeline
//! - **Fixpoint-safe driver** - bounded by iteration count and wall-clock
//!   timeout; a failing pass can never abort the pipeline
//!
//! ## Quick Start
//!
//! ```rust
//! use optforge::prelude::*;
//!
//! let program = vec![
//!     Instruction::push(2),
//!     Instruction::push(3),
//!     Instruction::op(Opcode::Add),
//!     Instruction::op(Opcode::Ret),
//! ];
//!
//! let registry = OptimizerRegistry::with_builtins();
//! let pass = registry.build(OptimizationKind::ConstantFolding)?;
//! let ctx = OptimizationContext::new(OptimizationKind::ConstantFolding);
//! let result = pass.apply(&program, &ctx);
//!
//! assert!(result.success);
//! assert_eq!(result.instructions.len(), 2);
//! # Ok::<(), optforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `optforge` is organized into three layers:
//!
//! - [`instruction`] - the immutable instruction vocabulary consumed from the
//!   front-end and handed back to the VM
//! - [`analysis`] - ephemeral per-pass analyses: CFG, reachability, loops,
//!   and the dataflow framework
//! - [`passes`] and [`pipeline`] - the [`OptimizationPass`](passes::OptimizationPass)
//!   contract, the concrete passes, and the registry/driver plumbing that
//!   assembles them into a pipeline
//!
//! Jump and branch operands are raw integer indices into the instruction
//! sequence. Every pass that deletes, inserts, or moves instructions rewrites
//! those indices through an old-to-new index map; see
//! [`instruction::remap_branch_targets`].

pub mod analysis;
pub mod instruction;
pub mod passes;
pub mod pipeline;
pub mod prelude;

mod error;

pub use error::{Error, Result};

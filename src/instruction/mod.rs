//! The immutable instruction model consumed and produced by every pass.
//!
//! An [`Instruction`] is a value: opcode, ordered operand list, instruction
//! kind, a non-negative cycle estimate, and an optional provenance metadata
//! map recording the original opcode/operands when a pass rewrote it.
//! Instructions are never mutated in place - a rewrite constructs a new
//! value, so an instruction aliased by another pass's cache can never change
//! underneath it.
//!
//! Jump and branch operands ([`Opcode::Jmp`], [`Opcode::Jz`],
//! [`Opcode::Jnz`]) are raw integer indices into the same instruction
//! sequence, not symbolic labels. Any pass that deletes, inserts, or moves
//! instructions must rewrite those indices; [`IndexMap`] and
//! [`remap_branch_targets`] implement that renumbering once, for every pass.

use std::collections::BTreeMap;
use std::fmt;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result};

/// Metadata key under which a rewrite records the original opcode.
pub const META_ORIGIN_OPCODE: &str = "origin.opcode";
/// Metadata key under which a rewrite records the original operand list.
pub const META_ORIGIN_OPERANDS: &str = "origin.operands";

/// The fixed operation vocabulary of the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Opcode {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division. Never folded when the divisor is a literal zero; the VM's
    /// own divide-by-zero semantics are preserved.
    Div,
    /// Remainder.
    Mod,
    /// Exponentiation.
    Pow,
    /// Arithmetic negation.
    Neg,
    /// Absolute value.
    Abs,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise not.
    Not,
    /// Bitwise exclusive or.
    Xor,
    /// Equality comparison, yields 1 or 0.
    Eq,
    /// Inequality comparison.
    Ne,
    /// Less-than comparison.
    Lt,
    /// Less-or-equal comparison.
    Le,
    /// Greater-than comparison.
    Gt,
    /// Greater-or-equal comparison.
    Ge,
    /// Push a literal or symbol onto the evaluation stack.
    Push,
    /// Pop the top of the evaluation stack.
    Pop,
    /// Unconditional jump; operand 0 is the target instruction index.
    Jmp,
    /// Jump if zero; operand 0 is the target instruction index.
    Jz,
    /// Jump if not zero; operand 0 is the target instruction index.
    Jnz,
    /// Call; operand 0 names the callee. Call targets are opaque to the
    /// optimizer and are assumed to always return.
    Call,
    /// Return; no outgoing control-flow edge.
    Ret,
    /// Compare two values and set the condition flag.
    Cmp,
    /// Store to a named destination; operand 0 is the destination symbol.
    Store,
    /// Move between named locations; operand 0 is the destination symbol.
    Mov,
    /// Load from a named location.
    Load,
    /// No operation.
    Nop,
}

impl Opcode {
    /// Returns the instruction kind this opcode belongs to.
    #[must_use]
    pub const fn kind(self) -> InstructionKind {
        match self {
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Pow
            | Self::Neg
            | Self::Abs => InstructionKind::Arithmetic,
            Self::And
            | Self::Or
            | Self::Not
            | Self::Xor
            | Self::Eq
            | Self::Ne
            | Self::Lt
            | Self::Le
            | Self::Gt
            | Self::Ge => InstructionKind::Logical,
            Self::Push | Self::Pop | Self::Store | Self::Mov | Self::Load | Self::Nop => {
                InstructionKind::Memory
            }
            Self::Jmp | Self::Jz | Self::Jnz | Self::Ret | Self::Cmp => InstructionKind::Control,
            Self::Call => InstructionKind::Call,
        }
    }

    /// Returns the default cycle estimate for this opcode.
    #[must_use]
    pub const fn base_cycles(self) -> u32 {
        match self {
            Self::Push | Self::Pop | Self::Mov | Self::Nop => 1,
            Self::Add | Self::Sub | Self::Neg | Self::Abs | Self::And | Self::Or | Self::Not
            | Self::Xor | Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
            | Self::Cmp | Self::Jmp | Self::Jz | Self::Jnz | Self::Load | Self::Store | Self::Ret => 2,
            Self::Mul => 3,
            Self::Div | Self::Mod => 10,
            Self::Pow => 12,
            Self::Call => 5,
        }
    }

    /// Returns `true` for the three branch opcodes whose operand is an
    /// instruction index (JMP, JZ, JNZ).
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Jmp | Self::Jz | Self::Jnz)
    }

    /// Returns `true` if this opcode ends a basic block.
    #[must_use]
    pub const fn is_block_terminator(self) -> bool {
        matches!(self, Self::Jmp | Self::Jz | Self::Jnz | Self::Call | Self::Ret)
    }

    /// Number of value operands this opcode consumes when evaluated, or
    /// `None` if it is not a foldable computation.
    #[must_use]
    pub const fn eval_arity(self) -> Option<usize> {
        match self {
            Self::Neg | Self::Abs | Self::Not => Some(1),
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::Pow | Self::And
            | Self::Or | Self::Xor | Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt
            | Self::Ge => Some(2),
            _ => None,
        }
    }

    /// Evaluates this operation over literal arguments.
    ///
    /// Comparison opcodes yield `1` or `0`. Overflow, division or remainder
    /// by zero, and negative exponents all fail with [`Error::Evaluation`] -
    /// callers fold only on `Ok` and otherwise leave the instruction
    /// unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Evaluation`] for the wrong argument count, domain
    /// errors, or overflowing arithmetic.
    pub fn evaluate(self, args: &[i64]) -> Result<i64> {
        let arity = self
            .eval_arity()
            .ok_or_else(|| Error::Evaluation(format!("{self} is not a foldable operation")))?;
        if args.len() != arity {
            return Err(Error::Evaluation(format!(
                "{self} expects {arity} operands, got {}",
                args.len()
            )));
        }

        let overflow = || Error::Evaluation(format!("{self} overflowed"));
        match self {
            Self::Add => args[0].checked_add(args[1]).ok_or_else(overflow),
            Self::Sub => args[0].checked_sub(args[1]).ok_or_else(overflow),
            Self::Mul => args[0].checked_mul(args[1]).ok_or_else(overflow),
            Self::Div => {
                if args[1] == 0 {
                    Err(Error::Evaluation("division by literal zero".into()))
                } else {
                    args[0].checked_div(args[1]).ok_or_else(overflow)
                }
            }
            Self::Mod => {
                if args[1] == 0 {
                    Err(Error::Evaluation("remainder by literal zero".into()))
                } else {
                    args[0].checked_rem(args[1]).ok_or_else(overflow)
                }
            }
            Self::Pow => {
                let exp = u32::try_from(args[1])
                    .map_err(|_| Error::Evaluation("negative or oversized exponent".into()))?;
                args[0].checked_pow(exp).ok_or_else(overflow)
            }
            Self::Neg => args[0].checked_neg().ok_or_else(overflow),
            Self::Abs => args[0].checked_abs().ok_or_else(overflow),
            Self::And => Ok(args[0] & args[1]),
            Self::Or => Ok(args[0] | args[1]),
            Self::Xor => Ok(args[0] ^ args[1]),
            Self::Not => Ok(!args[0]),
            Self::Eq => Ok(i64::from(args[0] == args[1])),
            Self::Ne => Ok(i64::from(args[0] != args[1])),
            Self::Lt => Ok(i64::from(args[0] < args[1])),
            Self::Le => Ok(i64::from(args[0] <= args[1])),
            Self::Gt => Ok(i64::from(args[0] > args[1])),
            Self::Ge => Ok(i64::from(args[0] >= args[1])),
            _ => unreachable!("eval_arity filtered non-foldable opcodes"),
        }
    }
}

/// Classification of instructions into the five VM categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum InstructionKind {
    /// Arithmetic computation (ADD, SUB, MUL, DIV, MOD, POW, NEG, ABS).
    Arithmetic,
    /// Logical/bitwise computation and comparisons.
    Logical,
    /// Stack and named-location traffic (PUSH, POP, STORE, MOV, LOAD, NOP).
    Memory,
    /// Control flow (JMP, JZ, JNZ, RET, CMP).
    Control,
    /// Call instructions.
    Call,
}

/// A single instruction operand: a literal value or a symbolic reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A literal integer value.
    Literal(i64),
    /// A symbolic reference (variable, function name, cached result).
    Symbol(String),
}

impl Operand {
    /// Returns the literal value, if this operand is a literal.
    #[must_use]
    pub const fn as_literal(&self) -> Option<i64> {
        match self {
            Self::Literal(v) => Some(*v),
            Self::Symbol(_) => None,
        }
    }

    /// Returns the symbol name, if this operand is symbolic.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Symbol(s) => Some(s),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Symbol(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Symbol(value.to_string())
    }
}

/// One immutable VM instruction.
///
/// Constructed once and never mutated; every transform produces a new value.
/// The `kind` and `estimated_cycles` fields default from the opcode but can
/// be overridden by the front-end supplying the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    operands: Vec<Operand>,
    kind: InstructionKind,
    estimated_cycles: u32,
    metadata: BTreeMap<String, String>,
}

impl Instruction {
    /// Creates an instruction with explicit operands; kind and cycle estimate
    /// derive from the opcode.
    #[must_use]
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            opcode,
            operands,
            kind: opcode.kind(),
            estimated_cycles: opcode.base_cycles(),
            metadata: BTreeMap::new(),
        }
    }

    /// Creates an operand-less instruction.
    #[must_use]
    pub fn op(opcode: Opcode) -> Self {
        Self::new(opcode, Vec::new())
    }

    /// Creates a `PUSH` of a literal value.
    #[must_use]
    pub fn push(value: i64) -> Self {
        Self::new(Opcode::Push, vec![Operand::Literal(value)])
    }

    /// Creates a branch instruction targeting `target`.
    ///
    /// The opcode should be one of JMP/JZ/JNZ; the target is stored as a
    /// literal instruction index.
    #[must_use]
    pub fn branch(opcode: Opcode, target: usize) -> Self {
        debug_assert!(opcode.is_branch());
        Self::new(opcode, vec![Operand::Literal(target as i64)])
    }

    /// Creates the literal `PUSH` that replaces a folded computation,
    /// recording the original opcode and operands as provenance.
    #[must_use]
    pub fn folded_push(value: i64, original: &Self) -> Self {
        let mut push = Self::push(value);
        push.estimated_cycles = 1;
        push.metadata = original.provenance();
        push
    }

    /// Overrides the cycle estimate.
    #[must_use]
    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.estimated_cycles = cycles;
        self
    }

    /// Attaches one metadata entry, consuming and returning the value.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The ordered operand list.
    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// The instruction kind.
    #[must_use]
    pub const fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// The estimated cycle cost.
    #[must_use]
    pub const fn estimated_cycles(&self) -> u32 {
        self.estimated_cycles
    }

    /// The provenance metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Returns `true` if this is a computation over values
    /// (ARITHMETIC or LOGICAL).
    #[must_use]
    pub fn is_computation(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Arithmetic | InstructionKind::Logical
        )
    }

    /// Returns `true` if every operand is a literal.
    #[must_use]
    pub fn all_literal_operands(&self) -> bool {
        self.operands.iter().all(|o| o.as_literal().is_some())
    }

    /// Collects all literal operand values, or `None` if any is symbolic.
    #[must_use]
    pub fn literal_operands(&self) -> Option<Vec<i64>> {
        self.operands.iter().map(Operand::as_literal).collect()
    }

    /// Returns the branch target index, if this is a JMP/JZ/JNZ with a
    /// non-negative literal target.
    #[must_use]
    pub fn branch_target(&self) -> Option<usize> {
        if !self.opcode.is_branch() {
            return None;
        }
        let target = self.operands.first()?.as_literal()?;
        usize::try_from(target).ok()
    }

    /// Produces a copy of this instruction with its branch target replaced.
    #[must_use]
    pub fn with_branch_target(&self, target: usize) -> Self {
        let mut updated = self.clone();
        updated.operands = vec![Operand::Literal(target as i64)];
        updated
    }

    /// Builds the provenance map recording this instruction's opcode and
    /// operands, merged over any provenance it already carried.
    #[must_use]
    pub fn provenance(&self) -> BTreeMap<String, String> {
        let mut map = self.metadata.clone();
        map.insert(META_ORIGIN_OPCODE.to_string(), self.opcode.to_string());
        map.insert(
            META_ORIGIN_OPERANDS.to_string(),
            self.operands
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        );
        map
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

/// A structural key identifying a computation: opcode plus exact operand
/// tuple.
///
/// Two instructions share a key only when they are lexically identical -
/// commutative reorderings (`a+b` vs `b+a`) deliberately produce distinct
/// keys, keeping CSE and available-expressions conservative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExprKey {
    opcode: Opcode,
    operands: Vec<Operand>,
}

impl ExprKey {
    /// Builds the key for an ARITHMETIC/LOGICAL instruction, or `None` for
    /// anything else.
    #[must_use]
    pub fn of(instruction: &Instruction) -> Option<Self> {
        if !instruction.is_computation() {
            return None;
        }
        Some(Self {
            opcode: instruction.opcode(),
            operands: instruction.operands().to_vec(),
        })
    }

    /// Returns `true` if any operand references the given symbol.
    #[must_use]
    pub fn mentions(&self, symbol: &str) -> bool {
        self.operands.iter().any(|o| o.as_symbol() == Some(symbol))
    }
}

impl fmt::Display for ExprKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

/// An old-index to new-index mapping produced when a pass deletes, inserts,
/// or moves instructions.
///
/// Removed old indices resolve to the new position of the next surviving
/// instruction (or one past the end when nothing survives after them), which
/// is where control would fall through to.
#[derive(Debug, Clone)]
pub struct IndexMap {
    targets: Vec<usize>,
    new_len: usize,
}

impl IndexMap {
    /// Builds a map from per-old-index assignments.
    ///
    /// `assignments[old]` is `Some(new)` for instructions that survive (at
    /// their new position) and `None` for removed ones. `new_len` is the
    /// length of the rewritten sequence.
    #[must_use]
    pub fn from_assignments(assignments: &[Option<usize>], new_len: usize) -> Self {
        let mut targets = vec![new_len; assignments.len()];
        let mut next = new_len;
        for old in (0..assignments.len()).rev() {
            if let Some(new) = assignments[old] {
                next = new;
            }
            targets[old] = next;
        }
        Self { targets, new_len }
    }

    /// Identity map over a sequence of `len` instructions.
    #[must_use]
    pub fn identity(len: usize) -> Self {
        Self {
            targets: (0..len).collect(),
            new_len: len,
        }
    }

    /// Resolves an old instruction index to its new index.
    ///
    /// Out-of-range indices saturate to the end of the new sequence.
    #[must_use]
    pub fn resolve(&self, old: usize) -> usize {
        self.targets.get(old).copied().unwrap_or(self.new_len)
    }

    /// Returns `true` if every index maps to itself.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.targets.iter().enumerate().all(|(old, &new)| old == new)
    }
}

/// Rewrites every JMP/JZ/JNZ operand in `instructions` through `map`.
///
/// Targets that referenced a shifted index are renumbered; instructions whose
/// target is unchanged are passed through untouched. This is the
/// correctness-critical companion of every deleting/reordering pass.
#[must_use]
pub fn remap_branch_targets(instructions: Vec<Instruction>, map: &IndexMap) -> Vec<Instruction> {
    instructions
        .into_iter()
        .map(|instruction| match instruction.branch_target() {
            Some(old) => {
                let new = map.resolve(old);
                if new == old {
                    instruction
                } else {
                    instruction.with_branch_target(new)
                }
            }
            None => instruction,
        })
        .collect()
}

//! Control-flow graph construction over instruction indices.
//!
//! The CFG is rebuilt per pass invocation and never persisted. Nodes are
//! instruction indices into the analyzed sequence; edges capture how control
//! can move between them:
//!
//! - **Unconditional jump** (JMP): one edge to the target index
//! - **Conditional jump** (JZ/JNZ): edge to the target plus a fallthrough
//!   edge to index + 1
//! - **Call** (CALL): fallthrough edge only - call targets are opaque and
//!   assumed to always return
//! - **Return** (RET): no outgoing edge
//! - anything else: fallthrough edge to index + 1
//!
//! Branch targets outside the sequence produce no edge; the instruction then
//! acts as an exit.

use crate::instruction::{Instruction, Opcode};

/// A branch whose target index is strictly less than its own index.
///
/// This is the loop shape the optimizer recognizes: the body spans
/// `[target, branch]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackEdge {
    /// Index of the branch instruction.
    pub branch: usize,
    /// Target index (the loop header).
    pub target: usize,
}

/// Instruction-level control-flow graph.
///
/// Successor and predecessor lists are materialized at construction;
/// reachability and back-edge queries traverse them on demand.
#[derive(Debug)]
pub struct ControlFlowGraph {
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl ControlFlowGraph {
    /// Builds the CFG for an instruction sequence.
    #[must_use]
    pub fn build(instructions: &[Instruction]) -> Self {
        let len = instructions.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); len];
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); len];

        for (index, instruction) in instructions.iter().enumerate() {
            match instruction.opcode() {
                Opcode::Jmp => {
                    if let Some(target) = instruction.branch_target() {
                        if target < len {
                            successors[index].push(target);
                        }
                    }
                }
                Opcode::Jz | Opcode::Jnz => {
                    if let Some(target) = instruction.branch_target() {
                        if target < len {
                            successors[index].push(target);
                        }
                    }
                    if index + 1 < len {
                        successors[index].push(index + 1);
                    }
                }
                Opcode::Ret => {}
                // CALL and everything else fall through
                _ => {
                    if index + 1 < len {
                        successors[index].push(index + 1);
                    }
                }
            }
        }

        for (index, succs) in successors.iter().enumerate() {
            for &succ in succs {
                predecessors[succ].push(index);
            }
        }

        Self {
            successors,
            predecessors,
        }
    }

    /// Number of nodes (instructions).
    #[must_use]
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// Successor indices of a node.
    #[must_use]
    pub fn successors(&self, index: usize) -> &[usize] {
        self.successors.get(index).map_or(&[], Vec::as_slice)
    }

    /// Predecessor indices of a node.
    #[must_use]
    pub fn predecessors(&self, index: usize) -> &[usize] {
        self.predecessors.get(index).map_or(&[], Vec::as_slice)
    }

    /// Nodes with no outgoing edges (RET and fall-off-the-end instructions).
    #[must_use]
    pub fn exits(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.successors[i].is_empty())
            .collect()
    }

    /// Computes reachability from index 0 via depth-first traversal.
    ///
    /// Instructions reachable only through a backward (loop) edge are
    /// reached like any other: the DFS follows every successor edge,
    /// including back edges.
    #[must_use]
    pub fn reachable(&self) -> Vec<bool> {
        let mut reached = vec![false; self.len()];
        if self.is_empty() {
            return reached;
        }

        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            if reached[index] {
                continue;
            }
            reached[index] = true;
            for &succ in &self.successors[index] {
                if !reached[succ] {
                    stack.push(succ);
                }
            }
        }
        reached
    }

    /// Finds every backward branch in the analyzed sequence, in discovery
    /// (ascending branch index) order.
    #[must_use]
    pub fn back_edges(instructions: &[Instruction]) -> Vec<BackEdge> {
        instructions
            .iter()
            .enumerate()
            .filter_map(|(branch, instruction)| {
                let target = instruction.branch_target()?;
                (target < branch).then_some(BackEdge { branch, target })
            })
            .collect()
    }

    /// Nodes in reverse postorder of a DFS from the entry.
    ///
    /// Unreachable nodes are appended in index order so the dataflow solver
    /// still initializes them.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<usize> {
        let mut order = self.postorder();
        order.reverse();
        order
    }

    /// Nodes in postorder of a DFS from the entry, with unreachable nodes
    /// prepended in index order.
    #[must_use]
    pub fn postorder(&self) -> Vec<usize> {
        let len = self.len();
        let mut visited = vec![false; len];
        let mut order = Vec::with_capacity(len);

        if len > 0 {
            // Iterative DFS with an explicit child cursor per frame.
            let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
            visited[0] = true;
            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if let Some(&succ) = self.successors[node].get(frame.1) {
                    frame.1 += 1;
                    if !visited[succ] {
                        visited[succ] = true;
                        stack.push((succ, 0));
                    }
                } else {
                    order.push(node);
                    stack.pop();
                }
            }
        }

        let mut unreachable: Vec<usize> = (0..len).filter(|&i| !visited[i]).collect();
        unreachable.extend(order);
        unreachable
    }
}

//! Control-flow graph data model.
//!
//! A [`ControlFlowGraph`] is a list of [`BasicBlock`]s in ordinal order plus
//! a tree of [`Region`]s. Block 0 is always the entry block and the last
//! block is always the exit block. Region 0 is the root region, which spans
//! every block and is never printed.
//!
//! Statements are operations in the graph's own [`OpArena`]; they are
//! rewritten copies of the input tree with the flow-only kinds
//! (`FlowCapture`, `FlowCaptureReference`, `IsNull`, `CaughtException`,
//! `FlowAnonymousFunction`) spliced in.

use std::fmt;

use smallvec::SmallVec;

use opal_diagnostic::Diagnostic;
use opal_ir::{CaptureId, LocalId, MethodId, OpArena, OpId, TypeId};

macro_rules! graph_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

graph_index!(
    /// Ordinal of a basic block; equal to its index in [`ControlFlowGraph::blocks`].
    BlockId
);
graph_index!(
    /// Index of a region in [`ControlFlowGraph::regions`]; numbered in pre-order.
    RegionId
);

impl RegionId {
    pub const ROOT: RegionId = RegionId(0);
}

/// Convert a count to a graph index.
///
/// # Panics
/// Panics if a graph outgrows `u32::MAX` blocks or regions.
pub(crate) fn to_u32(value: usize, what: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic!("{what} exceeded u32::MAX entries"))
}

// ── Blocks ──────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Entry,
    Block,
    Exit,
}

impl BlockKind {
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Entry => "Entry",
            BlockKind::Block => "Block",
            BlockKind::Exit => "Exit",
        }
    }
}

/// Sense of a conditional successor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    JumpIfTrue,
    JumpIfFalse,
}

impl ConditionKind {
    /// The branch value that takes the conditional edge.
    pub fn jumps_on(self) -> bool {
        self == ConditionKind::JumpIfTrue
    }
}

/// What taking an edge means.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BranchSemantics {
    Regular,
    /// To the exit block, carrying the returned value if any.
    Return,
    /// No destination; carries the thrown value.
    Throw,
    /// No destination; rethrows the exception being handled.
    Rethrow,
    /// End of a finally handler; no destination.
    StructuredExceptionHandling,
}

impl BranchSemantics {
    pub fn name(self) -> &'static str {
        match self {
            BranchSemantics::Regular => "Regular",
            BranchSemantics::Return => "Return",
            BranchSemantics::Throw => "Throw",
            BranchSemantics::Rethrow => "Rethrow",
            BranchSemantics::StructuredExceptionHandling => "StructuredExceptionHandling",
        }
    }
}

/// One outgoing edge, with the regions it crosses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub semantics: BranchSemantics,
    pub destination: Option<BlockId>,
    /// Returned or thrown value; `INVALID` when there is none.
    pub value: OpId,
    /// Finally regions run on the way out, innermost first.
    pub finalizing: SmallVec<[RegionId; 2]>,
    /// Regions left, innermost first.
    pub leaving: SmallVec<[RegionId; 4]>,
    /// Regions entered, outermost first.
    pub entering: SmallVec<[RegionId; 4]>,
}

impl Branch {
    pub(crate) fn new(semantics: BranchSemantics, destination: Option<BlockId>, value: OpId) -> Self {
        Branch {
            semantics,
            destination,
            value,
            finalizing: SmallVec::new(),
            leaving: SmallVec::new(),
            entering: SmallVec::new(),
        }
    }
}

/// The conditional successor of a block: taken when `value` equals
/// [`ConditionKind::jumps_on`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionalBranch {
    pub kind: ConditionKind,
    pub value: OpId,
    pub branch: Branch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    pub ordinal: BlockId,
    pub kind: BlockKind,
    pub statements: Vec<OpId>,
    /// Sorted and deduplicated, including unreachable sources.
    pub predecessors: Vec<BlockId>,
    pub conditional: Option<ConditionalBranch>,
    /// `None` only for the exit block.
    pub fall_through: Option<Branch>,
    pub is_reachable: bool,
    /// Innermost region containing this block.
    pub region: RegionId,
}

impl BasicBlock {
    /// Destinations of the conditional and fall-through edges, deduplicated.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        let mut out: SmallVec<[BlockId; 2]> = SmallVec::new();
        let edges = self
            .conditional
            .iter()
            .map(|c| &c.branch)
            .chain(self.fall_through.iter());
        for branch in edges {
            if let Some(dest) = branch.destination {
                if !out.contains(&dest) {
                    out.push(dest);
                }
            }
        }
        out
    }
}

// ── Regions ─────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Root,
    Locals,
    Try,
    Catch,
    Finally,
    TryAndCatch,
    TryAndFinally,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub kind: RegionKind,
    pub enclosing: Option<RegionId>,
    pub nested: Vec<RegionId>,
    pub first_block: BlockId,
    pub last_block: BlockId,
    pub locals: Vec<LocalId>,
    pub captures: Vec<CaptureId>,
    /// Caught type of a `Catch` region.
    pub exception_type: Option<TypeId>,
    /// Local functions declared here, with their index in [`ControlFlowGraph::nested`].
    pub local_functions: Vec<(MethodId, u32)>,
}

impl Region {
    pub fn contains(&self, block: BlockId) -> bool {
        self.first_block <= block && block <= self.last_block
    }
}

// ── Graph ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NestedKind {
    Lambda,
    LocalFunction,
}

/// A lambda or local function body, built as its own graph.
#[derive(Clone, Debug)]
pub struct NestedGraph {
    pub method: MethodId,
    pub kind: NestedKind,
    pub graph: ControlFlowGraph,
}

#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    /// Statements and branch values of every block.
    pub ops: OpArena,
    pub blocks: Vec<BasicBlock>,
    pub regions: Vec<Region>,
    pub nested: Vec<NestedGraph>,
    /// Flow errors in this body, in the order they were reported.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of capture ids allocated; ids run from 0 to `capture_count - 1`.
    pub capture_count: u32,
}

impl ControlFlowGraph {
    pub fn entry(&self) -> &BasicBlock {
        &self.blocks[0]
    }

    pub fn exit(&self) -> &BasicBlock {
        &self.blocks[self.blocks.len() - 1]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.index()]
    }

    pub fn root_region(&self) -> &Region {
        &self.regions[0]
    }

    /// Regions from `id` out to the root, innermost first.
    pub fn region_chain(&self, id: RegionId) -> SmallVec<[RegionId; 8]> {
        let mut chain = SmallVec::new();
        let mut current = Some(id);
        while let Some(r) = current {
            chain.push(r);
            current = self.region(r).enclosing;
        }
        chain
    }

    pub fn unreachable_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|b| !b.is_reachable)
    }

    /// Diagnostics of this graph followed by those of its nested graphs.
    pub fn all_diagnostics(&self) -> Vec<&Diagnostic> {
        let mut out: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        for nested in &self.nested {
            out.extend(nested.graph.all_diagnostics());
        }
        out
    }

    pub fn has_errors(&self) -> bool {
        self.all_diagnostics().iter().any(|d| d.is_error())
    }

    /// Every region id of the graph with the given kind, in pre-order.
    pub fn regions_of_kind(&self, kind: RegionKind) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.kind == kind)
    }
}

#[cfg(test)]
mod tests;

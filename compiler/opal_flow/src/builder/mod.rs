//! Graph under construction.
//!
//! [`FlowBuilder`] owns the output arena, the blocks and the region tree
//! while the lowering walk runs. Blocks are *reserved* when something first
//! needs to name them (a jump target, a merge point, a label) and *placed*
//! when the walk reaches them; placement fixes both the ordinal and the
//! enclosing region. A placed block that has not branched anywhere falls
//! through to the next block placed.
//!
//! [`FlowBuilder::finish`] numbers everything, derives edge bookkeeping
//! and reachability, and hands back a [`ControlFlowGraph`].

use rustc_hash::FxHashMap;

use opal_diagnostic::Diagnostic;
use opal_ir::{CaptureId, LocalId, MethodId, OpArena, OpId, TypeId};

use crate::graph::{
    to_u32, BasicBlock, BlockId, BlockKind, Branch, BranchSemantics, ConditionKind,
    ConditionalBranch, ControlFlowGraph, NestedGraph, Region, RegionId, RegionKind,
};
use crate::{finalize, FlowError};

/// Handle to a reserved block. Becomes a [`BlockId`] once placed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) struct BlockRef(u32);

impl BlockRef {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a region in creation order. Renumbered in pre-order at finish.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) struct RegionRef(u32);

impl RegionRef {
    pub(crate) const ROOT: RegionRef = RegionRef(0);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a block ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Exit {
    Next(BlockRef),
    Return(OpId),
    Throw(OpId),
    Rethrow,
    EndFinally,
}

// BlockBuilder

struct BlockBuilder {
    kind: BlockKind,
    statements: Vec<OpId>,
    conditional: Option<(ConditionKind, OpId, BlockRef)>,
    exit: Option<Exit>,
    region: RegionRef,
    placed: bool,
    /// A later jump may come back here from inside a region entered
    /// after it, so no region may adopt it.
    pinned: bool,
}

impl BlockBuilder {
    fn new(kind: BlockKind) -> Self {
        BlockBuilder {
            kind,
            statements: Vec::new(),
            conditional: None,
            exit: None,
            region: RegionRef::ROOT,
            placed: false,
            pinned: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.conditional.is_none()
    }
}

// RegionBuilder

struct RegionBuilder {
    kind: RegionKind,
    parent: Option<RegionRef>,
    children: Vec<RegionRef>,
    locals: Vec<LocalId>,
    captures: Vec<CaptureId>,
    exception_type: Option<TypeId>,
    local_functions: Vec<(MethodId, u32)>,
    /// Blocks placed in this region or in any region nested in it.
    block_count: u32,
    live: bool,
}

impl RegionBuilder {
    fn new(kind: RegionKind, parent: Option<RegionRef>) -> Self {
        RegionBuilder {
            kind,
            parent,
            children: Vec::new(),
            locals: Vec::new(),
            captures: Vec::new(),
            exception_type: None,
            local_functions: Vec::new(),
            block_count: 0,
            live: true,
        }
    }

    /// Declares nothing, so it only matters if blocks land in it.
    fn declares_nothing(&self) -> bool {
        self.locals.is_empty() && self.captures.is_empty() && self.local_functions.is_empty()
    }
}

// FlowBuilder

pub(crate) struct FlowBuilder {
    pub(crate) ops: OpArena,
    blocks: Vec<BlockBuilder>,
    /// Placed blocks in placement order; a block's position is its ordinal.
    order: Vec<BlockRef>,
    regions: Vec<RegionBuilder>,
    stack: Vec<RegionRef>,
    /// Last placed block, while it has no fall-through yet.
    open: Option<BlockRef>,
    /// Whether statements may still be appended to `open`.
    accepting: bool,
    next_capture: u32,
    exit: BlockRef,
}

impl FlowBuilder {
    pub(crate) fn new() -> Self {
        let mut builder = FlowBuilder {
            ops: OpArena::new(),
            blocks: Vec::new(),
            order: Vec::new(),
            regions: vec![RegionBuilder::new(RegionKind::Root, None)],
            stack: vec![RegionRef::ROOT],
            open: None,
            accepting: false,
            next_capture: 0,
            exit: BlockRef(0),
        };
        let entry = builder.alloc(BlockKind::Entry);
        builder.place(entry);
        builder.accepting = false;
        builder.exit = builder.alloc(BlockKind::Exit);
        builder
    }

    fn alloc(&mut self, kind: BlockKind) -> BlockRef {
        let id = BlockRef(to_u32(self.blocks.len(), "blocks"));
        self.blocks.push(BlockBuilder::new(kind));
        id
    }

    // ── Blocks ──────────────────────────────────────────────────────

    /// Reserve a block to be placed later.
    pub(crate) fn reserve(&mut self) -> BlockRef {
        self.alloc(BlockKind::Block)
    }

    /// Place a reserved block in the current region. The open block, if
    /// any, falls through into it.
    pub(crate) fn place(&mut self, block: BlockRef) {
        debug_assert!(
            !self.blocks[block.index()].placed,
            "block {} placed twice",
            block.0
        );
        let region = self.current_region();
        if let Some(prev) = self.open.take() {
            self.blocks[prev.index()].exit = Some(Exit::Next(block));
        }
        let data = &mut self.blocks[block.index()];
        data.placed = true;
        data.region = region;
        self.order.push(block);
        self.count_block(region);
        self.open = Some(block);
        self.accepting = true;
        tracing::trace!(block = block.0, position = self.order.len() - 1, region = region.0, "placed block");
    }

    fn count_block(&mut self, region: RegionRef) {
        let mut current = Some(region);
        while let Some(r) = current {
            let data = &mut self.regions[r.index()];
            data.block_count += 1;
            current = data.parent;
        }
    }

    /// The block statements go into, placing a fresh one when the open
    /// block is sealed, finished or in another region.
    fn current_block(&mut self) -> BlockRef {
        if let Some(open) = self.open {
            if self.accepting && self.blocks[open.index()].region == self.current_region() {
                return open;
            }
        }
        let block = self.reserve();
        self.place(block);
        block
    }

    /// Place a block in the current region unless one is already there.
    pub(crate) fn ensure_block(&mut self) {
        if self.regions[self.current_region().index()].block_count == 0 {
            let block = self.reserve();
            self.place(block);
        }
    }

    /// Place a block that backward jumps target. It stays in the region it
    /// was placed in.
    pub(crate) fn place_target(&mut self, block: BlockRef) {
        self.place(block);
        self.blocks[block.index()].pinned = true;
    }

    /// Whether control can reach the next statement by falling through.
    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub(crate) fn add_statement(&mut self, op: OpId) {
        let block = self.current_block();
        self.blocks[block.index()].statements.push(op);
    }

    /// End the current block with a conditional jump; control falls
    /// through to the next block placed.
    pub(crate) fn branch_if(&mut self, kind: ConditionKind, value: OpId, dest: BlockRef) {
        let block = self.current_block();
        self.blocks[block.index()].conditional = Some((kind, value, dest));
        self.accepting = false;
    }

    pub(crate) fn jump(&mut self, dest: BlockRef) {
        self.terminate(Exit::Next(dest));
    }

    /// End the current block. Nothing falls through from it.
    pub(crate) fn terminate(&mut self, exit: Exit) {
        let block = self.current_block();
        let data = &mut self.blocks[block.index()];
        debug_assert!(data.exit.is_none(), "block {} already terminated", block.0);
        data.exit = Some(exit);
        self.open = None;
        self.accepting = false;
    }

    // ── Regions ─────────────────────────────────────────────────────

    pub(crate) fn current_region(&self) -> RegionRef {
        self.stack.last().copied().unwrap_or(RegionRef::ROOT)
    }

    pub(crate) fn enter_region(&mut self, kind: RegionKind) -> RegionRef {
        let parent = self.current_region();
        let region = RegionRef(to_u32(self.regions.len(), "regions"));
        self.regions.push(RegionBuilder::new(kind, Some(parent)));
        self.regions[parent.index()].children.push(region);
        self.stack.push(region);
        tracing::trace!(region = region.0, ?kind, "enter region");

        // An empty block just placed in the parent can start a new locals
        // region instead of staying behind as a pass-through. Protected and
        // handler regions always start with a block of their own.
        match self.open {
            Some(open) if self.accepting && kind == RegionKind::Locals => {
                let data = &mut self.blocks[open.index()];
                if data.kind == BlockKind::Block
                    && data.is_empty()
                    && !data.pinned
                    && data.region == parent
                {
                    data.region = region;
                    self.regions[region.index()].block_count += 1;
                } else {
                    self.accepting = false;
                }
            }
            _ => self.accepting = false,
        }
        region
    }

    pub(crate) fn leave_region(&mut self, region: RegionRef) -> Result<(), FlowError> {
        let top = self.current_region();
        if top != region || top == RegionRef::ROOT {
            return Err(FlowError::UnbalancedRegions {
                expected: region.0,
                found: top.0,
            });
        }
        let data = &self.regions[region.index()];
        if data.block_count == 0 {
            if data.kind == RegionKind::Locals && data.declares_nothing() {
                self.stack.pop();
                self.discard_region(region);
                return Ok(());
            }
            let block = self.reserve();
            self.place(block);
        }
        self.stack.pop();
        self.accepting = false;
        tracing::trace!(region = region.0, "leave region");
        Ok(())
    }

    fn discard_region(&mut self, region: RegionRef) {
        self.regions[region.index()].live = false;
        if let Some(parent) = self.regions[region.index()].parent {
            self.regions[parent.index()]
                .children
                .retain(|&child| child != region);
        }
    }

    pub(crate) fn declare_local(&mut self, region: RegionRef, local: LocalId) {
        self.regions[region.index()].locals.push(local);
    }

    pub(crate) fn set_exception_type(&mut self, region: RegionRef, ty: TypeId) {
        self.regions[region.index()].exception_type = Some(ty);
    }

    /// Record a local function on the innermost enclosing locals region.
    pub(crate) fn declare_local_function(&mut self, method: MethodId, graph: u32) {
        let region = self
            .stack
            .iter()
            .rev()
            .copied()
            .find(|r| self.regions[r.index()].kind == RegionKind::Locals)
            .unwrap_or(RegionRef::ROOT);
        self.regions[region.index()]
            .local_functions
            .push((method, graph));
    }

    // ── Captures ────────────────────────────────────────────────────

    /// Allocate a capture id whose lifetime is `region`.
    pub(crate) fn new_capture(&mut self, region: RegionRef) -> CaptureId {
        let id = CaptureId::new(self.next_capture);
        self.next_capture += 1;
        self.regions[region.index()].captures.push(id);
        id
    }

    // ── Finish ──────────────────────────────────────────────────────

    /// Place the exit block and assemble the graph.
    pub(crate) fn finish(
        mut self,
        nested: Vec<NestedGraph>,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<ControlFlowGraph, FlowError> {
        if self.stack.len() != 1 {
            return Err(FlowError::UnbalancedRegions {
                expected: RegionRef::ROOT.0,
                found: self.current_region().0,
            });
        }
        let exit = self.exit;
        self.place(exit);
        self.open = None;

        for &block in &self.order {
            let data = &self.blocks[block.index()];
            let conditional = data.conditional.map(|(_, _, dest)| dest);
            let next = match data.exit {
                Some(Exit::Next(dest)) => Some(dest),
                _ => None,
            };
            for dest in conditional.into_iter().chain(next) {
                if !self.blocks[dest.index()].placed {
                    return Err(FlowError::UnplacedBlock { block: dest.0 });
                }
            }
        }

        self.merge_capture_regions();

        // Blocks are numbered in placement order, regions in pre-order.
        let mut ordinals: FxHashMap<BlockRef, BlockId> = FxHashMap::default();
        for (i, &block) in self.order.iter().enumerate() {
            ordinals.insert(block, BlockId::new(to_u32(i, "blocks")));
        }
        let mut numbering: FxHashMap<RegionRef, RegionId> = FxHashMap::default();
        let mut preorder = Vec::new();
        let mut pending = vec![RegionRef::ROOT];
        while let Some(region) = pending.pop() {
            numbering.insert(region, RegionId::new(to_u32(preorder.len(), "regions")));
            preorder.push(region);
            pending.extend(self.regions[region.index()].children.iter().rev().copied());
        }

        let regions: Vec<Region> = preorder
            .iter()
            .map(|&r| {
                let data = &self.regions[r.index()];
                let mut captures = data.captures.clone();
                captures.sort_unstable();
                Region {
                    id: numbering[&r],
                    kind: data.kind,
                    enclosing: data.parent.map(|p| numbering[&p]),
                    nested: data.children.iter().map(|c| numbering[c]).collect(),
                    first_block: BlockId::new(0),
                    last_block: BlockId::new(0),
                    locals: data.locals.clone(),
                    captures,
                    exception_type: data.exception_type,
                    local_functions: data.local_functions.clone(),
                }
            })
            .collect();

        let exit_ordinal = ordinals[&exit];
        let mut blocks = Vec::with_capacity(self.order.len());
        for &block in &self.order {
            let data = &mut self.blocks[block.index()];
            let ordinal = ordinals[&block];
            let conditional = data.conditional.map(|(kind, value, dest)| ConditionalBranch {
                kind,
                value,
                branch: Branch::new(BranchSemantics::Regular, Some(ordinals[&dest]), OpId::INVALID),
            });
            let fall_through = match data.exit {
                Some(Exit::Next(dest)) => Some(Branch::new(
                    BranchSemantics::Regular,
                    Some(ordinals[&dest]),
                    OpId::INVALID,
                )),
                Some(Exit::Return(value)) => Some(Branch::new(
                    BranchSemantics::Return,
                    Some(exit_ordinal),
                    value,
                )),
                Some(Exit::Throw(value)) => Some(Branch::new(BranchSemantics::Throw, None, value)),
                Some(Exit::Rethrow) => {
                    Some(Branch::new(BranchSemantics::Rethrow, None, OpId::INVALID))
                }
                Some(Exit::EndFinally) => Some(Branch::new(
                    BranchSemantics::StructuredExceptionHandling,
                    None,
                    OpId::INVALID,
                )),
                None if data.kind == BlockKind::Exit => None,
                None => {
                    return Err(FlowError::Malformed(format!(
                        "block B{ordinal} has no successor"
                    )))
                }
            };
            blocks.push(BasicBlock {
                ordinal,
                kind: data.kind,
                statements: std::mem::take(&mut data.statements),
                predecessors: Vec::new(),
                conditional,
                fall_through,
                is_reachable: false,
                region: numbering[&data.region],
            });
        }

        let mut graph = ControlFlowGraph {
            ops: self.ops,
            blocks,
            regions,
            nested,
            diagnostics,
            capture_count: self.next_capture,
        };
        finalize::link(&mut graph);
        Ok(graph)
    }

    /// Fold a region that only holds captures into its enclosing locals
    /// region when both cover exactly the same blocks.
    fn merge_capture_regions(&mut self) {
        let ranges = self.placement_ranges();
        for i in 1..self.regions.len() {
            let region = RegionRef(to_u32(i, "regions"));
            let data = &self.regions[i];
            if !data.live
                || data.kind != RegionKind::Locals
                || !data.locals.is_empty()
                || !data.local_functions.is_empty()
            {
                continue;
            }
            let Some(parent) = data.parent else { continue };
            let parent_data = &self.regions[parent.index()];
            if parent == RegionRef::ROOT
                || parent_data.kind != RegionKind::Locals
                || ranges[i] != ranges[parent.index()]
            {
                continue;
            }

            let captures = std::mem::take(&mut self.regions[i].captures);
            let children = std::mem::take(&mut self.regions[i].children);
            for &child in &children {
                self.regions[child.index()].parent = Some(parent);
            }
            let siblings = &mut self.regions[parent.index()].children;
            if let Some(at) = siblings.iter().position(|&c| c == region) {
                siblings.remove(at);
                for (offset, child) in children.into_iter().enumerate() {
                    siblings.insert(at + offset, child);
                }
            }
            self.regions[parent.index()].captures.extend(captures);
            self.regions[i].live = false;
            for block in &mut self.blocks {
                if block.placed && block.region == region {
                    block.region = parent;
                }
            }
            tracing::trace!(region = region.0, into = parent.0, "merged capture region");
        }
    }

    /// First and last placement position covered by each region.
    fn placement_ranges(&self) -> Vec<Option<(usize, usize)>> {
        let mut ranges: Vec<Option<(usize, usize)>> = vec![None; self.regions.len()];
        for (pos, &block) in self.order.iter().enumerate() {
            let mut current = Some(self.blocks[block.index()].region);
            while let Some(r) = current {
                let range = &mut ranges[r.index()];
                *range = Some(match *range {
                    Some((first, last)) => (first.min(pos), last.max(pos)),
                    None => (pos, pos),
                });
                current = self.regions[r.index()].parent;
            }
        }
        ranges
    }
}

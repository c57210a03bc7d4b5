//! Structural checks on a finished graph.
//!
//! Runs after every build unless disabled in [`FlowOptions`](crate::FlowOptions).
//! Nested graphs are checked when they are built, so this only looks at
//! the graph it is given.

use rustc_hash::FxHashSet;

use opal_ir::operation::{walk_op, OpVisitor};
use opal_ir::{CaptureId, OpArena, OpId, OpKind};

use crate::graph::{BlockId, BlockKind, BranchSemantics, ControlFlowGraph, RegionKind};
use crate::FlowError;

/// Check the graph's structural invariants.
///
/// # Errors
/// [`FlowError::CaptureWithoutProducer`] when a capture is read before any
/// block produces it, [`FlowError::Malformed`] for any other violation.
pub fn verify(graph: &ControlFlowGraph) -> Result<(), FlowError> {
    check_blocks(graph)?;
    check_predecessors(graph)?;
    check_regions(graph)?;
    check_handlers(graph)?;
    check_captures(graph)
}

fn malformed(message: String) -> Result<(), FlowError> {
    Err(FlowError::Malformed(message))
}

fn check_blocks(graph: &ControlFlowGraph) -> Result<(), FlowError> {
    let count = graph.blocks.len();
    if count < 2 {
        return malformed(format!("graph has {count} blocks; entry and exit are required"));
    }
    for (i, block) in graph.blocks.iter().enumerate() {
        if block.ordinal.index() != i {
            return malformed(format!("block at position {i} has ordinal {}", block.ordinal));
        }
        let expected = if i == 0 {
            BlockKind::Entry
        } else if i == count - 1 {
            BlockKind::Exit
        } else {
            BlockKind::Block
        };
        if block.kind != expected {
            return malformed(format!("block B{i} is {:?}, expected {expected:?}", block.kind));
        }
        let edges = block
            .conditional
            .iter()
            .map(|c| &c.branch)
            .chain(block.fall_through.iter());
        for branch in edges {
            if let Some(dest) = branch.destination {
                if dest.index() >= count {
                    return malformed(format!("block B{i} branches to missing block B{dest}"));
                }
            }
        }
        match (block.kind, &block.fall_through) {
            (BlockKind::Exit, Some(_)) => {
                return malformed("exit block has a successor".to_owned());
            }
            (BlockKind::Exit, None) => {}
            (_, None) => return malformed(format!("block B{i} has no successor")),
            (_, Some(_)) => {}
        }
        if block.kind == BlockKind::Exit && block.conditional.is_some() {
            return malformed("exit block has a conditional successor".to_owned());
        }
    }
    if !graph.entry().predecessors.is_empty() {
        return malformed("entry block has predecessors".to_owned());
    }
    Ok(())
}

fn check_predecessors(graph: &ControlFlowGraph) -> Result<(), FlowError> {
    let mut expected: Vec<Vec<BlockId>> = vec![Vec::new(); graph.blocks.len()];
    for block in &graph.blocks {
        for succ in block.successors() {
            expected[succ.index()].push(block.ordinal);
        }
    }
    for (block, mut preds) in graph.blocks.iter().zip(expected) {
        preds.sort_unstable();
        preds.dedup();
        if block.predecessors != preds {
            return malformed(format!(
                "block B{} lists predecessors {:?}, edges give {preds:?}",
                block.ordinal, block.predecessors
            ));
        }
    }
    Ok(())
}

fn check_regions(graph: &ControlFlowGraph) -> Result<(), FlowError> {
    let Some(root) = graph.regions.first() else {
        return malformed("graph has no root region".to_owned());
    };
    let last = graph.blocks.len().saturating_sub(1);
    if root.kind != RegionKind::Root || root.first_block.index() != 0 || root.last_block.index() != last {
        return malformed("root region must span every block".to_owned());
    }
    for region in &graph.regions {
        if region.first_block > region.last_block {
            return malformed(format!("region R{} has an inverted block range", region.id));
        }
        let mut previous_end: Option<BlockId> = None;
        for &child in &region.nested {
            let data = graph.region(child);
            if data.enclosing != Some(region.id) {
                return malformed(format!("region R{child} does not point back at R{}", region.id));
            }
            if data.first_block < region.first_block || data.last_block > region.last_block {
                return malformed(format!("region R{child} escapes R{}", region.id));
            }
            if previous_end.is_some_and(|end| data.first_block <= end) {
                return malformed(format!("region R{child} overlaps a sibling"));
            }
            previous_end = Some(data.last_block);
        }
    }
    for block in &graph.blocks {
        let region = graph.region(block.region);
        if !region.contains(block.ordinal) {
            return malformed(format!("block B{} lies outside its region R{}", block.ordinal, region.id));
        }
        if let Some(&child) = region.nested.iter().find(|&&c| graph.region(c).contains(block.ordinal)) {
            return malformed(format!(
                "block B{} belongs to R{} but lies inside nested R{child}",
                block.ordinal, region.id
            ));
        }
    }
    Ok(())
}

/// Handler entries have no incoming edges, and no regular edge leaves a
/// finally handler.
fn check_handlers(graph: &ControlFlowGraph) -> Result<(), FlowError> {
    for region in &graph.regions {
        if !matches!(region.kind, RegionKind::Catch | RegionKind::Finally) {
            continue;
        }
        if !graph.block(region.first_block).predecessors.is_empty() {
            return malformed(format!("handler R{} is entered by a branch", region.id));
        }
        if region.kind != RegionKind::Finally {
            continue;
        }
        for block in &graph.blocks[region.first_block.index()..=region.last_block.index()] {
            let edges = block
                .conditional
                .iter()
                .map(|c| &c.branch)
                .chain(block.fall_through.iter());
            for branch in edges {
                let leaves = branch
                    .destination
                    .is_some_and(|dest| !region.contains(dest));
                if branch.semantics == BranchSemantics::Regular && leaves {
                    return malformed(format!(
                        "block B{} branches out of finally handler R{}",
                        block.ordinal, region.id
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Every capture reference is preceded, in block order, by a capture of
/// the same id.
fn check_captures(graph: &ControlFlowGraph) -> Result<(), FlowError> {
    let mut scan = CaptureScan {
        produced: FxHashSet::default(),
        missing: None,
    };
    for block in &graph.blocks {
        let values = block
            .statements
            .iter()
            .copied()
            .chain(block.conditional.iter().map(|c| c.value))
            .chain(block.fall_through.iter().map(|b| b.value));
        for op in values {
            if op.is_valid() {
                scan.visit_op(&graph.ops, op);
            }
            if let Some(id) = scan.missing {
                return Err(FlowError::CaptureWithoutProducer { id });
            }
        }
    }
    let declared: FxHashSet<CaptureId> = graph
        .regions
        .iter()
        .flat_map(|r| r.captures.iter().copied())
        .collect();
    if let Some(&id) = scan.produced.iter().find(|id| !declared.contains(id)) {
        return malformed(format!("capture {id} belongs to no region"));
    }
    Ok(())
}

struct CaptureScan {
    produced: FxHashSet<CaptureId>,
    missing: Option<CaptureId>,
}

impl OpVisitor for CaptureScan {
    fn visit_op(&mut self, arena: &OpArena, id: OpId) {
        match arena.kind(id) {
            OpKind::FlowCaptureReference { id: capture } => {
                if !self.produced.contains(&capture) && self.missing.is_none() {
                    self.missing = Some(capture);
                }
            }
            OpKind::FlowCapture { id: capture, .. } => {
                walk_op(self, arena, id);
                self.produced.insert(capture);
            }
            _ => walk_op(self, arena, id),
        }
    }
}

#[cfg(test)]
mod tests;

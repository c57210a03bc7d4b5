//! Reachability.
//!
//! Forward propagation from the entry block. A conditional branch whose
//! value is a boolean constant only follows the edge that value selects.
//! Exception handlers have no incoming edges: a catch or finally handler is
//! reachable as soon as its protected try region contains a reachable block.

use smallvec::SmallVec;

use crate::graph::{BlockId, ControlFlowGraph, RegionKind};

pub(crate) fn mark_reachable(graph: &mut ControlFlowGraph) {
    let mut reachable = vec![false; graph.blocks.len()];
    let mut work: Vec<BlockId> = Vec::new();
    if let Some(entry) = graph.blocks.first() {
        reachable[entry.ordinal.index()] = true;
        work.push(entry.ordinal);
    }

    loop {
        while let Some(block) = work.pop() {
            for succ in taken_successors(graph, block) {
                if !reachable[succ.index()] {
                    reachable[succ.index()] = true;
                    work.push(succ);
                }
            }
        }

        for handler in handler_entries(graph, &reachable) {
            if !reachable[handler.index()] {
                reachable[handler.index()] = true;
                work.push(handler);
            }
        }
        if work.is_empty() {
            break;
        }
    }

    for (block, is_reachable) in graph.blocks.iter_mut().zip(reachable) {
        block.is_reachable = is_reachable;
    }
}

/// Successors control can actually move to from `block`.
fn taken_successors(graph: &ControlFlowGraph, block: BlockId) -> SmallVec<[BlockId; 2]> {
    let data = graph.block(block);
    let mut out = SmallVec::new();
    let (take_conditional, take_fall_through) = match &data.conditional {
        Some(c) => match graph.ops.constant(c.value).and_then(|v| v.as_bool()) {
            Some(value) if value == c.kind.jumps_on() => (true, false),
            Some(_) => (false, true),
            None => (true, true),
        },
        None => (false, true),
    };
    if take_conditional {
        if let Some(dest) = data.conditional.as_ref().and_then(|c| c.branch.destination) {
            out.push(dest);
        }
    }
    if take_fall_through {
        if let Some(dest) = data.fall_through.as_ref().and_then(|b| b.destination) {
            out.push(dest);
        }
    }
    out
}

/// First blocks of the handlers guarding a try region with a reachable block.
fn handler_entries(graph: &ControlFlowGraph, reachable: &[bool]) -> Vec<BlockId> {
    let mut out = Vec::new();
    for region in graph.regions_of_kind(RegionKind::Try) {
        let protected_reachable = (region.first_block.index()..=region.last_block.index())
            .any(|b| reachable[b]);
        if !protected_reachable {
            continue;
        }
        let Some(parent) = region.enclosing else {
            continue;
        };
        for &sibling in &graph.region(parent).nested {
            let handler = graph.region(sibling);
            if matches!(handler.kind, RegionKind::Catch | RegionKind::Finally) {
                out.push(handler.first_block);
            }
        }
    }
    out
}

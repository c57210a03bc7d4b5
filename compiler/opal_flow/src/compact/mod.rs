//! Optional removal of pass-through blocks.
//!
//! A block is a pass-through when it has no statements, no conditional
//! successor and a regular edge to another block of the same region.
//! Edges into it are redirected to where it leads and the survivors are
//! renumbered. Handler entries stay, as do blocks that only lead to each
//! other in a cycle.

use rustc_hash::FxHashSet;

use crate::finalize;
use crate::graph::{BlockId, BlockKind, BranchSemantics, ControlFlowGraph, RegionKind};

/// Remove pass-through blocks. Changes block ordinals.
pub fn compact(graph: &mut ControlFlowGraph) {
    let mut removable: Vec<bool> = graph
        .blocks
        .iter()
        .map(|block| pass_through_target(graph, block.ordinal).is_some())
        .collect();
    if !removable.iter().any(|&r| r) {
        return;
    }
    break_cycles(graph, &mut removable);

    let mut renumbered: Vec<Option<BlockId>> = vec![None; graph.blocks.len()];
    let mut next = 0;
    for (i, &remove) in removable.iter().enumerate() {
        if !remove {
            renumbered[i] = Some(BlockId::new(next));
            next += 1;
        }
    }
    let resolve = |mut block: BlockId| -> Option<BlockId> {
        while removable[block.index()] {
            block = pass_through_target(graph, block)?;
        }
        renumbered[block.index()]
    };

    let mut targets: Vec<(Option<Option<BlockId>>, Option<Option<BlockId>>)> =
        Vec::with_capacity(graph.blocks.len());
    for block in &graph.blocks {
        let conditional = block
            .conditional
            .as_ref()
            .map(|c| c.branch.destination.and_then(resolve));
        let fall_through = block
            .fall_through
            .as_ref()
            .map(|b| b.destination.and_then(resolve));
        targets.push((conditional, fall_through));
    }

    let removed = removable.iter().filter(|&&r| r).count();
    let blocks = std::mem::take(&mut graph.blocks);
    graph.blocks = blocks
        .into_iter()
        .zip(targets)
        .zip(removable)
        .filter(|(_, remove)| !remove)
        .enumerate()
        .map(|(i, ((mut block, (conditional, fall_through)), _))| {
            block.ordinal = BlockId::new(crate::graph::to_u32(i, "blocks"));
            if let (Some(c), Some(dest)) = (block.conditional.as_mut(), conditional) {
                c.branch.destination = dest;
            }
            if let (Some(b), Some(dest)) = (block.fall_through.as_mut(), fall_through) {
                b.destination = dest;
            }
            block
        })
        .collect();
    finalize::link(graph);
    tracing::debug!(removed, blocks = graph.blocks.len(), "compacted flow graph");
}

/// Where `block` leads if it is a removable pass-through.
fn pass_through_target(graph: &ControlFlowGraph, block: BlockId) -> Option<BlockId> {
    let data = graph.block(block);
    if data.kind != BlockKind::Block || !data.statements.is_empty() || data.conditional.is_some() {
        return None;
    }
    let branch = data.fall_through.as_ref()?;
    if branch.semantics != BranchSemantics::Regular {
        return None;
    }
    let dest = branch.destination?;
    if dest == block || graph.block(dest).region != data.region || is_handler_entry(graph, block) {
        return None;
    }
    Some(dest)
}

fn is_handler_entry(graph: &ControlFlowGraph, block: BlockId) -> bool {
    graph.regions.iter().any(|region| {
        matches!(region.kind, RegionKind::Catch | RegionKind::Finally) && region.first_block == block
    })
}

/// Keep every block on a chain of pass-throughs that loops back on itself.
fn break_cycles(graph: &ControlFlowGraph, removable: &mut [bool]) {
    for start in 0..removable.len() {
        if !removable[start] {
            continue;
        }
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut current = start;
        while removable[current] {
            if !seen.insert(current) {
                for &block in &seen {
                    removable[block] = false;
                }
                break;
            }
            match pass_through_target(graph, BlockId::new(crate::graph::to_u32(current, "blocks"))) {
                Some(next) => current = next.index(),
                None => break,
            }
        }
    }
}

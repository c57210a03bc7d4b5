//! Derived graph data.
//!
//! Everything here is a function of the blocks' edges and regions, so it is
//! recomputed from scratch whenever blocks are renumbered (at finish and
//! after compaction).

use smallvec::SmallVec;

use crate::graph::{BlockId, Branch, ControlFlowGraph, RegionId, RegionKind};
use crate::reachability;

/// Recompute region ranges, predecessors, edge region lists and reachability.
pub(crate) fn link(graph: &mut ControlFlowGraph) {
    compute_region_ranges(graph);
    compute_predecessors(graph);
    compute_edge_regions(graph);
    reachability::mark_reachable(graph);
}

fn compute_region_ranges(graph: &mut ControlFlowGraph) {
    let mut ranges: Vec<Option<(BlockId, BlockId)>> = vec![None; graph.regions.len()];
    for block in &graph.blocks {
        for region in graph.region_chain(block.region) {
            let range = &mut ranges[region.index()];
            *range = Some(match *range {
                Some((first, last)) => (first.min(block.ordinal), last.max(block.ordinal)),
                None => (block.ordinal, block.ordinal),
            });
        }
    }
    for (region, range) in graph.regions.iter_mut().zip(ranges) {
        if let Some((first, last)) = range {
            region.first_block = first;
            region.last_block = last;
        }
    }
}

fn compute_predecessors(graph: &mut ControlFlowGraph) {
    let mut predecessors: Vec<Vec<BlockId>> = vec![Vec::new(); graph.blocks.len()];
    for block in &graph.blocks {
        for succ in block.successors() {
            predecessors[succ.index()].push(block.ordinal);
        }
    }
    for (block, mut preds) in graph.blocks.iter_mut().zip(predecessors) {
        preds.sort_unstable();
        preds.dedup();
        block.predecessors = preds;
    }
}

fn compute_edge_regions(graph: &mut ControlFlowGraph) {
    let mut updates: Vec<(usize, Option<Crossing>, Option<Crossing>)> = Vec::new();
    for (i, block) in graph.blocks.iter().enumerate() {
        let conditional = block
            .conditional
            .as_ref()
            .map(|c| crossing(graph, block.region, &c.branch));
        let fall_through = block
            .fall_through
            .as_ref()
            .map(|b| crossing(graph, block.region, b));
        updates.push((i, conditional, fall_through));
    }
    for (i, conditional, fall_through) in updates {
        let block = &mut graph.blocks[i];
        if let (Some(c), Some(crossing)) = (block.conditional.as_mut(), conditional) {
            crossing.apply(&mut c.branch);
        }
        if let (Some(b), Some(crossing)) = (block.fall_through.as_mut(), fall_through) {
            crossing.apply(b);
        }
    }
}

struct Crossing {
    finalizing: SmallVec<[RegionId; 2]>,
    leaving: SmallVec<[RegionId; 4]>,
    entering: SmallVec<[RegionId; 4]>,
}

impl Crossing {
    fn apply(self, branch: &mut Branch) {
        branch.finalizing = self.finalizing;
        branch.leaving = self.leaving;
        branch.entering = self.entering;
    }
}

/// Regions an edge from a block in `source` crosses on its way to the
/// branch's destination. Edges without a destination cross nothing.
fn crossing(graph: &ControlFlowGraph, source: RegionId, branch: &Branch) -> Crossing {
    let mut out = Crossing {
        finalizing: SmallVec::new(),
        leaving: SmallVec::new(),
        entering: SmallVec::new(),
    };
    let Some(dest) = branch.destination else {
        return out;
    };
    let from = graph.region_chain(source);
    let to = graph.region_chain(graph.block(dest).region);

    for &region in &from {
        if to.contains(&region) {
            break;
        }
        out.leaving.push(region);
        if let Some(finally) = finally_for(graph, region) {
            out.finalizing.push(finally);
        }
    }
    for &region in to.iter().rev() {
        if !from.contains(&region) {
            out.entering.push(region);
        }
    }
    out
}

/// The finally handler that runs when control leaves the try part of a
/// try/finally.
fn finally_for(graph: &ControlFlowGraph, region: RegionId) -> Option<RegionId> {
    let data = graph.region(region);
    if data.kind != RegionKind::Try {
        return None;
    }
    let parent = graph.region(data.enclosing?);
    if parent.kind != RegionKind::TryAndFinally {
        return None;
    }
    parent
        .nested
        .iter()
        .copied()
        .find(|&r| graph.region(r).kind == RegionKind::Finally)
}

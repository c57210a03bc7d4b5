use pretty_assertions::assert_eq;

use opal_diagnostic::{break_outside_loop, Diagnostic, ErrorCode};
use opal_ir::{MethodId, OpArena, OpId, Span};
use smallvec::SmallVec;

use super::*;

fn block(ordinal: u32, kind: BlockKind, region: u32) -> BasicBlock {
    BasicBlock {
        ordinal: BlockId::new(ordinal),
        kind,
        statements: Vec::new(),
        predecessors: Vec::new(),
        conditional: None,
        fall_through: None,
        is_reachable: true,
        region: RegionId::new(region),
    }
}

fn region(id: u32, kind: RegionKind, enclosing: Option<u32>, blocks: (u32, u32)) -> Region {
    Region {
        id: RegionId::new(id),
        kind,
        enclosing: enclosing.map(RegionId::new),
        nested: Vec::new(),
        first_block: BlockId::new(blocks.0),
        last_block: BlockId::new(blocks.1),
        locals: Vec::new(),
        captures: Vec::new(),
        exception_type: None,
        local_functions: Vec::new(),
    }
}

fn graph(blocks: Vec<BasicBlock>, regions: Vec<Region>, diagnostics: Vec<Diagnostic>) -> ControlFlowGraph {
    ControlFlowGraph {
        ops: OpArena::new(),
        blocks,
        regions,
        nested: Vec::new(),
        diagnostics,
        capture_count: 0,
    }
}

/// Entry, one block inside a locals region, exit.
fn three_blocks() -> ControlFlowGraph {
    let mut root = region(0, RegionKind::Root, None, (0, 2));
    root.nested.push(RegionId::new(1));
    graph(
        vec![
            block(0, BlockKind::Entry, 0),
            block(1, BlockKind::Block, 1),
            block(2, BlockKind::Exit, 0),
        ],
        vec![root, region(1, RegionKind::Locals, Some(0), (1, 1))],
        Vec::new(),
    )
}

#[test]
fn successors_are_deduplicated() {
    let mut data = block(1, BlockKind::Block, 0);
    data.conditional = Some(ConditionalBranch {
        kind: ConditionKind::JumpIfTrue,
        value: OpId::INVALID,
        branch: Branch::new(BranchSemantics::Regular, Some(BlockId::new(2)), OpId::INVALID),
    });
    data.fall_through = Some(Branch::new(
        BranchSemantics::Regular,
        Some(BlockId::new(2)),
        OpId::INVALID,
    ));
    let expected: SmallVec<[BlockId; 2]> = SmallVec::from_slice(&[BlockId::new(2)]);
    assert_eq!(data.successors(), expected);
}

#[test]
fn throw_has_no_successor() {
    let mut data = block(1, BlockKind::Block, 0);
    data.fall_through = Some(Branch::new(BranchSemantics::Throw, None, OpId::INVALID));
    assert!(data.successors().is_empty());
}

#[test]
fn region_chain_runs_innermost_first() {
    let graph = three_blocks();
    let chain: Vec<RegionId> = graph.region_chain(RegionId::new(1)).into_iter().collect();
    assert_eq!(chain, vec![RegionId::new(1), RegionId::ROOT]);
    assert!(graph.region(RegionId::new(1)).contains(BlockId::new(1)));
    assert!(!graph.region(RegionId::new(1)).contains(BlockId::new(2)));
}

#[test]
fn entry_and_exit_are_the_ends() {
    let graph = three_blocks();
    assert_eq!(graph.entry().ordinal, BlockId::new(0));
    assert_eq!(graph.exit().ordinal, BlockId::new(2));
    assert_eq!(graph.root_region().kind, RegionKind::Root);
    assert_eq!(graph.regions_of_kind(RegionKind::Locals).count(), 1);
}

#[test]
fn unreachable_blocks_are_listed() {
    let mut graph = three_blocks();
    graph.blocks[1].is_reachable = false;
    let unreachable: Vec<BlockId> = graph.unreachable_blocks().map(|b| b.ordinal).collect();
    assert_eq!(unreachable, vec![BlockId::new(1)]);
}

#[test]
fn diagnostics_include_nested_graphs() {
    let inner = graph(
        vec![block(0, BlockKind::Entry, 0), block(1, BlockKind::Exit, 0)],
        vec![region(0, RegionKind::Root, None, (0, 1))],
        vec![break_outside_loop(Span::DUMMY)],
    );
    let mut outer = three_blocks();
    assert!(!outer.has_errors());
    outer.nested.push(NestedGraph {
        method: MethodId::new(0),
        kind: NestedKind::Lambda,
        graph: inner,
    });

    let codes: Vec<ErrorCode> = outer.all_diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::CS0139]);
    assert!(outer.has_errors());
}

#[test]
fn names_match_the_dump() {
    assert_eq!(BlockKind::Entry.name(), "Entry");
    assert_eq!(
        BranchSemantics::StructuredExceptionHandling.name(),
        "StructuredExceptionHandling"
    );
    assert!(ConditionKind::JumpIfTrue.jumps_on());
    assert!(!ConditionKind::JumpIfFalse.jumps_on());
    assert_eq!(BlockId::new(7).to_string(), "7");
}

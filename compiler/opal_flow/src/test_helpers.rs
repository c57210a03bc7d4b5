#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test helpers: panics give clear failure messages"
)]
//! Shared test utilities: bind a fixture body, build its graph, dump it.

use opal_bind::testing::Fixture;
use opal_bind::BoundBody;
use opal_ir::{OpId, OpKind, SynStmtId};

use crate::graph::{BasicBlock, BlockId, ControlFlowGraph, RegionId, RegionKind};
use crate::{build_graph, DumpContext, FlowContext, FlowOptions};

/// Route `tracing` output through the test harness. `RUST_LOG` picks the level.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn context(f: &Fixture) -> FlowContext<'_> {
    FlowContext::new(&f.types, &f.symbols, &f.interner)
}

/// Bind `body` and build its graph with default options.
pub(crate) fn build(f: &Fixture, body: SynStmtId) -> ControlFlowGraph {
    build_with(f, body, &FlowOptions::default())
}

pub(crate) fn build_with(f: &Fixture, body: SynStmtId, options: &FlowOptions) -> ControlFlowGraph {
    init_tracing();
    let bound = f.bind_body(body);
    build_bound(f, &bound, options)
}

pub(crate) fn build_bound(f: &Fixture, bound: &BoundBody, options: &FlowOptions) -> ControlFlowGraph {
    build_graph(&context(f), &bound.ops, bound.root, options).expect("flow graph should build")
}

pub(crate) fn dump(f: &Fixture, graph: &ControlFlowGraph) -> String {
    graph.dump(&DumpContext::new(&f.types, &f.symbols, &f.interner).with_source(&f.source))
}

pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

pub(crate) fn r(n: u32) -> RegionId {
    RegionId::new(n)
}

/// Destination of a block's fall-through edge.
pub(crate) fn next(block: &BasicBlock) -> Option<BlockId> {
    block.fall_through.as_ref().and_then(|branch| branch.destination)
}

/// Destination of a block's conditional edge.
pub(crate) fn jump(block: &BasicBlock) -> Option<BlockId> {
    block.conditional.as_ref().and_then(|c| c.branch.destination)
}

/// Region kinds in pre-order, root excluded.
pub(crate) fn region_kinds(graph: &ControlFlowGraph) -> Vec<RegionKind> {
    graph.regions.iter().skip(1).map(|r| r.kind).collect()
}

/// Statement kinds of one block.
pub(crate) fn statement_kinds(graph: &ControlFlowGraph, block: BlockId) -> Vec<OpKind> {
    graph
        .block(block)
        .statements
        .iter()
        .map(|&s| graph.ops.kind(s))
        .collect()
}

/// The value captured by the `FlowCapture` statement `stmt`.
pub(crate) fn captured(graph: &ControlFlowGraph, stmt: OpId) -> (u32, OpId) {
    match graph.ops.kind(stmt) {
        OpKind::FlowCapture { id, value } => (id.raw(), value),
        other => panic!("expected a flow capture, found {other:?}"),
    }
}

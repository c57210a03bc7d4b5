//! Flow graph builder: operation trees to basic blocks and regions.
//!
//! Lowers one bound body (see `opal_bind`) into a [`ControlFlowGraph`]:
//!
//! - `??`, `?:` and value-context `&&`/`||` split blocks and thread their
//!   results through numbered flow captures
//! - conditions jump directly, `!` flips the jump sense
//! - `goto`, labels, `break` and `continue` become edges; unresolvable
//!   jumps become invalid statements plus a diagnostic
//! - `try`/`catch`/`finally` open regions, and edges record the regions
//!   they enter, leave and finalize
//! - lambdas and local functions are built as nested graphs
//!
//! User errors never fail a build. [`FlowError`] is reserved for broken
//! builder invariants.

mod builder;
mod compact;
mod dump;
mod finalize;
pub mod graph;
mod lower;
mod reachability;
mod verify;

#[cfg(test)]
mod test_helpers;

use rayon::prelude::*;

use opal_ir::{CaptureId, OpArena, OpId, OpKind, StringInterner, SymbolTable, TypePool};

pub use compact::compact;
pub use dump::DumpContext;
pub use graph::{
    BasicBlock, BlockId, BlockKind, Branch, BranchSemantics, ConditionKind, ConditionalBranch,
    ControlFlowGraph, NestedGraph, NestedKind, Region, RegionId, RegionKind,
};
pub use verify::verify;

/// Options for building flow graphs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowOptions {
    /// Remove empty pass-through blocks. Changes block ordinals.
    pub compact: bool,
    /// Check the graph's structural invariants before returning it.
    pub verify: bool,
    /// Minimum number of bodies before [`build_graphs`] goes parallel.
    pub parallel_threshold: usize,
}

impl Default for FlowOptions {
    fn default() -> Self {
        FlowOptions {
            compact: false,
            verify: true,
            parallel_threshold: 4,
        }
    }
}

/// A broken builder invariant. Never caused by errors in the user's program.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("flow capture {id} is referenced before any capture produces it")]
    CaptureWithoutProducer { id: CaptureId },
    #[error("block {block} is the target of a branch but was never placed")]
    UnplacedBlock { block: u32 },
    #[error("region stack is unbalanced: leaving region {expected} but region {found} is open")]
    UnbalancedRegions { expected: u32, found: u32 },
    #[error("operation {0:?} is not a statement and cannot be lowered as a body")]
    NotABody(OpId),
    #[error("malformed flow graph: {0}")]
    Malformed(String),
}

/// The read-only tables a build looks symbols and types up in.
#[derive(Copy, Clone)]
pub struct FlowContext<'a> {
    pub types: &'a TypePool,
    pub symbols: &'a SymbolTable,
    pub interner: &'a StringInterner,
}

impl<'a> FlowContext<'a> {
    pub fn new(types: &'a TypePool, symbols: &'a SymbolTable, interner: &'a StringInterner) -> Self {
        FlowContext {
            types,
            symbols,
            interner,
        }
    }
}

/// One body to build: an operation arena and its root statement.
#[derive(Copy, Clone)]
pub struct FlowBody<'a> {
    pub ops: &'a OpArena,
    pub root: OpId,
}

/// Build the flow graph of one body.
pub fn build_graph(
    ctx: &FlowContext<'_>,
    ops: &OpArena,
    root: OpId,
    options: &FlowOptions,
) -> Result<ControlFlowGraph, FlowError> {
    if !is_body(ops, root) {
        return Err(FlowError::NotABody(root));
    }
    tracing::debug!(ops = ops.len(), "building flow graph");
    let mut graph = lower::lower_body(ctx, ops, root, options)?;
    if options.compact {
        compact(&mut graph);
    }
    if options.verify {
        verify(&graph)?;
    }
    tracing::debug!(
        blocks = graph.blocks.len(),
        regions = graph.regions.len(),
        captures = graph.capture_count,
        diagnostics = graph.diagnostics.len(),
        "built flow graph"
    );
    Ok(graph)
}

/// Statements, including the typeless `Conditional` an `if` binds to.
fn is_body(ops: &OpArena, root: OpId) -> bool {
    if !root.is_valid() {
        return false;
    }
    match ops.kind(root) {
        OpKind::Conditional { .. } => ops.ty(root).is_none(),
        kind => kind.is_statement(),
    }
}

/// Build many independent bodies. Results are in input order.
pub fn build_graphs(
    ctx: &FlowContext<'_>,
    bodies: &[FlowBody<'_>],
    options: &FlowOptions,
) -> Vec<Result<ControlFlowGraph, FlowError>> {
    if bodies.len() >= options.parallel_threshold {
        tracing::debug!(bodies = bodies.len(), "building flow graphs in parallel");
        bodies
            .par_iter()
            .map(|body| build_graph(ctx, body.ops, body.root, options))
            .collect()
    } else {
        bodies
            .iter()
            .map(|body| build_graph(ctx, body.ops, body.root, options))
            .collect()
    }
}

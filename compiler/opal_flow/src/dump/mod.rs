//! Text rendering of flow graphs.
//!
//! Blocks are listed in ordinal order, nested inside the regions that
//! contain them:
//!
//! ```text
//! Block[B0] - Entry
//!     Statements (0)
//!     Next (Regular) Block[B1]
//!         Entering: {R1}
//!
//! .locals {R1}
//! {
//!     CaptureIds: [0]
//!     Block[B1] - Block
//!         Predecessors: [B0]
//!         Statements (1)
//!             ...
//! }
//! ```
//!
//! A try statement prints its protected part as `.try {Rgroup, Rtry}` with
//! the handlers following at the same depth. Lambda graphs print inline
//! under their `IFlowAnonymousFunctionOperation` with block and region
//! names suffixed `#A{n}`; local function graphs print at the end of the
//! region that declares them, suffixed `#{n}R{region}`.

use std::fmt::Write as _;

use opal_ir::operation::{write_tree, PrintContext};
use opal_ir::{StringInterner, SymbolTable, TypePool};

use crate::graph::{
    BasicBlock, BlockId, BlockKind, Branch, ControlFlowGraph, NestedKind, RegionId, RegionKind,
};

/// Tables a dump resolves names through.
#[derive(Copy, Clone)]
pub struct DumpContext<'a> {
    pub types: &'a TypePool,
    pub symbols: &'a SymbolTable,
    pub interner: &'a StringInterner,
    /// Source text, for the `(Syntax: '...')` column.
    pub source: Option<&'a str>,
}

impl<'a> DumpContext<'a> {
    pub fn new(types: &'a TypePool, symbols: &'a SymbolTable, interner: &'a StringInterner) -> Self {
        DumpContext {
            types,
            symbols,
            interner,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }
}

impl ControlFlowGraph {
    /// Render the graph, its regions and nested graphs.
    pub fn dump(&self, ctx: &DumpContext<'_>) -> String {
        let mut out = String::new();
        GraphPrinter {
            graph: self,
            ctx: *ctx,
            suffix: String::new(),
        }
        .write(0, &mut out);
        out
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Item {
    Block(BlockId),
    Region(RegionId),
}

struct GraphPrinter<'g> {
    graph: &'g ControlFlowGraph,
    ctx: DumpContext<'g>,
    /// Appended to block and region names of nested graphs.
    suffix: String,
}

impl GraphPrinter<'_> {
    fn write(&self, indent: usize, out: &mut String) {
        self.write_contents(RegionId::ROOT, indent, out);
    }

    fn line(indent: usize, text: &str, out: &mut String) {
        for _ in 0..indent {
            out.push(' ');
        }
        out.push_str(text);
        out.push('\n');
    }

    fn block_name(&self, block: BlockId) -> String {
        format!("B{}{}", block.raw(), self.suffix)
    }

    fn region_name(&self, region: RegionId) -> String {
        format!("R{}{}", region.raw(), self.suffix)
    }

    /// A region's own blocks and child regions in block order, then the
    /// local functions it declares.
    fn write_contents(&self, region: RegionId, indent: usize, out: &mut String) {
        let data = self.graph.region(region);
        let mut items: Vec<(BlockId, Item)> = self
            .graph
            .blocks
            .iter()
            .filter(|b| b.region == region)
            .map(|b| (b.ordinal, Item::Block(b.ordinal)))
            .collect();
        items.extend(
            data.nested
                .iter()
                .map(|&r| (self.graph.region(r).first_block, Item::Region(r))),
        );
        items.sort_by_key(|&(first, item)| (first, matches!(item, Item::Block(_))));

        let mut previous: Option<Item> = None;
        for (_, item) in items {
            match item {
                Item::Block(block) => {
                    if matches!(previous, Some(Item::Region(_))) {
                        out.push('\n');
                    }
                    self.write_block(self.graph.block(block), indent, out);
                }
                Item::Region(child) => {
                    if matches!(previous, Some(Item::Block(_))) {
                        out.push('\n');
                    }
                    self.write_region(child, indent, out);
                }
            }
            previous = Some(item);
        }

        for (position, &(method, index)) in data.local_functions.iter().enumerate() {
            let Some(nested) = self.graph.nested.get(index as usize) else {
                continue;
            };
            let signature = self
                .ctx
                .symbols
                .display_method(method, self.ctx.types, self.ctx.interner)
                .to_string();
            out.push('\n');
            Self::line(indent, &format!("{{   {signature}"), out);
            out.push('\n');
            let printer = GraphPrinter {
                graph: &nested.graph,
                ctx: self.ctx,
                suffix: format!("{}#{}{}", self.suffix, position, self.region_name(region)),
            };
            printer.write(indent + 4, out);
            Self::line(indent, "}", out);
        }
    }

    fn write_region(&self, region: RegionId, indent: usize, out: &mut String) {
        let data = self.graph.region(region);
        match data.kind {
            RegionKind::TryAndCatch | RegionKind::TryAndFinally => {
                let protected = data
                    .nested
                    .iter()
                    .copied()
                    .find(|&r| self.graph.region(r).kind == RegionKind::Try);
                let Some(protected) = protected else {
                    return;
                };
                let header = format!(
                    ".try {{{}, {}}}",
                    self.region_name(region),
                    self.region_name(protected)
                );
                self.write_braced(protected, &header, indent, out);
                for &handler in &data.nested {
                    if handler != protected {
                        self.write_region(handler, indent, out);
                    }
                }
            }
            RegionKind::Catch => {
                let ty = data.exception_type.map_or_else(String::new, |ty| {
                    format!(" ({})", self.ctx.types.display(ty, self.ctx.interner))
                });
                let header = format!(".catch {{{}}}{ty}", self.region_name(region));
                self.write_braced(region, &header, indent, out);
            }
            RegionKind::Finally => {
                let header = format!(".finally {{{}}}", self.region_name(region));
                self.write_braced(region, &header, indent, out);
            }
            RegionKind::Try => {
                let header = format!(".try {{{}}}", self.region_name(region));
                self.write_braced(region, &header, indent, out);
            }
            RegionKind::Locals | RegionKind::Root => {
                let header = format!(".locals {{{}}}", self.region_name(region));
                self.write_braced(region, &header, indent, out);
            }
        }
    }

    fn write_braced(&self, region: RegionId, header: &str, indent: usize, out: &mut String) {
        Self::line(indent, header, out);
        Self::line(indent, "{", out);
        self.write_region_header(region, indent + 4, out);
        self.write_contents(region, indent + 4, out);
        Self::line(indent, "}", out);
    }

    fn write_region_header(&self, region: RegionId, indent: usize, out: &mut String) {
        let data = self.graph.region(region);
        if !data.locals.is_empty() {
            let mut text = String::from("Locals:");
            for &local in &data.locals {
                let symbol = self.ctx.symbols.local(local);
                let _ = write!(
                    text,
                    " [{} {}]",
                    self.ctx.types.display(symbol.ty, self.ctx.interner),
                    self.ctx.interner.lookup(symbol.name)
                );
            }
            Self::line(indent, &text, out);
        }
        if !data.local_functions.is_empty() {
            let mut text = String::from("Methods:");
            for &(method, _) in &data.local_functions {
                let _ = write!(
                    text,
                    " [{}]",
                    self.ctx
                        .symbols
                        .display_method(method, self.ctx.types, self.ctx.interner)
                );
            }
            Self::line(indent, &text, out);
        }
        if !data.captures.is_empty() {
            let mut text = String::from("CaptureIds:");
            for id in &data.captures {
                let _ = write!(text, " [{id}]");
            }
            Self::line(indent, &text, out);
        }
    }

    fn write_block(&self, block: &BasicBlock, indent: usize, out: &mut String) {
        let unreachable = if block.is_reachable { "" } else { " [UnReachable]" };
        Self::line(
            indent,
            &format!(
                "Block[{}] - {}{unreachable}",
                self.block_name(block.ordinal),
                block.kind.name()
            ),
            out,
        );
        if block.kind != BlockKind::Entry {
            if block.predecessors.is_empty() {
                Self::line(indent + 4, "Predecessors (0)", out);
            } else {
                let mut text = String::from("Predecessors:");
                for &pred in &block.predecessors {
                    let _ = write!(text, " [{}]", self.block_name(pred));
                }
                Self::line(indent + 4, &text, out);
            }
        }

        Self::line(
            indent + 4,
            &format!("Statements ({})", block.statements.len()),
            out,
        );
        for &stmt in &block.statements {
            self.write_op(stmt, indent + 8, out);
            out.push('\n');
        }

        if let Some(conditional) = &block.conditional {
            let sense = if conditional.kind.jumps_on() { "True" } else { "False" };
            let dest = self.destination(&conditional.branch);
            Self::line(
                indent + 4,
                &format!(
                    "Jump if {sense} ({}) to {dest}",
                    conditional.branch.semantics.name()
                ),
                out,
            );
            self.write_op(conditional.value, indent + 8, out);
            self.write_crossing(&conditional.branch, indent + 8, out);
            out.push('\n');
        }
        if let Some(branch) = &block.fall_through {
            Self::line(
                indent + 4,
                &format!(
                    "Next ({}) {}",
                    branch.semantics.name(),
                    self.destination(branch)
                ),
                out,
            );
            if branch.value.is_valid() {
                self.write_op(branch.value, indent + 8, out);
            }
            self.write_crossing(branch, indent + 8, out);
        }
    }

    fn destination(&self, branch: &Branch) -> String {
        match branch.destination {
            Some(dest) => format!("Block[{}]", self.block_name(dest)),
            None => "Block[null]".to_owned(),
        }
    }

    fn write_crossing(&self, branch: &Branch, indent: usize, out: &mut String) {
        let lists = [
            ("Finalizing", &branch.finalizing[..]),
            ("Leaving", &branch.leaving[..]),
            ("Entering", &branch.entering[..]),
        ];
        for (label, regions) in lists {
            if regions.is_empty() {
                continue;
            }
            let mut text = format!("{label}:");
            for &region in regions {
                let _ = write!(text, " {{{}}}", self.region_name(region));
            }
            Self::line(indent, &text, out);
        }
    }

    /// An operation tree, with lambda graphs rendered in place.
    fn write_op(&self, op: opal_ir::OpId, indent: usize, out: &mut String) {
        let render = |graph: u32, at: usize, out: &mut String| self.write_lambda(graph, at, out);
        let mut print = PrintContext::new(
            &self.graph.ops,
            self.ctx.types,
            self.ctx.symbols,
            self.ctx.interner,
        )
        .with_nested_graphs(&render);
        if let Some(source) = self.ctx.source {
            print = print.with_source(source);
        }
        write_tree(&print, op, indent, out);
    }

    fn write_lambda(&self, index: u32, indent: usize, out: &mut String) {
        let index = index as usize;
        let Some(nested) = self.graph.nested.get(index) else {
            return;
        };
        let ordinal = self.graph.nested[..index]
            .iter()
            .filter(|n| n.kind == NestedKind::Lambda)
            .count();
        Self::line(indent, "{", out);
        let printer = GraphPrinter {
            graph: &nested.graph,
            ctx: self.ctx,
            suffix: format!("{}#A{ordinal}", self.suffix),
        };
        printer.write(indent + 4, out);
        Self::line(indent, "}", out);
    }
}

//! Operation tree → flow graph lowering.
//!
//! A single forward walk over the body's statements. [`Lowerer`] owns a
//! [`FlowBuilder`] and calls into it as it goes:
//!
//! - statements (this file) place blocks and open locals regions
//! - expressions (`expr.rs`) copy flow-free subtrees whole and split blocks
//!   at `??`, `?.`, `?:`, `&&` and `||`, spilling pending operands into
//!   captures
//! - conditions, loops and jumps (`control_flow.rs`)
//! - exception regions (`exceptions.rs`)
//!
//! Labels are collected by a pre-pass (`labels.rs`) so that forward
//! `goto`s can be checked for scope before their target is reached.

mod control_flow;
mod exceptions;
mod expr;
mod labels;
mod remap;

use rustc_hash::FxHashMap;

use opal_diagnostic::Diagnostic;
use opal_ir::operation::LocalRange;
use opal_ir::{CaptureId, LocalId, MethodId, OpArena, OpId, OpKind, OpNode, OpRange};

use crate::builder::{BlockRef, FlowBuilder, RegionRef};
use crate::graph::{to_u32, ControlFlowGraph, NestedGraph, NestedKind, RegionKind};
use crate::{FlowContext, FlowError, FlowOptions};

use self::labels::LabelTable;

/// Build the graph of the body rooted at `root`.
pub(crate) fn lower_body(
    ctx: &FlowContext<'_>,
    ops: &OpArena,
    root: OpId,
    options: &FlowOptions,
) -> Result<ControlFlowGraph, FlowError> {
    let mut lowerer = Lowerer::new(*ctx, ops, root, options);
    lowerer.report_duplicate_labels();
    lowerer.lower_stmt(root)?;
    lowerer.finish()
}

/// Where `break` and `continue` go inside one loop.
#[derive(Copy, Clone, Debug)]
struct LoopTarget {
    break_to: BlockRef,
    continue_to: BlockRef,
    /// Finally handlers open around the loop.
    finally_depth: usize,
}

pub(crate) struct Lowerer<'a> {
    ctx: FlowContext<'a>,
    options: &'a FlowOptions,
    input: &'a OpArena,
    builder: FlowBuilder,
    labels: LabelTable,
    /// Block of each label, keyed by its `Labeled` operation.
    label_blocks: FxHashMap<OpId, BlockRef>,
    loops: Vec<LoopTarget>,
    /// Finally handlers currently being lowered.
    finally_depth: usize,
    /// Rewritten operands still waiting for their parent to be rebuilt.
    eval_stack: Vec<OpId>,
    /// Capture region of each expression being lowered, opened on demand.
    frames: Vec<Option<RegionRef>>,
    /// Whether an input subtree contains `??`, `?.`, `?:`, `&&` or `||`.
    flow_memo: FxHashMap<OpId, bool>,
    /// Tested receiver of each conditional access being lowered, innermost
    /// last, with the value it was captured from.
    access_instances: Vec<(CaptureId, OpId)>,
    nested: Vec<NestedGraph>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lowerer<'a> {
    fn new(ctx: FlowContext<'a>, input: &'a OpArena, root: OpId, options: &'a FlowOptions) -> Self {
        Lowerer {
            ctx,
            options,
            input,
            builder: FlowBuilder::new(),
            labels: LabelTable::collect(input, root),
            label_blocks: FxHashMap::default(),
            loops: Vec::new(),
            finally_depth: 0,
            eval_stack: Vec::new(),
            frames: Vec::new(),
            flow_memo: FxHashMap::default(),
            access_instances: Vec::new(),
            nested: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn finish(self) -> Result<ControlFlowGraph, FlowError> {
        self.builder.finish(self.nested, self.diagnostics)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn report_duplicate_labels(&mut self) {
        let input = self.input;
        for &labeled in self.labels.duplicates() {
            if let OpKind::Labeled { label, .. } = input.kind(labeled) {
                let name = self.ctx.interner.lookup(label);
                tracing::warn!(label = name, "duplicate label");
                self.diagnostics
                    .push(opal_diagnostic::duplicate_label(input.span(labeled), name));
            }
        }
    }

    /// Push a copy of input node `like` with a new kind.
    fn push_like(&mut self, like: OpId, kind: OpKind) -> OpId {
        let node = self.input.get(like);
        self.builder.ops.push(OpNode { kind, ..node })
    }

    // ── Statements ──────────────────────────────────────────────────

    fn lower_stmt(&mut self, id: OpId) -> Result<(), FlowError> {
        match self.input.kind(id) {
            OpKind::Block { ops, locals } => self.lower_block(ops, locals),
            OpKind::ExpressionStatement { expr } => {
                self.begin_expression();
                if let OpKind::ConditionalAccess {
                    operation,
                    when_not_null,
                } = self.input.kind(expr)
                {
                    self.lower_conditional_access_stmt(id, operation, when_not_null)?;
                    return self.end_expression();
                }
                let value = self.lower_value(expr)?;
                let stmt = self.push_like(id, OpKind::ExpressionStatement { expr: value });
                self.builder.add_statement(stmt);
                self.end_expression()
            }
            OpKind::VariableDeclaration { local, initializer } => {
                self.lower_declaration(id, local, initializer)
            }
            OpKind::Conditional {
                cond,
                when_true,
                when_false,
            } if self.input.ty(id).is_none() => self.lower_if(cond, when_true, when_false),
            OpKind::WhileLoop {
                cond,
                body,
                test_at_top,
            } => {
                if test_at_top {
                    self.lower_while(cond, body)
                } else {
                    self.lower_do_while(body, cond)
                }
            }
            OpKind::Labeled { body, .. } => self.lower_labeled(id, body),
            OpKind::Branch { kind, label } => {
                self.lower_branch(id, kind, label);
                Ok(())
            }
            OpKind::Return { value } => self.lower_return(id, value),
            OpKind::Throw { value } => self.lower_throw(value),
            OpKind::Try {
                body,
                catches,
                finally,
            } => self.lower_try(body, catches, finally),
            OpKind::LocalFunction { method, body } => {
                let index = self.build_nested(method, body, NestedKind::LocalFunction)?;
                self.builder.declare_local_function(method, index);
                Ok(())
            }
            OpKind::Empty => Ok(()),
            _ => {
                // An expression in statement position, typically an error node.
                self.begin_expression();
                let value = self.lower_value(id)?;
                self.builder.add_statement(value);
                self.end_expression()
            }
        }
    }

    fn lower_block(&mut self, stmts: OpRange, locals: LocalRange) -> Result<(), FlowError> {
        let input = self.input;
        let stmts = input.list(stmts);
        let locals: &[LocalId] = input.locals(locals);
        let declares_functions = stmts
            .iter()
            .any(|&s| matches!(input.kind(s), OpKind::LocalFunction { .. }));

        let region = if locals.is_empty() && !declares_functions {
            None
        } else {
            let region = self.builder.enter_region(RegionKind::Locals);
            for &local in locals {
                self.builder.declare_local(region, local);
            }
            Some(region)
        };
        for &stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        if let Some(region) = region {
            self.builder.leave_region(region)?;
        }
        Ok(())
    }

    /// `T x = init;` becomes an implicit assignment to the declared local.
    fn lower_declaration(
        &mut self,
        id: OpId,
        local: LocalId,
        initializer: OpId,
    ) -> Result<(), FlowError> {
        if !initializer.is_valid() {
            return Ok(());
        }
        let span = self.input.span(id);
        let ty = self.ctx.symbols.local(local).ty;

        self.begin_expression();
        let target = self.builder.ops.push(
            OpNode::new(
                OpKind::LocalReference {
                    local,
                    is_declaration: true,
                },
                Some(ty),
                span,
            )
            .implicit(),
        );
        self.eval_stack.push(target);
        let value = self.lower_value(initializer)?;
        let target = self.pop_operand()?;

        let invalid = self.input.is_invalid(id) || self.builder.ops.is_invalid(value);
        let assign = self.builder.ops.push(
            OpNode::new(OpKind::SimpleAssignment { target, value }, Some(ty), span)
                .implicit()
                .invalid_if(invalid),
        );
        self.builder.add_statement(assign);
        self.end_expression()
    }

    /// Build a lambda or local function body as its own graph.
    fn build_nested(
        &mut self,
        method: MethodId,
        body: OpId,
        kind: NestedKind,
    ) -> Result<u32, FlowError> {
        tracing::trace!(method = method.raw(), ?kind, "building nested graph");
        let graph = crate::build_graph(&self.ctx, self.input, body, self.options)?;
        let index = to_u32(self.nested.len(), "nested graphs");
        self.nested.push(NestedGraph {
            method,
            kind,
            graph,
        });
        Ok(index)
    }
}

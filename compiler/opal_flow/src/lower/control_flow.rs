//! Conditions, loops and jumps.

use opal_ir::{BinaryOp, BranchKind, Name, OpFlags, OpId, OpKind, OpNode, UnaryOp};

use crate::builder::{BlockRef, Exit};
use crate::graph::ConditionKind;
use crate::FlowError;

use super::{LoopTarget, Lowerer};

impl Lowerer<'_> {
    /// Evaluate `cond` and jump to `dest` when it is `jump_if`; otherwise
    /// fall through. `!` flips the sense and `&&`/`||` jump per operand.
    /// Constant conditions are kept whole so reachability can see them.
    pub(super) fn lower_condition(
        &mut self,
        cond: OpId,
        jump_if: bool,
        dest: BlockRef,
    ) -> Result<(), FlowError> {
        let input = self.input;
        if input.constant(cond).is_none() {
            match input.kind(cond) {
                OpKind::Unary {
                    op: UnaryOp::Not,
                    operand,
                } => return self.lower_condition(operand, !jump_if, dest),
                OpKind::Binary { op, left, right } if op.is_short_circuit() => {
                    let is_and = op == BinaryOp::ConditionalAnd;
                    if is_and != jump_if {
                        // Either operand alone decides.
                        self.lower_condition(left, jump_if, dest)?;
                        return self.lower_condition(right, jump_if, dest);
                    }
                    let skip = self.builder.reserve();
                    self.lower_condition(left, !jump_if, skip)?;
                    self.lower_condition(right, jump_if, dest)?;
                    self.builder.place(skip);
                    return Ok(());
                }
                _ => {}
            }
        }
        let value = self.lower_value(cond)?;
        let kind = if jump_if {
            ConditionKind::JumpIfTrue
        } else {
            ConditionKind::JumpIfFalse
        };
        self.builder.branch_if(kind, value, dest);
        Ok(())
    }

    /// A condition evaluated in its own expression frame.
    fn lower_test(&mut self, cond: OpId, jump_if: bool, dest: BlockRef) -> Result<(), FlowError> {
        self.begin_expression();
        self.lower_condition(cond, jump_if, dest)?;
        self.end_expression()
    }

    pub(super) fn lower_if(
        &mut self,
        cond: OpId,
        when_true: OpId,
        when_false: OpId,
    ) -> Result<(), FlowError> {
        let after = self.builder.reserve();
        let else_block = if when_false.is_valid() {
            self.builder.reserve()
        } else {
            after
        };
        self.lower_test(cond, false, else_block)?;
        self.lower_stmt(when_true)?;
        if when_false.is_valid() {
            if self.builder.is_open() {
                self.builder.jump(after);
            }
            self.builder.place(else_block);
            self.lower_stmt(when_false)?;
        }
        self.builder.place(after);
        Ok(())
    }

    pub(super) fn lower_while(&mut self, cond: OpId, body: OpId) -> Result<(), FlowError> {
        let header = self.builder.reserve();
        let exit = self.builder.reserve();
        self.builder.place(header);
        self.lower_test(cond, false, exit)?;
        self.lower_loop_body(body, exit, header)?;
        if self.builder.is_open() {
            self.builder.jump(header);
        }
        self.builder.place(exit);
        Ok(())
    }

    pub(super) fn lower_do_while(&mut self, body: OpId, cond: OpId) -> Result<(), FlowError> {
        let start = self.builder.reserve();
        let test = self.builder.reserve();
        let exit = self.builder.reserve();
        self.builder.place(start);
        self.lower_loop_body(body, exit, test)?;
        self.builder.place(test);
        self.lower_test(cond, true, start)?;
        self.builder.place(exit);
        Ok(())
    }

    fn lower_loop_body(
        &mut self,
        body: OpId,
        break_to: BlockRef,
        continue_to: BlockRef,
    ) -> Result<(), FlowError> {
        self.loops.push(LoopTarget {
            break_to,
            continue_to,
            finally_depth: self.finally_depth,
        });
        let result = self.lower_stmt(body);
        self.loops.pop();
        result
    }

    // ── Labels and jumps ────────────────────────────────────────────

    fn label_block(&mut self, labeled: OpId) -> BlockRef {
        *self
            .label_blocks
            .entry(labeled)
            .or_insert_with(|| self.builder.reserve())
    }

    pub(super) fn lower_labeled(&mut self, id: OpId, body: OpId) -> Result<(), FlowError> {
        let block = self.label_block(id);
        self.builder.place_target(block);
        if body.is_valid() {
            self.lower_stmt(body)?;
        }
        Ok(())
    }

    pub(super) fn lower_branch(&mut self, id: OpId, kind: BranchKind, label: Option<Name>) {
        let span = self.input.span(id);
        match kind {
            BranchKind::GoTo => {
                let target = label.and_then(|label| self.labels.resolve(id, label));
                let Some(target) = target else {
                    let interner = self.ctx.interner;
                    let name = label.map_or("", |label| interner.lookup(label));
                    tracing::warn!(label = name, "goto target is not in scope");
                    self.report(opal_diagnostic::undeclared_label(span, name));
                    self.invalid_branch(id);
                    return;
                };
                if self.finally_depth > self.labels.finally_depth(target) {
                    self.leaves_finally(id);
                    return;
                }
                let block = self.label_block(target);
                self.builder.jump(block);
            }
            BranchKind::Break | BranchKind::Continue => {
                let Some(target) = self.loops.last().copied() else {
                    tracing::warn!(?kind, "jump outside of a loop");
                    self.report(opal_diagnostic::break_outside_loop(span));
                    self.invalid_branch(id);
                    return;
                };
                if self.finally_depth > target.finally_depth {
                    self.leaves_finally(id);
                    return;
                }
                let dest = if kind == BranchKind::Break {
                    target.break_to
                } else {
                    target.continue_to
                };
                self.builder.jump(dest);
            }
        }
    }

    fn leaves_finally(&mut self, id: OpId) {
        tracing::warn!("jump out of a finally handler");
        self.report(opal_diagnostic::leave_finally(self.input.span(id)));
        self.invalid_branch(id);
    }

    /// Keep a jump that cannot be taken as an invalid statement. Control
    /// falls through to whatever follows it.
    fn invalid_branch(&mut self, id: OpId) {
        let node = self.input.get(id);
        let branch = self.builder.ops.push(OpNode {
            flags: node.flags | OpFlags::INVALID,
            ..node
        });
        let children = self.builder.ops.push_list(&[branch]);
        let invalid = self.builder.ops.push(
            OpNode::new(OpKind::Invalid { children }, None, node.span).invalid_if(true),
        );
        self.builder.add_statement(invalid);
    }

    pub(super) fn lower_return(&mut self, id: OpId, value: OpId) -> Result<(), FlowError> {
        self.begin_expression();
        let value = if value.is_valid() {
            self.lower_value(value)?
        } else {
            OpId::INVALID
        };
        if self.finally_depth > 0 {
            let span = self.input.span(id);
            tracing::warn!("return inside a finally handler");
            self.report(opal_diagnostic::leave_finally(span));
            let operands: &[OpId] = if value.is_valid() { &[value] } else { &[] };
            let children = self.builder.ops.push_list(operands);
            let invalid = self.builder.ops.push(
                OpNode::new(OpKind::Invalid { children }, None, span).invalid_if(true),
            );
            self.builder.add_statement(invalid);
        } else {
            self.builder.terminate(Exit::Return(value));
        }
        self.end_expression()
    }

    pub(super) fn lower_throw(&mut self, value: OpId) -> Result<(), FlowError> {
        if !value.is_valid() {
            self.builder.terminate(Exit::Rethrow);
            return Ok(());
        }
        self.begin_expression();
        let value = self.lower_value(value)?;
        self.builder.terminate(Exit::Throw(value));
        self.end_expression()
    }
}

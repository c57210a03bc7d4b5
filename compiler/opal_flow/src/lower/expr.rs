//! Expression lowering.
//!
//! Subtrees without `??`, `?.`, `?:`, `&&` or `||` are copied whole. Anything
//! else is rebuilt bottom-up: each rewritten operand waits on the
//! evaluation stack until its parent is rebuilt. When a flow construct
//! splits the current block, every operand still waiting is *spilled*
//! first, captured in the block it was evaluated in, so that evaluation
//! order survives the split.

use smallvec::SmallVec;

use opal_ir::{
    BinaryOp, CaptureId, ConstantValue, Conversion, ConversionKind, OpFlags, OpId, OpKind, OpNode,
    OpRange, TypeId,
};

use crate::builder::BlockRef;
use crate::graph::{ConditionKind, NestedKind, RegionKind};
use crate::FlowError;

use super::remap::remap_kind;
use super::Lowerer;

impl Lowerer<'_> {
    // ── Expression frames ───────────────────────────────────────────

    pub(super) fn begin_expression(&mut self) {
        self.frames.push(None);
    }

    /// Close the capture region the expression opened, if it needed one.
    pub(super) fn end_expression(&mut self) -> Result<(), FlowError> {
        debug_assert!(self.eval_stack.is_empty(), "operands left on the evaluation stack");
        if let Some(Some(region)) = self.frames.pop() {
            self.builder.leave_region(region)?;
        }
        Ok(())
    }

    /// Open the current expression's capture region on first use.
    fn ensure_frame_region(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.is_none() {
                *frame = Some(self.builder.enter_region(RegionKind::Locals));
            }
        }
    }

    pub(super) fn pop_operand(&mut self) -> Result<OpId, FlowError> {
        self.eval_stack
            .pop()
            .ok_or_else(|| FlowError::Malformed("evaluation stack underflow".to_owned()))
    }

    // ── Values ──────────────────────────────────────────────────────

    fn has_flow(&mut self, op: OpId) -> bool {
        if let Some(&known) = self.flow_memo.get(&op) {
            return known;
        }
        let input = self.input;
        let result = match input.kind(op) {
            OpKind::Coalesce { .. }
            | OpKind::Conditional { .. }
            | OpKind::ConditionalAccess { .. } => true,
            OpKind::Binary { op: bin, .. } if bin.is_short_circuit() => true,
            // Lambda bodies get their own graph.
            OpKind::AnonymousFunction { .. } | OpKind::LocalFunction { .. } => false,
            _ => input.children(op).into_iter().any(|child| self.has_flow(child)),
        };
        self.flow_memo.insert(op, result);
        result
    }

    /// Lower an expression, returning its value in the output arena.
    pub(super) fn lower_value(&mut self, op: OpId) -> Result<OpId, FlowError> {
        if !self.has_flow(op) {
            return self.copy_tree(op);
        }
        match self.input.kind(op) {
            OpKind::Coalesce {
                value,
                when_null,
                value_conversion,
            } => self.lower_coalesce(op, value, when_null, value_conversion),
            OpKind::ConditionalAccess {
                operation,
                when_not_null,
            } => self.lower_conditional_access(op, operation, when_not_null),
            OpKind::Conditional {
                cond,
                when_true,
                when_false,
            } => self.lower_conditional(op, cond, when_true, when_false),
            OpKind::Binary { op: bin, left, right } if bin.is_short_circuit() => {
                self.lower_logical(op, bin, left, right)
            }
            _ => self.lower_children(op),
        }
    }

    fn lower_children(&mut self, op: OpId) -> Result<OpId, FlowError> {
        let base = self.eval_stack.len();
        for child in self.input.children(op) {
            let value = self.lower_value(child)?;
            self.eval_stack.push(value);
        }
        let children: SmallVec<[OpId; 8]> = self.eval_stack.drain(base..).collect();
        Ok(self.rebuild(op, &children))
    }

    /// Copy input node `op` with new children; type, constant, flags and
    /// span carry over.
    fn rebuild(&mut self, op: OpId, children: &[OpId]) -> OpId {
        let node = self.input.get(op);
        let kind = remap_kind(self.input, &mut self.builder.ops, node.kind, children);
        self.builder.ops.push(OpNode { kind, ..node })
    }

    /// Copy a flow-free subtree. Lambdas found on the way are built as
    /// nested graphs.
    fn copy_tree(&mut self, op: OpId) -> Result<OpId, FlowError> {
        if let OpKind::AnonymousFunction { method, body } = self.input.kind(op) {
            let graph = self.build_nested(method, body, NestedKind::Lambda)?;
            return Ok(self.push_like(op, OpKind::FlowAnonymousFunction { method, graph }));
        }
        if let OpKind::ConditionalAccessInstance = self.input.kind(op) {
            return self.access_instance(op);
        }
        let children = self
            .input
            .children(op)
            .into_iter()
            .map(|child| self.copy_tree(child))
            .collect::<Result<SmallVec<[OpId; 8]>, _>>()?;
        Ok(self.rebuild(op, &children))
    }

    // ── Captures ────────────────────────────────────────────────────

    /// Capture every operand still waiting on the evaluation stack.
    fn spill(&mut self) {
        self.ensure_frame_region();
        for i in 0..self.eval_stack.len() {
            let value = self.eval_stack[i];
            self.eval_stack[i] = self.spill_value(value);
        }
    }

    fn spill_value(&mut self, value: OpId) -> OpId {
        let node = self.builder.ops.get(value);
        match node.kind {
            OpKind::FlowCaptureReference { .. } | OpKind::CollectionElementsPlaceholder => value,
            OpKind::Literal if node.constant.is_some() => value,
            OpKind::LocalReference {
                is_declaration: true,
                ..
            } => value,
            // An argument is not a value of its own; capture what it passes.
            OpKind::Argument {
                kind,
                param,
                value: inner,
                in_conversion,
                out_conversion,
            } => {
                let spilled = self.spill_value(inner);
                if spilled == inner {
                    return value;
                }
                self.builder.ops.push(OpNode {
                    kind: OpKind::Argument {
                        kind,
                        param,
                        value: spilled,
                        in_conversion,
                        out_conversion,
                    },
                    ..node
                })
            }
            OpKind::ArrayInitializer { elements } => {
                let old: SmallVec<[OpId; 8]> =
                    self.builder.ops.list(elements).iter().copied().collect();
                let new: SmallVec<[OpId; 8]> =
                    old.iter().map(|&element| self.spill_value(element)).collect();
                if new == old {
                    return value;
                }
                let elements = self.builder.ops.push_list(&new);
                self.builder.ops.push(OpNode {
                    kind: OpKind::ArrayInitializer { elements },
                    ..node
                })
            }
            _ => self.capture_value(value),
        }
    }

    /// Capture `value` in the current region and return a reference to it.
    fn capture_value(&mut self, value: OpId) -> OpId {
        let id = self.builder.new_capture(self.builder.current_region());
        self.emit_capture(id, value);
        self.capture_ref(id, value)
    }

    /// Append `capture id = value` to the current block.
    fn emit_capture(&mut self, id: CaptureId, value: OpId) {
        let node = self.builder.ops.get(value);
        let capture = self.builder.ops.push(
            OpNode::new(OpKind::FlowCapture { id, value }, None, node.span)
                .implicit()
                .invalid_if(node.flags.contains(OpFlags::INVALID)),
        );
        self.builder.add_statement(capture);
    }

    /// A reference to capture `id` typed and placed like output node `like`.
    fn capture_ref(&mut self, id: CaptureId, like: OpId) -> OpId {
        let node = self.builder.ops.get(like);
        self.builder.ops.push(
            OpNode::new(OpKind::FlowCaptureReference { id }, node.ty, node.span)
                .implicit()
                .invalid_if(node.flags.contains(OpFlags::INVALID)),
        )
    }

    /// A reference to the capture holding the result of input node `op`.
    fn result_ref(&mut self, id: CaptureId, op: OpId) -> OpId {
        let node = self.input.get(op);
        self.builder.ops.push(
            OpNode::new(OpKind::FlowCaptureReference { id }, node.ty, node.span)
                .implicit()
                .invalid_if(node.flags.contains(OpFlags::INVALID)),
        )
    }

    // ── Flow constructs ─────────────────────────────────────────────

    /// `value ?? when_null`.
    fn lower_coalesce(
        &mut self,
        op: OpId,
        value: OpId,
        when_null: OpId,
        conversion: Conversion,
    ) -> Result<OpId, FlowError> {
        self.spill();
        let result_region = self.builder.current_region();
        let operand_region = self.builder.enter_region(RegionKind::Locals);

        let operand = self.lower_value(value)?;
        let tested = self.builder.new_capture(operand_region);
        self.emit_capture(tested, operand);

        let when_null_block = self.builder.reserve();
        let after = self.builder.reserve();

        let checked = self.capture_ref(tested, operand);
        let node = self.builder.ops.get(checked);
        let is_null = self.builder.ops.push(
            OpNode::new(OpKind::IsNull { operand: checked }, Some(TypeId::BOOL), node.span)
                .implicit()
                .invalid_if(node.flags.contains(OpFlags::INVALID)),
        );
        self.builder
            .branch_if(ConditionKind::JumpIfTrue, is_null, when_null_block);

        let carried = self.capture_ref(tested, operand);
        let carried = self.unwrap_operand(carried, self.input.ty(op), conversion);
        let result = self.builder.new_capture(result_region);
        self.emit_capture(result, carried);
        self.builder.jump(after);
        self.builder.leave_region(operand_region)?;

        self.builder.place(when_null_block);
        let fallback = self.lower_value(when_null)?;
        self.emit_capture(result, fallback);
        self.builder.place(after);
        Ok(self.result_ref(result, op))
    }

    /// The non-null operand of `??` as a value of the result type: the
    /// underlying value of a nullable, else the operand converted.
    fn unwrap_operand(
        &mut self,
        operand: OpId,
        result_ty: Option<TypeId>,
        conversion: Conversion,
    ) -> OpId {
        let node = self.builder.ops.get(operand);
        let underlying = node.ty.and_then(|ty| self.ctx.types.nullable_underlying(ty));
        if underlying.is_some() && underlying == result_ty {
            let method = self.ctx.symbols.get_value_or_default();
            return self.builder.ops.push(
                OpNode::new(
                    OpKind::Invocation {
                        method,
                        instance: operand,
                        args: OpRange::EMPTY,
                    },
                    result_ty,
                    node.span,
                )
                .implicit(),
            );
        }
        if conversion.is_identity() {
            return operand;
        }
        self.builder.ops.push(
            OpNode::new(
                OpKind::Conversion {
                    operand,
                    conversion,
                },
                result_ty,
                node.span,
            )
            .implicit(),
        )
    }

    /// `operation?.when_not_null` as a value: the access, or `default` of
    /// the result type when the receiver is null.
    fn lower_conditional_access(
        &mut self,
        op: OpId,
        operation: OpId,
        when_not_null: OpId,
    ) -> Result<OpId, FlowError> {
        self.spill();
        let result = self.builder.new_capture(self.builder.current_region());
        let when_null = self.builder.reserve();
        let after = self.builder.reserve();

        let access = AccessChain {
            result: AccessResult::Capture(result, self.input.ty(op)),
            when_null,
            after,
        };
        self.lower_access_chain(operation, when_not_null, access, true)?;

        self.builder.place(when_null);
        let default = self.builder.ops.push(
            OpNode::new(OpKind::DefaultValue, self.input.ty(op), self.input.span(op)).implicit(),
        );
        self.emit_capture(result, default);
        self.builder.place(after);
        Ok(self.result_ref(result, op))
    }

    /// `operation?.when_not_null;` as a statement. A null receiver skips it.
    pub(super) fn lower_conditional_access_stmt(
        &mut self,
        stmt: OpId,
        operation: OpId,
        when_not_null: OpId,
    ) -> Result<(), FlowError> {
        self.ensure_frame_region();
        let after = self.builder.reserve();
        let access = AccessChain {
            result: AccessResult::Statement(stmt),
            when_null: after,
            after,
        };
        self.lower_access_chain(operation, when_not_null, access, false)?;
        self.builder.place(after);
        Ok(())
    }

    /// Test `operation` for null, then evaluate `when_not_null` with the
    /// tested value as its receiver. Links of `a?.b?.c` share the exits.
    fn lower_access_chain(
        &mut self,
        operation: OpId,
        when_not_null: OpId,
        access: AccessChain,
        own_region: bool,
    ) -> Result<(), FlowError> {
        let region = own_region.then(|| self.builder.enter_region(RegionKind::Locals));

        let receiver = self.lower_value(operation)?;
        let tested = self.builder.new_capture(self.builder.current_region());
        self.emit_capture(tested, receiver);
        let checked = self.capture_ref(tested, receiver);
        let node = self.builder.ops.get(checked);
        let is_null = self.builder.ops.push(
            OpNode::new(OpKind::IsNull { operand: checked }, Some(TypeId::BOOL), node.span)
                .implicit()
                .invalid_if(node.flags.contains(OpFlags::INVALID)),
        );
        self.builder
            .branch_if(ConditionKind::JumpIfTrue, is_null, access.when_null);

        self.access_instances.push((tested, receiver));
        if let OpKind::ConditionalAccess {
            operation: next,
            when_not_null: rest,
        } = self.input.kind(when_not_null)
        {
            self.lower_access_chain(next, rest, access, true)?;
        } else {
            let value = self.lower_value(when_not_null)?;
            match access.result {
                AccessResult::Capture(result, ty) => {
                    let value = self.lift_to_nullable(value, ty);
                    self.emit_capture(result, value);
                }
                AccessResult::Statement(stmt) => {
                    let stmt = self.push_like(stmt, OpKind::ExpressionStatement { expr: value });
                    self.builder.add_statement(stmt);
                }
            }
            self.builder.jump(access.after);
        }
        self.access_instances.pop();

        if let Some(region) = region {
            self.builder.leave_region(region)?;
        }
        Ok(())
    }

    /// The receiver a conditional access is currently testing.
    fn access_instance(&mut self, op: OpId) -> Result<OpId, FlowError> {
        let &(tested, receiver) = self.access_instances.last().ok_or_else(|| {
            FlowError::Malformed("conditional access receiver outside an access".to_owned())
        })?;
        let reference = self.capture_ref(tested, receiver);
        Ok(self.unwrap_operand(reference, self.input.ty(op), Conversion::IDENTITY))
    }

    /// `value` as `ty` when `ty` is the nullable form of its type.
    fn lift_to_nullable(&mut self, value: OpId, ty: Option<TypeId>) -> OpId {
        let node = self.builder.ops.get(value);
        let underlying = ty.and_then(|ty| self.ctx.types.nullable_underlying(ty));
        if underlying.is_none() || underlying != node.ty {
            return value;
        }
        self.builder.ops.push(
            OpNode::new(
                OpKind::Conversion {
                    operand: value,
                    conversion: Conversion::of(ConversionKind::ImplicitNullable),
                },
                ty,
                node.span,
            )
            .implicit()
            .invalid_if(node.flags.contains(OpFlags::INVALID)),
        )
    }

    /// `cond ? when_true : when_false` as a value.
    fn lower_conditional(
        &mut self,
        op: OpId,
        cond: OpId,
        when_true: OpId,
        when_false: OpId,
    ) -> Result<OpId, FlowError> {
        self.spill();
        let result = self.builder.new_capture(self.builder.current_region());
        let else_block = self.builder.reserve();
        let after = self.builder.reserve();

        self.lower_condition(cond, false, else_block)?;
        let value = self.lower_value(when_true)?;
        self.emit_capture(result, value);
        self.builder.jump(after);

        self.builder.place(else_block);
        let value = self.lower_value(when_false)?;
        self.emit_capture(result, value);
        self.builder.place(after);
        Ok(self.result_ref(result, op))
    }

    /// `left && right` or `left || right` as a value.
    fn lower_logical(
        &mut self,
        op: OpId,
        bin: BinaryOp,
        left: OpId,
        right: OpId,
    ) -> Result<OpId, FlowError> {
        self.spill();
        let result = self.builder.new_capture(self.builder.current_region());
        let is_or = bin == BinaryOp::ConditionalOr;
        let short_circuit = self.builder.reserve();
        let after = self.builder.reserve();

        self.lower_condition(left, is_or, short_circuit)?;
        let value = self.lower_value(right)?;
        self.emit_capture(result, value);
        self.builder.jump(after);

        self.builder.place(short_circuit);
        let known = self.builder.ops.push(
            OpNode::new(OpKind::Literal, self.input.ty(op), self.input.span(left))
                .with_constant(Some(ConstantValue::Bool(is_or)))
                .implicit(),
        );
        self.emit_capture(result, known);
        self.builder.place(after);
        Ok(self.result_ref(result, op))
    }
}

/// Where each link of a conditional access chain sends control.
#[derive(Copy, Clone, Debug)]
struct AccessChain {
    result: AccessResult,
    when_null: BlockRef,
    after: BlockRef,
}

#[derive(Copy, Clone, Debug)]
enum AccessResult {
    /// Value form: the access is captured, typed as the whole expression.
    Capture(CaptureId, Option<TypeId>),
    /// Statement form: the access becomes this expression statement.
    Statement(OpId),
}

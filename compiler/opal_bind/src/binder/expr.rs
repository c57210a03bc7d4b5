//! Expression binding.

use smallvec::SmallVec;

use opal_ir::syntax::{SynArgRange, SynExpr, SynExprKind, SynRange};
use opal_ir::{
    BinaryOp, Conversion, MethodId, OpId, OpKind, OpNode, SynExprId, SynStmtId, TypeId, UnaryOp,
};

use super::overload::CallSite;
use super::Binder;

impl Binder<'_> {
    /// Bind `id` on its own, with no conversion to a target type.
    pub(crate) fn bind_expr(&mut self, id: SynExprId) -> OpId {
        let expr = *self.syntax.expr(id);
        match expr.kind {
            SynExprKind::Literal(value) => self.push(
                OpNode::new(OpKind::Literal, expr.ty, expr.span).with_constant(Some(value)),
            ),
            SynExprKind::Local(local) => {
                let ty = expr.ty.unwrap_or(self.symbols.local(local).ty);
                let kind = OpKind::LocalReference {
                    local,
                    is_declaration: false,
                };
                self.push(OpNode::new(kind, Some(ty), expr.span))
            }
            SynExprKind::Param(param) => {
                let ty = expr.ty.unwrap_or(self.symbols.param(param).ty);
                self.push(OpNode::new(
                    OpKind::ParameterReference(param),
                    Some(ty),
                    expr.span,
                ))
            }
            SynExprKind::Call {
                method,
                receiver,
                args,
            } => self.bind_call(&expr, method, receiver, args),
            SynExprKind::Binary { op, left, right } => self.bind_binary(&expr, op, left, right),
            SynExprKind::Not(operand) => {
                let operand = self.bind_expr_to(operand, TypeId::BOOL);
                let kind = OpKind::Unary {
                    op: UnaryOp::Not,
                    operand,
                };
                let ty = expr.ty.or(Some(TypeId::BOOL));
                self.push(OpNode::new(kind, ty, expr.span))
            }
            SynExprKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                let cond = self.bind_expr_to(cond, TypeId::BOOL);
                let when_true = self.bind_operand(when_true, expr.ty);
                let when_false = self.bind_operand(when_false, expr.ty);
                let kind = OpKind::Conditional {
                    cond,
                    when_true,
                    when_false,
                };
                self.push(OpNode::new(kind, expr.ty, expr.span))
            }
            SynExprKind::Coalesce { left, right } => self.bind_coalesce(&expr, left, right),
            SynExprKind::ConditionalAccess { receiver, access } => {
                let operation = self.bind_expr(receiver);
                let when_not_null = self.bind_expr(access);
                let kind = OpKind::ConditionalAccess {
                    operation,
                    when_not_null,
                };
                self.push(OpNode::new(kind, expr.ty, expr.span))
            }
            SynExprKind::ConditionalReceiver => self.push(
                OpNode::new(OpKind::ConditionalAccessInstance, expr.ty, expr.span).implicit(),
            ),
            SynExprKind::Assign { target, value } => {
                let target = self.bind_expr(target);
                let value = self.bind_operand(value, self.ops.ty(target));
                let ty = self.ops.ty(target).or(expr.ty);
                self.push(OpNode::new(
                    OpKind::SimpleAssignment { target, value },
                    ty,
                    expr.span,
                ))
            }
            SynExprKind::ArrayCreation {
                elem,
                rank,
                sizes,
                initializer,
            } => {
                let ty = expr.ty.unwrap_or(TypeId::ERROR);
                self.bind_array_creation(expr.span, ty, elem, rank, sizes, initializer)
            }
            SynExprKind::ImplicitArrayCreation { initializer } => {
                self.bind_implicit_array_creation(expr.span, expr.ty, initializer)
            }
            SynExprKind::Initializer { elements } => {
                self.bind_misplaced_initializer(expr.span, elements)
            }
            SynExprKind::Collection {
                with_clause,
                elements,
            } => match expr.ty {
                Some(target) => self.bind_expr_to(id, target),
                None => self.bind_untyped_collection(expr.span, with_clause, elements),
            },
            SynExprKind::Lambda { method, body } => self.bind_lambda(&expr, method, body),
            SynExprKind::Error { children } => self.bind_error(&expr, children),
        }
    }

    /// Bind an operand that converts to `target` when there is one.
    fn bind_operand(&mut self, id: SynExprId, target: Option<TypeId>) -> OpId {
        match target {
            Some(target) => self.bind_expr_to(id, target),
            None => self.bind_expr(id),
        }
    }

    fn bind_call(
        &mut self,
        expr: &SynExpr,
        method: MethodId,
        receiver: Option<SynExprId>,
        args: SynArgRange,
    ) -> OpId {
        let instance = receiver.map_or(OpId::INVALID, |r| self.bind_expr(r));
        let syntax = self.syntax;
        let values = self.bind_arg_values(syntax.args(args));
        let site = CallSite::Method { span: expr.span };
        let args: SmallVec<[OpId; 4]> = match self.resolve_overload(&[method], &values, site) {
            Some(resolved) => self.push_arguments(&resolved, &values, site, expr.span),
            None => values.iter().map(|v| v.op).collect(),
        };
        let args = self.ops.push_list(&args);
        let ty = expr.ty.or(self.symbols.method(method).return_type);
        self.push(OpNode::new(
            OpKind::Invocation {
                method,
                instance,
                args,
            },
            ty,
            expr.span,
        ))
    }

    fn bind_binary(
        &mut self,
        expr: &SynExpr,
        op: BinaryOp,
        left: SynExprId,
        right: SynExprId,
    ) -> OpId {
        let (left, right) = if op.is_short_circuit() {
            (
                self.bind_expr_to(left, TypeId::BOOL),
                self.bind_expr_to(right, TypeId::BOOL),
            )
        } else {
            let left = self.bind_expr(left);
            let right = self.bind_expr(right);
            self.unify_operands(left, right)
        };
        let ty = expr.ty.or_else(|| {
            if is_comparison(op) {
                Some(TypeId::BOOL)
            } else {
                self.ops.ty(left)
            }
        });
        self.push(OpNode::new(OpKind::Binary { op, left, right }, ty, expr.span))
    }

    /// Widen the narrower operand of an arithmetic or comparison operator.
    fn unify_operands(&mut self, left: OpId, right: OpId) -> (OpId, OpId) {
        let (Some(lt), Some(rt)) = (self.ops.ty(left), self.ops.ty(right)) else {
            return (left, right);
        };
        if lt == rt || !self.types.is_numeric(lt) || !self.types.is_numeric(rt) {
            return (left, right);
        }
        if self.converts(lt, rt) {
            let conversion = self.classify(left, rt);
            (self.apply_conversion(left, rt, conversion), right)
        } else if self.converts(rt, lt) {
            let conversion = self.classify(right, lt);
            (left, self.apply_conversion(right, lt, conversion))
        } else {
            (left, right)
        }
    }

    /// `a ?? b`. When `a` is `T?` and the result is `T`, the value is
    /// unwrapped by an identity conversion of its underlying value.
    fn bind_coalesce(&mut self, expr: &SynExpr, left: SynExprId, right: SynExprId) -> OpId {
        let value = self.bind_expr(left);
        let value_ty = self.ops.ty(value);
        let result = expr.ty.or(value_ty);
        let when_null = self.bind_operand(right, result);

        let value_conversion = match (value_ty, result) {
            (Some(from), Some(to)) => {
                let unwrapped = self.types.nullable_underlying(from);
                if unwrapped == Some(to) || from == to {
                    Conversion::IDENTITY
                } else {
                    self.classify(value, to)
                }
            }
            _ => Conversion::IDENTITY,
        };
        let kind = OpKind::Coalesce {
            value,
            when_null,
            value_conversion,
        };
        self.push(OpNode::new(kind, result, expr.span))
    }

    fn bind_lambda(&mut self, expr: &SynExpr, method: MethodId, body: SynStmtId) -> OpId {
        let body = self.bind_stmt(body);
        self.push(OpNode::new(
            OpKind::AnonymousFunction { method, body },
            expr.ty,
            expr.span,
        ))
    }

    /// Unbindable syntax keeps its children for recovery.
    fn bind_error(&mut self, expr: &SynExpr, children: SynRange) -> OpId {
        let syntax = self.syntax;
        let children: SmallVec<[OpId; 4]> = syntax
            .exprs(children)
            .iter()
            .map(|&c| self.bind_expr(c))
            .collect();
        let children = self.ops.push_list(&children);
        self.push(OpNode::new(OpKind::Invalid { children }, expr.ty, expr.span).invalid_if(true))
    }
}

fn is_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Equals
            | BinaryOp::NotEquals
            | BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual
    )
}

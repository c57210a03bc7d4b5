//! Rebuilding an operation with replacement children.

use smallvec::SmallVec;

use opal_ir::{OpArena, OpId, OpKind, OpRange};

/// `kind` with its children replaced by `new`, given in the order
/// [`OpArena::children`] yields them. Lists are re-pushed into `out`.
pub(super) fn remap_kind(input: &OpArena, out: &mut OpArena, kind: OpKind, new: &[OpId]) -> OpKind {
    let mut next = Children {
        new: new.iter().copied(),
    };
    match kind {
        OpKind::Literal
        | OpKind::LocalReference { .. }
        | OpKind::ParameterReference(_)
        | OpKind::CollectionElementsPlaceholder
        | OpKind::Branch { .. }
        | OpKind::CaughtException
        | OpKind::ConditionalAccessInstance
        | OpKind::DefaultValue
        | OpKind::FlowAnonymousFunction { .. }
        | OpKind::FlowCaptureReference { .. }
        | OpKind::Empty => kind,
        OpKind::Invocation {
            method,
            instance,
            args,
        } => {
            let instance = next.one(instance);
            let args = next.list(input, out, args);
            OpKind::Invocation {
                method,
                instance,
                args,
            }
        }
        OpKind::Argument {
            kind,
            param,
            value,
            in_conversion,
            out_conversion,
        } => OpKind::Argument {
            kind,
            param,
            value: next.one(value),
            in_conversion,
            out_conversion,
        },
        OpKind::Conversion {
            operand,
            conversion,
        } => OpKind::Conversion {
            operand: next.one(operand),
            conversion,
        },
        OpKind::Unary { op, operand } => OpKind::Unary {
            op,
            operand: next.one(operand),
        },
        OpKind::IsNull { operand } => OpKind::IsNull {
            operand: next.one(operand),
        },
        OpKind::Binary { op, left, right } => {
            let left = next.one(left);
            let right = next.one(right);
            OpKind::Binary { op, left, right }
        }
        OpKind::Conditional {
            cond,
            when_true,
            when_false,
        } => {
            let cond = next.one(cond);
            let when_true = next.one(when_true);
            let when_false = next.one(when_false);
            OpKind::Conditional {
                cond,
                when_true,
                when_false,
            }
        }
        OpKind::Coalesce {
            value,
            when_null,
            value_conversion,
        } => {
            let value = next.one(value);
            let when_null = next.one(when_null);
            OpKind::Coalesce {
                value,
                when_null,
                value_conversion,
            }
        }
        OpKind::ConditionalAccess {
            operation,
            when_not_null,
        } => {
            let operation = next.one(operation);
            let when_not_null = next.one(when_not_null);
            OpKind::ConditionalAccess {
                operation,
                when_not_null,
            }
        }
        OpKind::ArrayCreation { sizes, initializer } => {
            let sizes = next.list(input, out, sizes);
            let initializer = next.one(initializer);
            OpKind::ArrayCreation { sizes, initializer }
        }
        OpKind::ArrayInitializer { elements } => OpKind::ArrayInitializer {
            elements: next.list(input, out, elements),
        },
        OpKind::CollectionExpression {
            construct_method,
            construct_args,
            elements,
        } => {
            let construct_args = next.list(input, out, construct_args);
            let elements = next.list(input, out, elements);
            OpKind::CollectionExpression {
                construct_method,
                construct_args,
                elements,
            }
        }
        OpKind::SimpleAssignment { target, value } => {
            let target = next.one(target);
            let value = next.one(value);
            OpKind::SimpleAssignment { target, value }
        }
        OpKind::VariableDeclaration { local, initializer } => OpKind::VariableDeclaration {
            local,
            initializer: next.one(initializer),
        },
        OpKind::ExpressionStatement { expr } => OpKind::ExpressionStatement {
            expr: next.one(expr),
        },
        OpKind::Block { ops, locals } => {
            let ops = next.list(input, out, ops);
            let locals = out.push_locals(input.locals(locals));
            OpKind::Block { ops, locals }
        }
        OpKind::Labeled { label, body } => OpKind::Labeled {
            label,
            body: next.one(body),
        },
        OpKind::WhileLoop {
            cond,
            body,
            test_at_top,
        } => {
            let (cond, body) = if test_at_top {
                let cond = next.one(cond);
                (cond, next.one(body))
            } else {
                let body = next.one(body);
                (next.one(cond), body)
            };
            OpKind::WhileLoop {
                cond,
                body,
                test_at_top,
            }
        }
        OpKind::Return { value } => OpKind::Return {
            value: next.one(value),
        },
        OpKind::Throw { value } => OpKind::Throw {
            value: next.one(value),
        },
        OpKind::Try {
            body,
            catches,
            finally,
        } => {
            let body = next.one(body);
            let catches = next.list(input, out, catches);
            let finally = next.one(finally);
            OpKind::Try {
                body,
                catches,
                finally,
            }
        }
        OpKind::CatchClause {
            exception_type,
            local,
            handler,
        } => OpKind::CatchClause {
            exception_type,
            local,
            handler: next.one(handler),
        },
        OpKind::LocalFunction { method, body } => OpKind::LocalFunction {
            method,
            body: next.one(body),
        },
        OpKind::AnonymousFunction { method, body } => OpKind::AnonymousFunction {
            method,
            body: next.one(body),
        },
        OpKind::FlowCapture { id, value } => OpKind::FlowCapture {
            id,
            value: next.one(value),
        },
        OpKind::Invalid { children } => OpKind::Invalid {
            children: next.list(input, out, children),
        },
    }
}

struct Children<I> {
    new: I,
}

impl<I: Iterator<Item = OpId>> Children<I> {
    /// Absent optional children stay absent.
    fn one(&mut self, old: OpId) -> OpId {
        if old.is_valid() {
            self.new.next().unwrap_or(OpId::INVALID)
        } else {
            OpId::INVALID
        }
    }

    fn list(&mut self, input: &OpArena, out: &mut OpArena, range: OpRange) -> OpRange {
        let ids: SmallVec<[OpId; 8]> = input.list(range).iter().map(|&old| self.one(old)).collect();
        out.push_list(&ids)
    }
}

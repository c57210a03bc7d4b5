//! Struct-of-arrays storage for operations.

use smallvec::SmallVec;

use super::{LocalRange, OpFlags, OpId, OpKind, OpNode, OpRange};
use crate::{to_u16, to_u32, ConstantValue, LocalId, Span, TypeId};

/// Arena of operations.
///
/// Columns are kept in separate vectors so the flag and type scans done by
/// the flow builder and the printer touch only the data they need.
#[derive(Clone, Debug, Default)]
pub struct OpArena {
    kinds: Vec<OpKind>,
    types: Vec<Option<TypeId>>,
    constants: Vec<Option<ConstantValue>>,
    flags: Vec<OpFlags>,
    spans: Vec<Span>,
    lists: Vec<OpId>,
    locals: Vec<LocalId>,
}

impl OpArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(ops: usize) -> Self {
        OpArena {
            kinds: Vec::with_capacity(ops),
            types: Vec::with_capacity(ops),
            constants: Vec::with_capacity(ops),
            flags: Vec::with_capacity(ops),
            spans: Vec::with_capacity(ops),
            lists: Vec::with_capacity(ops),
            locals: Vec::new(),
        }
    }

    pub fn push(&mut self, node: OpNode) -> OpId {
        let id = OpId::new(to_u32(self.kinds.len(), "operations"));
        self.kinds.push(node.kind);
        self.types.push(node.ty);
        self.constants.push(node.constant);
        self.flags.push(node.flags);
        self.spans.push(node.span);
        id
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[inline]
    pub fn kind(&self, id: OpId) -> OpKind {
        self.kinds[id.index()]
    }

    #[inline]
    pub fn ty(&self, id: OpId) -> Option<TypeId> {
        self.types[id.index()]
    }

    #[inline]
    pub fn constant(&self, id: OpId) -> Option<ConstantValue> {
        self.constants[id.index()]
    }

    #[inline]
    pub fn flags(&self, id: OpId) -> OpFlags {
        self.flags[id.index()]
    }

    #[inline]
    pub fn is_invalid(&self, id: OpId) -> bool {
        self.flags(id).contains(OpFlags::INVALID)
    }

    #[inline]
    pub fn is_implicit(&self, id: OpId) -> bool {
        self.flags(id).contains(OpFlags::IMPLICIT)
    }

    #[inline]
    pub fn span(&self, id: OpId) -> Span {
        self.spans[id.index()]
    }

    pub fn get(&self, id: OpId) -> OpNode {
        OpNode {
            kind: self.kind(id),
            ty: self.ty(id),
            constant: self.constant(id),
            flags: self.flags(id),
            span: self.span(id),
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// All ids in push order.
    pub fn ids(&self) -> impl Iterator<Item = OpId> {
        (0..to_u32(self.kinds.len(), "operations")).map(OpId::new)
    }

    // ── Lists ───────────────────────────────────────────────────────

    pub fn push_list(&mut self, ids: &[OpId]) -> OpRange {
        if ids.is_empty() {
            return OpRange::EMPTY;
        }
        let start = to_u32(self.lists.len(), "operation lists");
        self.lists.extend_from_slice(ids);
        OpRange::new(start, to_u16(ids.len(), "operation list"))
    }

    pub fn list(&self, range: OpRange) -> &[OpId] {
        let start = range.start as usize;
        &self.lists[start..start + range.len()]
    }

    pub fn push_locals(&mut self, locals: &[LocalId]) -> LocalRange {
        if locals.is_empty() {
            return LocalRange::EMPTY;
        }
        let start = to_u32(self.locals.len(), "block locals");
        self.locals.extend_from_slice(locals);
        LocalRange::new(start, to_u16(locals.len(), "block local list"))
    }

    pub fn locals(&self, range: LocalRange) -> &[LocalId] {
        let start = range.start as usize;
        &self.locals[start..start + range.len()]
    }

    // ── Construction-time updates ───────────────────────────────────

    /// Flag a node invalid after it was pushed.
    ///
    /// Only builders call this, before the tree is handed out.
    pub fn mark_invalid(&mut self, id: OpId) {
        self.flags[id.index()] |= OpFlags::INVALID;
    }

    /// Children in evaluation order. Absent optional children are skipped.
    pub fn children(&self, id: OpId) -> SmallVec<[OpId; 4]> {
        let mut out: SmallVec<[OpId; 4]> = SmallVec::new();
        let mut one = |child: OpId| {
            if child.is_valid() {
                out.push(child);
            }
        };
        match self.kind(id) {
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
            | OpKind::Empty => {}
            OpKind::Invocation { instance, args, .. } => {
                one(instance);
                self.list(args).iter().copied().for_each(one);
            }
            OpKind::Argument { value, .. } => one(value),
            OpKind::Conversion { operand, .. }
            | OpKind::Unary { operand, .. }
            | OpKind::IsNull { operand } => one(operand),
            OpKind::Binary { left, right, .. } => {
                one(left);
                one(right);
            }
            OpKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                one(cond);
                one(when_true);
                one(when_false);
            }
            OpKind::Coalesce {
                value, when_null, ..
            } => {
                one(value);
                one(when_null);
            }
            OpKind::ConditionalAccess {
                operation,
                when_not_null,
            } => {
                one(operation);
                one(when_not_null);
            }
            OpKind::ArrayCreation { sizes, initializer } => {
                self.list(sizes).iter().copied().for_each(&mut one);
                one(initializer);
            }
            OpKind::ArrayInitializer { elements } => {
                self.list(elements).iter().copied().for_each(one);
            }
            OpKind::CollectionExpression {
                construct_args,
                elements,
                ..
            } => {
                self.list(construct_args).iter().copied().for_each(&mut one);
                self.list(elements).iter().copied().for_each(one);
            }
            OpKind::SimpleAssignment { target, value } => {
                one(target);
                one(value);
            }
            OpKind::VariableDeclaration { initializer, .. } => one(initializer),
            OpKind::ExpressionStatement { expr } => one(expr),
            OpKind::Block { ops, .. } => self.list(ops).iter().copied().for_each(one),
            OpKind::Labeled { body, .. } => one(body),
            OpKind::WhileLoop {
                cond,
                body,
                test_at_top,
            } => {
                if test_at_top {
                    one(cond);
                    one(body);
                } else {
                    one(body);
                    one(cond);
                }
            }
            OpKind::Return { value } | OpKind::Throw { value } => one(value),
            OpKind::Try {
                body,
                catches,
                finally,
            } => {
                one(body);
                self.list(catches).iter().copied().for_each(&mut one);
                one(finally);
            }
            OpKind::CatchClause { handler, .. } => one(handler),
            OpKind::LocalFunction { body, .. } | OpKind::AnonymousFunction { body, .. } => {
                one(body);
            }
            OpKind::FlowCapture { value, .. } => one(value),
            OpKind::Invalid { children } => self.list(children).iter().copied().for_each(one),
        }
        out
    }
}

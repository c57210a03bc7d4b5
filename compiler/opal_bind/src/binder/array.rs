//! Array creation and brace initializers.

use smallvec::SmallVec;
use tracing::trace;

use opal_diagnostic::{
    array_length_mismatch, constant_expected, misplaced_array_initializer, missing_array_size,
    nested_initializer_expected,
};
use opal_ir::syntax::{SynExprKind, SynRange};
use opal_ir::{ConstantValue, OpId, OpKind, OpNode, OpRange, Span, SynExprId, TypeId};

use super::Binder;

/// Initializer lengths seen at each nesting depth, with their spans.
type Levels = SmallVec<[SmallVec<[(usize, Span); 4]>; 2]>;

impl Binder<'_> {
    /// `new T[s0, s1] { ... }`.
    pub(super) fn bind_array_creation(
        &mut self,
        span: Span,
        array_ty: TypeId,
        elem: TypeId,
        rank: u8,
        sizes: SynRange,
        initializer: Option<SynExprId>,
    ) -> OpId {
        let syntax = self.syntax;
        let sizes: SmallVec<[OpId; 2]> = syntax
            .exprs(sizes)
            .iter()
            .map(|&size| self.bind_array_size(size))
            .collect();

        let Some(init) = initializer else {
            if sizes.is_empty() {
                self.report(missing_array_size(span));
            }
            let sizes = self.ops.push_list(&sizes);
            return self.push_creation(span, array_ty, sizes, OpId::INVALID, false);
        };

        let init_syn = *self.syntax.expr(init);
        let mut levels = Levels::new();
        let initializer = match init_syn.kind {
            SynExprKind::Initializer { elements } => {
                self.bind_array_initializer(init_syn.span, elements, elem, rank, 0, &mut levels)
            }
            _ => self.bind_expr(init),
        };

        let sizes = if sizes.is_empty() {
            self.implicit_sizes(span, rank, &levels)
        } else {
            self.check_sizes(&sizes, &levels);
            self.ops.push_list(&sizes)
        };
        self.push_creation(span, array_ty, sizes, initializer, false)
    }

    /// `new[] { ... }`, shaped by the inferred array type.
    pub(super) fn bind_implicit_array_creation(
        &mut self,
        span: Span,
        ty: Option<TypeId>,
        initializer: SynExprId,
    ) -> OpId {
        let shape = ty.and_then(|ty| self.types.array_shape(ty));
        let (elem, rank) = shape.unwrap_or((TypeId::ERROR, 1));
        let array_ty = ty.unwrap_or(TypeId::ERROR);

        let init_syn = *self.syntax.expr(initializer);
        let mut levels = Levels::new();
        let init = match init_syn.kind {
            SynExprKind::Initializer { elements } => {
                self.bind_array_initializer(init_syn.span, elements, elem, rank, 0, &mut levels)
            }
            _ => self.bind_expr(initializer),
        };
        let sizes = self.implicit_sizes(span, rank, &levels);
        let node = OpNode::new(
            OpKind::ArrayCreation {
                sizes,
                initializer: init,
            },
            Some(array_ty),
            span,
        )
        .invalid_if(shape.is_none());
        self.push(node)
    }

    /// A brace list assigned straight to an array-typed target
    /// (`int[] a = { 1, 2 };`) creates the array implicitly.
    pub(crate) fn bind_initializer_as_creation(
        &mut self,
        span: Span,
        elements: SynRange,
        target: TypeId,
    ) -> OpId {
        let (elem, rank) = self.types.array_shape(target).unwrap_or((TypeId::ERROR, 1));
        let mut levels = Levels::new();
        let init = self.bind_array_initializer(span, elements, elem, rank, 0, &mut levels);
        let sizes = self.implicit_sizes(span, rank, &levels);
        self.push_creation(span, target, sizes, init, true)
    }

    /// A brace list with no array to initialize.
    pub(super) fn bind_misplaced_initializer(&mut self, span: Span, elements: SynRange) -> OpId {
        self.report(misplaced_array_initializer(span));
        let syntax = self.syntax;
        let children: SmallVec<[OpId; 4]> = syntax
            .exprs(elements)
            .iter()
            .map(|&e| self.bind_expr(e))
            .collect();
        let children = self.ops.push_list(&children);
        self.push(OpNode::new(OpKind::Invalid { children }, None, span).invalid_if(true))
    }

    /// Sizes convert to `long` when written as `long`, to `int` otherwise.
    fn bind_array_size(&mut self, size: SynExprId) -> OpId {
        let op = self.bind_expr(size);
        let target = if self.ops.ty(op) == Some(TypeId::INT64) {
            TypeId::INT64
        } else {
            TypeId::INT32
        };
        self.convert_to(op, target)
    }

    fn bind_array_initializer(
        &mut self,
        span: Span,
        elements: SynRange,
        elem: TypeId,
        rank: u8,
        depth: usize,
        levels: &mut Levels,
    ) -> OpId {
        if levels.len() <= depth {
            levels.resize_with(depth + 1, SmallVec::new);
        }
        levels[depth].push((elements.len(), span));

        let nested = depth + 1 < usize::from(rank);
        let syntax = self.syntax;
        let mut bound: SmallVec<[OpId; 8]> = SmallVec::with_capacity(elements.len());
        for &element in syntax.exprs(elements) {
            let syn = *syntax.expr(element);
            let op = match (syn.kind, nested) {
                (SynExprKind::Initializer { elements }, true) => {
                    self.bind_array_initializer(syn.span, elements, elem, rank, depth + 1, levels)
                }
                (_, true) => {
                    self.report(nested_initializer_expected(syn.span));
                    self.bind_expr(element)
                }
                (SynExprKind::Initializer { elements }, false) => {
                    self.bind_misplaced_initializer(syn.span, elements)
                }
                (_, false) => self.bind_expr_to(element, elem),
            };
            bound.push(op);
        }
        let elements = self.ops.push_list(&bound);
        self.push(OpNode::new(OpKind::ArrayInitializer { elements }, None, span))
    }

    /// One implicit `int` literal per rank, counting the first initializer
    /// found at that depth.
    fn implicit_sizes(&mut self, span: Span, rank: u8, levels: &Levels) -> OpRange {
        let sizes: SmallVec<[OpId; 2]> = (0..usize::from(rank))
            .map(|depth| {
                let count = levels
                    .get(depth)
                    .and_then(|level| level.first())
                    .map_or(0, |&(len, _)| len);
                let count = i32::try_from(count).unwrap_or(i32::MAX);
                let literal = OpNode::new(OpKind::Literal, Some(TypeId::INT32), span)
                    .with_constant(Some(ConstantValue::Int32(count)))
                    .implicit();
                self.push(literal)
            })
            .collect();
        trace!(rank, "implicit array sizes");
        self.ops.push_list(&sizes)
    }

    /// Explicit sizes must be constants when an initializer is present, and
    /// every initializer at that depth must have exactly that many entries.
    fn check_sizes(&mut self, sizes: &[OpId], levels: &Levels) {
        for (depth, &size) in sizes.iter().enumerate() {
            let Some(constant) = self.ops.constant(size) else {
                self.report(constant_expected(self.ops.span(size)));
                continue;
            };
            if !self.options().check_array_lengths {
                continue;
            }
            let Some(expected) = constant.as_length() else {
                continue;
            };
            let Some(level) = levels.get(depth) else {
                continue;
            };
            for &(len, init_span) in level {
                if u64::try_from(len).ok() != Some(expected) {
                    self.report(array_length_mismatch(init_span, expected));
                }
            }
        }
    }

    fn push_creation(
        &mut self,
        span: Span,
        array_ty: TypeId,
        sizes: OpRange,
        initializer: OpId,
        implicit: bool,
    ) -> OpId {
        let mut node = OpNode::new(OpKind::ArrayCreation { sizes, initializer }, Some(array_ty), span);
        if implicit {
            node = node.implicit();
        }
        self.push(node)
    }
}

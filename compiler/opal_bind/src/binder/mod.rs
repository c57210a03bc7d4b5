//! Resolved syntax to operation tree binding.
//!
//! The [`Binder`] owns the operation arena being built and the diagnostics
//! side channel. Each syntax family is bound in its own submodule:
//!
//! - `expr`: literals, references, calls, operators, lambdas
//! - `array`: array creation and brace initializers
//! - `collection`: collection literals and their `with(...)` clause
//! - `overload`: construct-argument and call-argument resolution
//! - `stmt`: statements and blocks
//!
//! Children are always pushed before their parents, so a single pass in
//! push order sees every child before the node that owns it.

mod array;
mod collection;
mod expr;
mod overload;
mod stmt;

use smallvec::SmallVec;
use tracing::{debug, trace};

use opal_diagnostic::{cannot_convert, Diagnostic};
use opal_ir::syntax::SynExprKind;
use opal_ir::{
    Conversion, ConversionKind, LocalId, OpArena, OpId, OpKind, OpNode, Span, StringInterner,
    SymbolTable, SynArena, SynExprId, TypeId, TypePool,
};

use crate::convert::{convert_constant, ConversionOracle};
use crate::{BindContext, BindOptions, BoundBody};

/// State for binding one body.
pub(crate) struct Binder<'a> {
    pub(crate) syntax: &'a SynArena,
    pub(crate) types: &'a TypePool,
    pub(crate) symbols: &'a SymbolTable,
    pub(crate) interner: &'a StringInterner,
    oracle: &'a dyn ConversionOracle,
    options: &'a BindOptions,
    /// Target operation arena (being built).
    pub(crate) ops: OpArena,
    diagnostics: Vec<Diagnostic>,
    /// Locations of follow-on errors left unreported; they still invalidate.
    suppressed: SmallVec<[Span; 2]>,
    /// Locals declared by each open block, innermost last.
    scopes: Vec<Vec<LocalId>>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(
        ctx: &BindContext<'a>,
        options: &'a BindOptions,
        oracle: &'a dyn ConversionOracle,
    ) -> Self {
        Binder {
            syntax: ctx.syntax,
            types: ctx.types,
            symbols: ctx.symbols,
            interner: ctx.interner,
            oracle,
            options,
            ops: OpArena::with_capacity(ctx.syntax.expr_count() + ctx.syntax.expr_count() / 2),
            diagnostics: Vec::new(),
            suppressed: SmallVec::new(),
            scopes: Vec::new(),
        }
    }

    /// Flag invalid operations and hand out the tree.
    pub(crate) fn finish(mut self, root: OpId) -> BoundBody {
        self.propagate_invalid();
        debug!(
            ops = self.ops.len(),
            diagnostics = self.diagnostics.len(),
            "bound body"
        );
        BoundBody {
            ops: self.ops,
            root,
            diagnostics: self.diagnostics,
        }
    }

    // ── Arena helpers ───────────────────────────────────────────────

    pub(crate) fn push(&mut self, node: OpNode) -> OpId {
        self.ops.push(node)
    }

    pub(crate) fn report(&mut self, diag: Diagnostic) {
        if !self.options.report_follow_on && diag.follow_on {
            trace!(code = %diag.code, "dropped follow-on diagnostic");
            self.suppressed.extend(diag.primary_span());
            return;
        }
        self.diagnostics.push(diag);
    }

    /// Report `diag`, flagged as a follow-on when any of `types` is the
    /// error type.
    pub(crate) fn report_about(&mut self, diag: Diagnostic, types: &[Option<TypeId>]) {
        let follow_on = types
            .iter()
            .flatten()
            .any(|&ty| self.types.is_error(ty));
        self.report(if follow_on { diag.as_follow_on() } else { diag });
    }

    pub(crate) fn options(&self) -> &BindOptions {
        self.options
    }

    /// Keyword-style type name used in diagnostic messages.
    pub(crate) fn type_name(&self, ty: Option<TypeId>) -> String {
        match ty {
            Some(ty) => self.types.display_keywords(ty, self.interner).to_string(),
            None => "<null>".to_owned(),
        }
    }

    // ── Locals ──────────────────────────────────────────────────────

    pub(crate) fn open_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub(crate) fn close_scope(&mut self) -> Vec<LocalId> {
        self.scopes.pop().unwrap_or_default()
    }

    pub(crate) fn declare_local(&mut self, local: LocalId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(local);
        }
    }

    // ── Conversions ─────────────────────────────────────────────────

    pub(crate) fn classify(&self, op: OpId, target: TypeId) -> Conversion {
        self.oracle
            .classify(self.types, self.ops.ty(op), self.ops.constant(op), target)
    }

    /// Whether a value of type `from` implicitly converts to `to`.
    pub(crate) fn converts(&self, from: TypeId, to: TypeId) -> bool {
        self.oracle
            .classify(self.types, Some(from), None, to)
            .exists()
    }

    /// Convert `op` to `target`, reporting CS0029 when no implicit
    /// conversion exists. The operand is kept under an invalid conversion.
    pub(crate) fn convert_to(&mut self, op: OpId, target: TypeId) -> OpId {
        let conversion = self.classify(op, target);
        if !conversion.exists() {
            let from = self.type_name(self.ops.ty(op));
            let to = self.type_name(Some(target));
            let diag = cannot_convert(self.ops.span(op), &from, &to);
            self.report_about(diag, &[self.ops.ty(op), Some(target)]);
        }
        self.apply_conversion(op, target, conversion)
    }

    /// Wrap `op` in an implicit conversion node unless it is an identity.
    pub(crate) fn apply_conversion(
        &mut self,
        op: OpId,
        target: TypeId,
        conversion: Conversion,
    ) -> OpId {
        if conversion.is_identity() {
            return op;
        }
        let constant = self
            .ops
            .constant(op)
            .and_then(|c| convert_constant(self.types, c, conversion.kind, target));
        let node = OpNode::new(
            OpKind::Conversion {
                operand: op,
                conversion,
            },
            Some(target),
            self.ops.span(op),
        )
        .with_constant(constant)
        .implicit();
        self.push(node)
    }

    /// Bind `expr` in a context that converts it to `target`.
    pub(crate) fn bind_expr_to(&mut self, expr: SynExprId, target: TypeId) -> OpId {
        let syn = *self.syntax.expr(expr);
        match syn.kind {
            SynExprKind::Collection {
                with_clause,
                elements,
            } => {
                let collection = self.bind_collection(syn.span, with_clause, elements, target);
                self.collection_conversion(collection, target)
            }
            SynExprKind::Initializer { elements } if self.types.array_shape(target).is_some() => {
                self.bind_initializer_as_creation(syn.span, elements, target)
            }
            _ => {
                let op = self.bind_expr(expr);
                self.convert_to(op, target)
            }
        }
    }

    /// The implicit conversion every collection literal goes through.
    pub(crate) fn collection_conversion(&mut self, collection: OpId, target: TypeId) -> OpId {
        let node = OpNode::new(
            OpKind::Conversion {
                operand: collection,
                conversion: Conversion::of(ConversionKind::CollectionExpression),
            },
            Some(target),
            self.ops.span(collection),
        )
        .implicit();
        self.push(node)
    }

    // ── Invalid flags ───────────────────────────────────────────────

    /// An operation is invalid when it was flagged while binding, when its
    /// span overlaps the location of a reported error, or when any child is
    /// invalid. Siblings of an invalid node keep their own flag.
    fn propagate_invalid(&mut self) {
        let error_spans: SmallVec<[Span; 4]> = self
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .filter_map(Diagnostic::primary_span)
            .chain(self.suppressed.iter().copied())
            .collect();
        let ids: Vec<OpId> = self.ops.ids().collect();
        for id in ids {
            if self.ops.is_invalid(id) {
                continue;
            }
            let span = self.ops.span(id);
            let invalid = error_spans.iter().any(|e| e.overlaps(span))
                || self
                    .ops
                    .children(id)
                    .iter()
                    .any(|&child| self.ops.is_invalid(child));
            if invalid {
                self.ops.mark_invalid(id);
            }
        }
    }
}

#[cfg(test)]
mod tests;

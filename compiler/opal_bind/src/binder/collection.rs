//! Collection literals: `[with(...), e1, e2]`.
//!
//! How the `with(...)` arguments bind depends on what kind of type the
//! literal converts to:
//!
//! | Target                     | `with(...)`                                   |
//! |----------------------------|-----------------------------------------------|
//! | array, span                | never allowed (CS9401)                        |
//! | read-only interface        | only when empty (CS9403)                      |
//! | mutable interface          | constructors of the backing type              |
//! | type with a builder        | factory overloads minus the elements param    |
//! | concrete collection type   | its constructors                              |
//! | type parameter             | only when empty (CS0417)                      |
//!
//! When the arguments do not bind, the literal keeps them as raw operands and
//! has no construct method.

use smallvec::SmallVec;
use tracing::trace;

use opal_diagnostic::{
    collection_not_constructible, read_only_with_arguments, type_parameter_with_arguments,
    with_not_supported,
};
use opal_ir::syntax::{SynArg, SynRange, WithClause};
use opal_ir::{CollectionKind, MethodId, OpId, OpKind, OpNode, Span, TypeId, TypeKind};

use super::overload::{ArgValue, CallSite};
use super::Binder;

/// How a target type is built from a collection literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Construction {
    /// Resolution already failed upstream; stay quiet.
    Error,
    /// Arrays and spans are built inline.
    Inline,
    ReadOnlyInterface,
    /// A constructor of `ty`; `interface` when `ty` backs a mutable interface.
    Constructor { ty: TypeId, interface: bool },
    Builder,
    TypeParameter,
    NotConstructible,
}

impl Binder<'_> {
    /// Bind a collection literal converting to `target`.
    ///
    /// The result is the `CollectionExpression` itself; callers add the
    /// collection conversion around it.
    pub(crate) fn bind_collection(
        &mut self,
        span: Span,
        with_clause: Option<WithClause>,
        elements: SynRange,
        target: TypeId,
    ) -> OpId {
        let syntax = self.syntax;
        let written: &[SynArg] = with_clause.map_or(&[], |clause| syntax.args(clause.args));
        let args = self.bind_arg_values(written);

        let construction = self.construction_of(target);
        trace!(?construction, args = args.len(), "collection literal");
        let (construct_method, construct_args) =
            self.bind_construction(construction, span, with_clause, &args, target);

        let elem = match construction {
            Construction::Error | Construction::NotConstructible | Construction::TypeParameter => {
                None
            }
            _ => self.types.element_type(target),
        };
        let elements: SmallVec<[OpId; 8]> = syntax
            .exprs(elements)
            .iter()
            .map(|&e| match elem {
                Some(elem) => self.bind_expr_to(e, elem),
                None => self.bind_expr(e),
            })
            .collect();

        let construct_args = self.ops.push_list(&construct_args);
        let elements = self.ops.push_list(&elements);
        self.push(OpNode::new(
            OpKind::CollectionExpression {
                construct_method,
                construct_args,
                elements,
            },
            Some(target),
            span,
        ))
    }

    /// A collection literal with nothing to convert to.
    pub(super) fn bind_untyped_collection(
        &mut self,
        span: Span,
        with_clause: Option<WithClause>,
        elements: SynRange,
    ) -> OpId {
        let syntax = self.syntax;
        let written: &[SynArg] = with_clause.map_or(&[], |clause| syntax.args(clause.args));
        let args: SmallVec<[OpId; 4]> = self
            .bind_arg_values(written)
            .iter()
            .map(|arg| arg.op)
            .collect();
        let elements: SmallVec<[OpId; 8]> = syntax
            .exprs(elements)
            .iter()
            .map(|&e| self.bind_expr(e))
            .collect();
        let construct_args = self.ops.push_list(&args);
        let elements = self.ops.push_list(&elements);
        let node = OpNode::new(
            OpKind::CollectionExpression {
                construct_method: None,
                construct_args,
                elements,
            },
            None,
            span,
        )
        .invalid_if(true);
        self.push(node)
    }

    fn construction_of(&self, target: TypeId) -> Construction {
        match self.types.kind(target) {
            TypeKind::Error => Construction::Error,
            TypeKind::Array { .. } | TypeKind::Span { .. } => Construction::Inline,
            TypeKind::TypeParam { .. } => Construction::TypeParameter,
            TypeKind::Named(named) => match named.collection {
                CollectionKind::ReadOnlyInterface => Construction::ReadOnlyInterface,
                CollectionKind::MutableInterface { backing } => Construction::Constructor {
                    ty: backing,
                    interface: true,
                },
                _ if self.symbols.collection_builder(target).is_some() => Construction::Builder,
                CollectionKind::Concrete => Construction::Constructor {
                    ty: target,
                    interface: false,
                },
                CollectionKind::None => Construction::NotConstructible,
            },
            _ => Construction::NotConstructible,
        }
    }

    /// Resolve the construct method and its argument list.
    fn bind_construction(
        &mut self,
        construction: Construction,
        span: Span,
        with_clause: Option<WithClause>,
        args: &[ArgValue],
        target: TypeId,
    ) -> (Option<MethodId>, SmallVec<[OpId; 4]>) {
        let raw: SmallVec<[OpId; 4]> = args.iter().map(|arg| arg.op).collect();
        let keyword = with_clause.map(|clause| with_keyword(clause.span));

        match construction {
            Construction::Error => (None, raw),
            Construction::Inline => {
                if let Some(keyword) = keyword {
                    let ty = self.type_name(Some(target));
                    self.report(with_not_supported(keyword, &ty));
                }
                (None, raw)
            }
            Construction::ReadOnlyInterface => {
                if let Some(keyword) = keyword.filter(|_| !args.is_empty()) {
                    self.report(read_only_with_arguments(keyword));
                }
                (None, raw)
            }
            Construction::TypeParameter => {
                if let Some(clause) = with_clause.filter(|_| !args.is_empty()) {
                    let name = self.type_name(Some(target));
                    self.report(type_parameter_with_arguments(clause.span, &name));
                }
                (None, raw)
            }
            Construction::NotConstructible => {
                let ty = self.type_name(Some(target));
                self.report(collection_not_constructible(span, &ty));
                (None, raw)
            }
            Construction::Constructor { ty, interface } => {
                let symbols = self.symbols;
                let candidates = symbols.constructors_of(ty);
                let site = match (with_clause, keyword) {
                    (Some(clause), Some(keyword)) => CallSite::Constructor {
                        ty,
                        arity_span: if interface { keyword } else { clause.span },
                        span: clause.span,
                    },
                    _ => CallSite::Constructor {
                        ty,
                        arity_span: span,
                        span,
                    },
                };
                self.resolve_construction(candidates, args, site, span, with_clause.is_some(), raw)
            }
            Construction::Builder => {
                let symbols = self.symbols;
                let candidates: &[MethodId] = symbols
                    .collection_builder(target)
                    .map_or(&[], |builder| builder.methods.as_slice());
                let site = CallSite::Builder {
                    span: with_clause.map_or(span, |clause| clause.span),
                };
                self.resolve_construction(candidates, args, site, span, with_clause.is_some(), raw)
            }
        }
    }

    /// Resolve against `candidates`. Without a `with(...)` clause the chosen
    /// method is still recorded but no arguments are listed.
    fn resolve_construction(
        &mut self,
        candidates: &[MethodId],
        args: &[ArgValue],
        site: CallSite,
        span: Span,
        has_clause: bool,
        raw: SmallVec<[OpId; 4]>,
    ) -> (Option<MethodId>, SmallVec<[OpId; 4]>) {
        match self.resolve_overload(candidates, args, site) {
            Some(resolved) if has_clause => {
                let arguments = self.push_arguments(&resolved, args, site, span);
                (Some(resolved.method), arguments)
            }
            Some(resolved) => (Some(resolved.method), SmallVec::new()),
            None => (None, raw),
        }
    }
}

/// The `with` keyword at the start of a `with(...)` clause.
fn with_keyword(clause: Span) -> Span {
    Span::new(clause.start, clause.start.saturating_add(4).min(clause.end))
}

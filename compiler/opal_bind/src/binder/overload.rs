//! Argument-to-parameter mapping and overload selection.
//!
//! Used for the `with(...)` clause of collection literals (against
//! constructors or builder factory overloads) and for the argument lists of
//! ordinary calls, whose single candidate was already picked upstream.

use std::cmp::Ordering;

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use opal_diagnostic::{
    ambiguous_call, argument_mismatch, builder_arity_mismatch, constructor_arity_mismatch,
    method_arity_mismatch, unknown_named_argument,
};
use opal_ir::syntax::SynArg;
use opal_ir::{
    ArgumentKind, Conversion, MethodId, Name, OpId, OpKind, OpNode, ParamId, Span, TypeId,
};

use super::Binder;
use crate::convert::conversion_rank;

/// A written argument after its value was bound on its own.
#[derive(Copy, Clone, Debug)]
pub(super) struct ArgValue {
    pub op: OpId,
    pub name: Option<Name>,
    /// The whole argument, name included.
    pub span: Span,
}

/// What the candidates are being resolved for. Picks the diagnostics.
#[derive(Copy, Clone, Debug)]
pub(super) enum CallSite {
    /// Constructors of `ty`. Arity errors are reported at `arity_span`.
    Constructor { ty: TypeId, arity_span: Span, span: Span },
    /// Builder factory overloads. Their last parameter receives the elements
    /// and is never matched against written arguments.
    Builder { span: Span },
    /// An ordinary call.
    Method { span: Span },
}

impl CallSite {
    /// Location of the whole argument list; default values and ambiguity
    /// errors are placed here.
    fn span(self) -> Span {
        match self {
            CallSite::Constructor { span, .. }
            | CallSite::Builder { span }
            | CallSite::Method { span } => span,
        }
    }
}

/// The chosen candidate and how each argument reaches its parameter.
#[derive(Clone, Debug)]
pub(super) struct Resolved {
    pub method: MethodId,
    /// Per written argument, in written order.
    pub explicit: SmallVec<[(ParamId, Conversion); 4]>,
    /// Parameters filled from their default value, in parameter order.
    pub defaults: SmallVec<[ParamId; 2]>,
    /// The elements parameter of a builder factory.
    pub elements_param: Option<ParamId>,
}

#[derive(Clone, Debug)]
enum Applicability {
    Applicable(Resolved),
    TooManyArguments,
    UnknownName { arg: usize },
    DuplicateName,
    MissingRequired,
    BadArgument { arg: usize, param: ParamId },
}

impl Binder<'_> {
    /// Bind each argument's value without a target type.
    pub(super) fn bind_arg_values(&mut self, args: &[SynArg]) -> SmallVec<[ArgValue; 4]> {
        args.iter()
            .map(|arg| ArgValue {
                op: self.bind_expr(arg.value),
                name: arg.name,
                span: arg.span,
            })
            .collect()
    }

    /// Pick the candidate `args` bind to, or report why none applies.
    pub(super) fn resolve_overload(
        &mut self,
        candidates: &[MethodId],
        args: &[ArgValue],
        site: CallSite,
    ) -> Option<Resolved> {
        let outcomes: SmallVec<[Applicability; 4]> = candidates
            .iter()
            .map(|&method| self.applicability(method, args, site))
            .collect();

        let applicable: SmallVec<[&Resolved; 4]> = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                Applicability::Applicable(resolved) => Some(resolved),
                _ => None,
            })
            .collect();

        if applicable.is_empty() {
            self.report_inapplicable(candidates, &outcomes, args, site);
            return None;
        }

        let best = applicable.iter().position(|a| {
            applicable
                .iter()
                .all(|b| std::ptr::eq(*a, *b) || self.is_better(a, b))
        });
        match best {
            Some(index) => {
                let resolved = applicable[index].clone();
                trace!(method = resolved.method.raw(), "overload resolved");
                Some(resolved)
            }
            None => {
                let first = self.signature(applicable[0].method);
                let second = self.signature(applicable[1].method);
                self.report(ambiguous_call(site.span(), &first, &second));
                None
            }
        }
    }

    fn applicability(&self, method: MethodId, args: &[ArgValue], site: CallSite) -> Applicability {
        let all = &self.symbols.method(method).params;
        let (params, elements_param) = match site {
            CallSite::Builder { .. } => match all.split_last() {
                Some((last, rest)) => (rest, Some(*last)),
                None => return Applicability::TooManyArguments,
            },
            _ => (all.as_slice(), None),
        };
        if args.len() > params.len() {
            return Applicability::TooManyArguments;
        }

        // slot index -> written argument index
        let mut bound: SmallVec<[Option<usize>; 4]> = smallvec![None; params.len()];
        let mut slots: SmallVec<[usize; 4]> = SmallVec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let slot = match arg.name {
                None => i,
                Some(name) => match params
                    .iter()
                    .position(|&p| self.symbols.param(p).name == name)
                {
                    Some(slot) => slot,
                    None => return Applicability::UnknownName { arg: i },
                },
            };
            if bound[slot].is_some() {
                return Applicability::DuplicateName;
            }
            bound[slot] = Some(i);
            slots.push(slot);
        }

        let mut defaults = SmallVec::new();
        for (slot, arg) in bound.iter().enumerate() {
            if arg.is_some() {
                continue;
            }
            if self.symbols.param(params[slot]).default.is_none() {
                return Applicability::MissingRequired;
            }
            defaults.push(params[slot]);
        }

        let mut explicit = SmallVec::new();
        for (i, arg) in args.iter().enumerate() {
            let param = params[slots[i]];
            let conversion = self.classify(arg.op, self.symbols.param(param).ty);
            if !conversion.exists() {
                return Applicability::BadArgument { arg: i, param };
            }
            explicit.push((param, conversion));
        }

        Applicability::Applicable(Resolved {
            method,
            explicit,
            defaults,
            elements_param,
        })
    }

    /// `a` is better than `b` when no argument converts worse and at least
    /// one converts better, or when all tie and `a` relies on fewer defaults.
    fn is_better(&self, a: &Resolved, b: &Resolved) -> bool {
        let mut any_better = false;
        for (&(pa, ca), &(pb, cb)) in a.explicit.iter().zip(&b.explicit) {
            let ta = self.symbols.param(pa).ty;
            let tb = self.symbols.param(pb).ty;
            match self.compare_argument(ca, ta, cb, tb) {
                Ordering::Greater => return false,
                Ordering::Less => any_better = true,
                Ordering::Equal => {}
            }
        }
        any_better || a.defaults.len() < b.defaults.len()
    }

    /// Identity beats any other conversion; between two non-identity
    /// conversions the more specific target wins.
    fn compare_argument(
        &self,
        a: Conversion,
        a_ty: TypeId,
        b: Conversion,
        b_ty: TypeId,
    ) -> Ordering {
        if a_ty == b_ty {
            return Ordering::Equal;
        }
        let by_rank = conversion_rank(a).cmp(&conversion_rank(b));
        if by_rank != Ordering::Equal || a.is_identity() {
            return by_rank;
        }
        match (self.converts(a_ty, b_ty), self.converts(b_ty, a_ty)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }

    /// Report the most useful reason no candidate applied:
    /// - no candidate takes that many arguments: arity error
    /// - some candidate rejects an argument's type: CS1503 for the first
    /// - only names failed to match: CS1739
    /// - otherwise an arity error
    fn report_inapplicable(
        &mut self,
        candidates: &[MethodId],
        outcomes: &[Applicability],
        args: &[ArgValue],
        site: CallSite,
    ) {
        let all_too_many = outcomes
            .iter()
            .all(|o| matches!(o, Applicability::TooManyArguments));
        if !all_too_many {
            let bad = outcomes.iter().find_map(|o| match *o {
                Applicability::BadArgument { arg, param } => Some((arg, param)),
                _ => None,
            });
            if let Some((arg, param)) = bad {
                let value = args[arg].op;
                let param_ty = self.symbols.param(param).ty;
                let from = self.type_name(self.ops.ty(value));
                let to = self.type_name(Some(param_ty));
                let diag = argument_mismatch(self.ops.span(value), arg + 1, &from, &to);
                self.report_about(diag, &[self.ops.ty(value), Some(param_ty)]);
                return;
            }
            let unknown = outcomes.iter().find_map(|o| match *o {
                Applicability::UnknownName { arg } => Some(arg),
                _ => None,
            });
            if let Some(arg) = unknown {
                let written = &args[arg];
                let name = written.name.map_or("", |n| self.interner.lookup(n));
                let name_len = u32::try_from(name.len()).unwrap_or(u32::MAX);
                let at = Span::new(
                    written.span.start,
                    written.span.start.saturating_add(name_len),
                );
                let method = self.site_method_name(candidates, site);
                self.report(unknown_named_argument(at, &method, name));
                return;
            }
        }
        self.report_arity(candidates, args.len(), site);
    }

    fn report_arity(&mut self, candidates: &[MethodId], count: usize, site: CallSite) {
        let diag = match site {
            CallSite::Constructor { ty, arity_span, .. } => {
                constructor_arity_mismatch(arity_span, &self.type_name(Some(ty)), count)
            }
            CallSite::Builder { span } => {
                let method = self.site_method_name(candidates, site);
                builder_arity_mismatch(span, &method, count)
            }
            CallSite::Method { span } => {
                let method = self.site_method_name(candidates, site);
                method_arity_mismatch(span, &method, count)
            }
        };
        self.report(diag);
    }

    /// Name a method the way resolution errors show it: the type's simple
    /// name for constructors (`List`), the method name otherwise.
    fn site_method_name(&self, candidates: &[MethodId], site: CallSite) -> String {
        if let CallSite::Constructor { ty, .. } = site {
            if let Some(named) = self.types.named_type(ty) {
                let full = self.interner.lookup(named.name);
                return full.rsplit('.').next().unwrap_or(full).to_owned();
            }
            return self.type_name(Some(ty));
        }
        candidates.first().map_or_else(String::new, |&m| {
            self.interner.lookup(self.symbols.method(m).name).to_owned()
        })
    }

    fn signature(&self, method: MethodId) -> String {
        self.symbols
            .display_method(method, self.types, self.interner)
            .to_string()
    }

    /// Build the `Argument` nodes for a resolved call:
    /// written arguments in written order, then defaulted parameters in
    /// parameter order, then the builder's elements placeholder.
    pub(super) fn push_arguments(
        &mut self,
        resolved: &Resolved,
        args: &[ArgValue],
        site: CallSite,
        collection_span: Span,
    ) -> SmallVec<[OpId; 4]> {
        let mut out = SmallVec::with_capacity(args.len() + resolved.defaults.len() + 1);
        for (arg, &(param, conversion)) in args.iter().zip(&resolved.explicit) {
            let target = self.symbols.param(param).ty;
            let value = self.apply_conversion(arg.op, target, conversion);
            out.push(self.push_argument(ArgumentKind::Explicit, param, value, arg.span, false));
        }
        let default_span = site.span();
        for &param in &resolved.defaults {
            let symbol = self.symbols.param(param);
            let literal = OpNode::new(OpKind::Literal, Some(symbol.ty), default_span)
                .with_constant(symbol.default)
                .implicit();
            let value = self.push(literal);
            out.push(self.push_argument(
                ArgumentKind::DefaultValue,
                param,
                value,
                default_span,
                true,
            ));
        }
        if let Some(param) = resolved.elements_param {
            let ty = self.symbols.param(param).ty;
            let placeholder = OpNode::new(
                OpKind::CollectionElementsPlaceholder,
                Some(ty),
                collection_span,
            )
            .implicit();
            let value = self.push(placeholder);
            out.push(self.push_argument(
                ArgumentKind::Explicit,
                param,
                value,
                collection_span,
                true,
            ));
        }
        out
    }

    fn push_argument(
        &mut self,
        kind: ArgumentKind,
        param: ParamId,
        value: OpId,
        span: Span,
        implicit: bool,
    ) -> OpId {
        let mut node = OpNode::new(
            OpKind::Argument {
                kind,
                param,
                value,
                in_conversion: Conversion::IDENTITY,
                out_conversion: Conversion::IDENTITY,
            },
            None,
            span,
        );
        if implicit {
            node = node.implicit();
        }
        self.push(node)
    }
}

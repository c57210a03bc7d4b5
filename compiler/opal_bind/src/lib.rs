//! IR builder: resolved syntax to operation trees.
//!
//! Walks one body of resolved syntax ([`opal_ir::syntax`]) and emits the
//! typed operation tree the flow builder and tooling consume:
//!
//! - array creation with explicit, implicit and mismatched sizes
//! - collection literals, including `with(...)` construct arguments bound
//!   by overload resolution against constructors or builder factories
//! - implicit conversions at assignment, argument and element positions
//! - every other expression and statement kind a body can contain
//!
//! Binding never fails. Errors are recovered locally: the tree keeps the
//! user's operands, the affected operations are flagged invalid, and a
//! [`Diagnostic`] is returned alongside the tree in [`BoundBody`].

mod binder;
mod convert;
pub mod testing;

use opal_diagnostic::Diagnostic;
use opal_ir::{
    OpArena, OpId, StringInterner, SymbolTable, SynArena, SynExprId, SynStmtId, TypeId, TypePool,
};

use binder::Binder;

pub use convert::{classify_standard, convert_constant, ConversionOracle, StandardConversions};

/// Options for binding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindOptions {
    /// Report initializer lengths that disagree with constant sizes.
    pub check_array_lengths: bool,
    /// Report diagnostics that only restate an earlier resolution failure
    /// (they mention the error type `?`).
    pub report_follow_on: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        BindOptions {
            check_array_lengths: true,
            report_follow_on: true,
        }
    }
}

/// The read-only inputs of a bind: resolved syntax plus the tables it refers to.
#[derive(Copy, Clone)]
pub struct BindContext<'a> {
    pub syntax: &'a SynArena,
    pub types: &'a TypePool,
    pub symbols: &'a SymbolTable,
    pub interner: &'a StringInterner,
}

impl<'a> BindContext<'a> {
    pub fn new(
        syntax: &'a SynArena,
        types: &'a TypePool,
        symbols: &'a SymbolTable,
        interner: &'a StringInterner,
    ) -> Self {
        BindContext {
            syntax,
            types,
            symbols,
            interner,
        }
    }
}

/// Output of a bind: the operation tree and its diagnostics.
#[derive(Clone, Debug)]
pub struct BoundBody {
    pub ops: OpArena,
    pub root: OpId,
    /// Diagnostics in the order they were reported.
    pub diagnostics: Vec<Diagnostic>,
}

impl BoundBody {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Bind a method, local function or lambda body.
pub fn bind_body(ctx: &BindContext<'_>, body: SynStmtId, options: &BindOptions) -> BoundBody {
    bind_body_with(ctx, body, options, &StandardConversions)
}

/// Bind a body, classifying conversions with `oracle`.
pub fn bind_body_with(
    ctx: &BindContext<'_>,
    body: SynStmtId,
    options: &BindOptions,
    oracle: &dyn ConversionOracle,
) -> BoundBody {
    let mut binder = Binder::new(ctx, options, oracle);
    let root = binder.bind_body(body);
    binder.finish(root)
}

/// Bind a single expression.
///
/// With a `target`, the expression is converted to it the way an
/// initializer or assignment would (collection literals get their implicit
/// collection conversion).
pub fn bind_expr(
    ctx: &BindContext<'_>,
    expr: SynExprId,
    target: Option<TypeId>,
    options: &BindOptions,
) -> BoundBody {
    bind_expr_with(ctx, expr, target, options, &StandardConversions)
}

/// Bind a single expression, classifying conversions with `oracle`.
pub fn bind_expr_with(
    ctx: &BindContext<'_>,
    expr: SynExprId,
    target: Option<TypeId>,
    options: &BindOptions,
    oracle: &dyn ConversionOracle,
) -> BoundBody {
    let mut binder = Binder::new(ctx, options, oracle);
    let root = match target {
        Some(target) => binder.bind_expr_to(expr, target),
        None => binder.bind_expr(expr),
    };
    binder.finish(root)
}

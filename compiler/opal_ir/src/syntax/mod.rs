//! Resolved syntax: the input of the IR builder.
//!
//! The upstream front end (parser, name lookup, overload resolution for
//! ordinary calls, constant folding) is out of scope for this workspace. Its
//! output is modeled here as an arena of syntax nodes that already carry
//! their resolved type, constant value and symbols.
//!
//! Collection literals are the exception: their construct arguments are
//! resolved by the IR builder itself, because binding `with(...)` depends on
//! the target type the literal converts to.

use crate::{to_u16, to_u32};
use crate::{ConstantValue, LocalId, MethodId, Name, ParamId, Span, TypeId};

define_index!(
    /// Index of an expression in a [`SynArena`].
    SynExprId
);
define_index!(
    /// Index of a statement in a [`SynArena`].
    SynStmtId
);
define_range!(
    /// Range of expression ids (sizes, elements, initializer entries).
    SynRange
);
define_range!(
    /// Range of call/`with(...)` arguments.
    SynArgRange
);
define_range!(
    /// Range of statement ids (block bodies).
    SynStmtRange
);
define_range!(
    /// Range of catch clauses.
    SynCatchRange
);

/// Binary operators, shared with the operation tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// `&&`
    ConditionalAnd,
    /// `||`
    ConditionalOr,
}

impl BinaryOp {
    /// Short-circuiting operators need their own blocks when lowered.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::ConditionalAnd | BinaryOp::ConditionalOr)
    }

    /// Name used in tree dumps (`BinaryOperatorKind.Add`).
    pub fn dump_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Subtract => "Subtract",
            BinaryOp::Multiply => "Multiply",
            BinaryOp::Divide => "Divide",
            BinaryOp::Equals => "Equals",
            BinaryOp::NotEquals => "NotEquals",
            BinaryOp::LessThan => "LessThan",
            BinaryOp::LessThanOrEqual => "LessThanOrEqual",
            BinaryOp::GreaterThan => "GreaterThan",
            BinaryOp::GreaterThanOrEqual => "GreaterThanOrEqual",
            BinaryOp::ConditionalAnd => "ConditionalAnd",
            BinaryOp::ConditionalOr => "ConditionalOr",
        }
    }
}

/// A call or `with(...)` argument, optionally named.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SynArg {
    pub name: Option<Name>,
    pub value: SynExprId,
    pub span: Span,
}

/// The `with(...)` clause of a collection literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WithClause {
    pub args: SynArgRange,
    pub span: Span,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SynExprKind {
    Literal(ConstantValue),
    Local(LocalId),
    Param(ParamId),
    /// Invocation whose overload was already picked by the resolver.
    Call {
        method: MethodId,
        receiver: Option<SynExprId>,
        args: SynArgRange,
    },
    Binary {
        op: BinaryOp,
        left: SynExprId,
        right: SynExprId,
    },
    Not(SynExprId),
    Conditional {
        cond: SynExprId,
        when_true: SynExprId,
        when_false: SynExprId,
    },
    Coalesce {
        left: SynExprId,
        right: SynExprId,
    },
    /// `receiver?.access`. `access` reaches the tested receiver through a
    /// [`SynExprKind::ConditionalReceiver`]; in a chain `a?.b?.c` the access
    /// is itself a conditional access.
    ConditionalAccess {
        receiver: SynExprId,
        access: SynExprId,
    },
    /// The non-null receiver inside a conditional access.
    ConditionalReceiver,
    Assign {
        target: SynExprId,
        value: SynExprId,
    },
    /// `new T[s0, s1] { ... }`. `sizes` is empty when the brackets are empty.
    ArrayCreation {
        elem: TypeId,
        rank: u8,
        sizes: SynRange,
        initializer: Option<SynExprId>,
    },
    /// `new[] { ... }`, typed by the resolver's best common type.
    ImplicitArrayCreation { initializer: SynExprId },
    /// A brace list `{ a, b }`, possibly nested.
    Initializer { elements: SynRange },
    /// `[with(...), e1, e2]`; the node's type is the conversion target.
    Collection {
        with_clause: Option<WithClause>,
        elements: SynRange,
    },
    Lambda { method: MethodId, body: SynStmtId },
    /// Unbindable expression; children are kept for recovery.
    Error { children: SynRange },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SynExpr {
    pub kind: SynExprKind,
    pub span: Span,
    /// Resolved type; `None` for typeless expressions such as `null`.
    pub ty: Option<TypeId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SynCatch {
    /// `None` for a bare `catch`.
    pub exception_type: Option<TypeId>,
    pub local: Option<LocalId>,
    pub body: SynStmtId,
    pub span: Span,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SynStmtKind {
    Expr(SynExprId),
    LocalDecl {
        local: LocalId,
        init: Option<SynExprId>,
    },
    Block(SynStmtRange),
    If {
        cond: SynExprId,
        then_branch: SynStmtId,
        else_branch: Option<SynStmtId>,
    },
    While {
        cond: SynExprId,
        body: SynStmtId,
    },
    DoWhile {
        body: SynStmtId,
        cond: SynExprId,
    },
    Labeled {
        label: Name,
        body: SynStmtId,
    },
    Goto(Name),
    Break,
    Continue,
    Return(Option<SynExprId>),
    Throw(Option<SynExprId>),
    Try {
        body: SynStmtId,
        catches: SynCatchRange,
        finally: Option<SynStmtId>,
    },
    LocalFunction {
        method: MethodId,
        body: SynStmtId,
    },
    Empty,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SynStmt {
    pub kind: SynStmtKind,
    pub span: Span,
}

/// Arena holding one compilation unit's resolved syntax.
#[derive(Clone, Debug, Default)]
pub struct SynArena {
    exprs: Vec<SynExpr>,
    stmts: Vec<SynStmt>,
    expr_lists: Vec<SynExprId>,
    args: Vec<SynArg>,
    stmt_lists: Vec<SynStmtId>,
    catches: Vec<SynCatch>,
}

impl SynArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, kind: SynExprKind, span: Span, ty: Option<TypeId>) -> SynExprId {
        let id = SynExprId::new(to_u32(self.exprs.len(), "syntax expressions"));
        self.exprs.push(SynExpr { kind, span, ty });
        id
    }

    pub fn alloc_stmt(&mut self, kind: SynStmtKind, span: Span) -> SynStmtId {
        let id = SynStmtId::new(to_u32(self.stmts.len(), "syntax statements"));
        self.stmts.push(SynStmt { kind, span });
        id
    }

    #[inline]
    pub fn expr(&self, id: SynExprId) -> &SynExpr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: SynStmtId) -> &SynStmt {
        &self.stmts[id.index()]
    }

    pub fn push_exprs(&mut self, ids: &[SynExprId]) -> SynRange {
        if ids.is_empty() {
            return SynRange::EMPTY;
        }
        let start = to_u32(self.expr_lists.len(), "syntax expression lists");
        self.expr_lists.extend_from_slice(ids);
        SynRange::new(start, to_u16(ids.len(), "syntax expression list"))
    }

    pub fn exprs(&self, range: SynRange) -> &[SynExprId] {
        let start = range.start as usize;
        &self.expr_lists[start..start + range.len()]
    }

    pub fn push_args(&mut self, args: &[SynArg]) -> SynArgRange {
        if args.is_empty() {
            return SynArgRange::EMPTY;
        }
        let start = to_u32(self.args.len(), "syntax arguments");
        self.args.extend_from_slice(args);
        SynArgRange::new(start, to_u16(args.len(), "syntax argument list"))
    }

    pub fn args(&self, range: SynArgRange) -> &[SynArg] {
        let start = range.start as usize;
        &self.args[start..start + range.len()]
    }

    pub fn push_stmts(&mut self, ids: &[SynStmtId]) -> SynStmtRange {
        if ids.is_empty() {
            return SynStmtRange::EMPTY;
        }
        let start = to_u32(self.stmt_lists.len(), "syntax statement lists");
        self.stmt_lists.extend_from_slice(ids);
        SynStmtRange::new(start, to_u16(ids.len(), "syntax statement list"))
    }

    pub fn stmts(&self, range: SynStmtRange) -> &[SynStmtId] {
        let start = range.start as usize;
        &self.stmt_lists[start..start + range.len()]
    }

    pub fn push_catches(&mut self, catches: &[SynCatch]) -> SynCatchRange {
        if catches.is_empty() {
            return SynCatchRange::EMPTY;
        }
        let start = to_u32(self.catches.len(), "catch clauses");
        self.catches.extend_from_slice(catches);
        SynCatchRange::new(start, to_u16(catches.len(), "catch clause list"))
    }

    pub fn catches(&self, range: SynCatchRange) -> &[SynCatch] {
        let start = range.start as usize;
        &self.catches[start..start + range.len()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}

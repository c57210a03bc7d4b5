//! Operation trees.
//!
//! An operation tree is the typed, semantically resolved form of a method
//! body. Every node carries a kind, an optional result type, an optional
//! constant value, `INVALID`/`IMPLICIT` flags and a span. Nodes live in an
//! [`OpArena`] and refer to each other only by [`OpId`].
//!
//! The same arena type holds the statements of a control-flow graph: the
//! flow builder rewrites operations into a fresh arena, adding the
//! flow-only kinds ([`OpKind::FlowCapture`], [`OpKind::FlowCaptureReference`],
//! [`OpKind::IsNull`], [`OpKind::CaughtException`], [`OpKind::DefaultValue`],
//! [`OpKind::FlowAnonymousFunction`]).

mod arena;
mod print;
mod visit;

use std::fmt;

pub use arena::OpArena;
pub use print::{print_tree, syntax_snippet, write_tree, PrintContext};
pub use visit::{walk_op, OpVisitor};

use crate::{BinaryOp, ConstantValue, LocalId, MethodId, Name, ParamId, Span, TypeId};

define_index!(
    /// Index of an operation in an [`OpArena`].
    OpId
);
define_range!(
    /// Range of operation ids in an arena's flat child list.
    OpRange
);
define_range!(
    /// Range of local symbols declared by a block or region.
    LocalRange
);

/// Identifier of a flow-capture temporary, unique within one graph.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct CaptureId(u32);

impl CaptureId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags::bitflags! {
    /// Per-node flags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct OpFlags: u8 {
        /// A semantic error was reported within or at this node.
        const INVALID = 1 << 0;
        /// Synthesized by the compiler; not written by the user.
        const IMPLICIT = 1 << 1;
    }
}

// ── Conversions ─────────────────────────────────────────────────────

/// Classification of an implicit conversion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    Identity,
    ImplicitNumeric,
    ImplicitReference,
    /// `T` to `T?`.
    ImplicitNullable,
    /// `null` to `T?`.
    NullLiteral,
    /// Value type to `object` or an implemented interface.
    Boxing,
    /// A collection literal converted to its target type.
    CollectionExpression,
    NoConversion,
}

impl ConversionKind {
    pub fn name(self) -> &'static str {
        match self {
            ConversionKind::Identity => "Identity",
            ConversionKind::ImplicitNumeric => "ImplicitNumeric",
            ConversionKind::ImplicitReference => "ImplicitReference",
            ConversionKind::ImplicitNullable => "ImplicitNullable",
            ConversionKind::NullLiteral => "NullLiteral",
            ConversionKind::Boxing => "Boxing",
            ConversionKind::CollectionExpression => "CollectionExpression",
            ConversionKind::NoConversion => "NoConversion",
        }
    }
}

/// A classified conversion plus the user-defined operator implementing it, if any.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Conversion {
    pub kind: ConversionKind,
    pub method: Option<MethodId>,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion::of(ConversionKind::Identity);
    pub const NONE: Conversion = Conversion::of(ConversionKind::NoConversion);

    pub const fn of(kind: ConversionKind) -> Self {
        Conversion { kind, method: None }
    }

    pub fn exists(self) -> bool {
        self.kind != ConversionKind::NoConversion
    }

    pub fn is_identity(self) -> bool {
        self.kind == ConversionKind::Identity
    }

    pub fn is_numeric(self) -> bool {
        self.kind == ConversionKind::ImplicitNumeric
    }

    pub fn is_reference(self) -> bool {
        self.kind == ConversionKind::ImplicitReference
    }

    pub fn is_user_defined(self) -> bool {
        self.method.is_some()
    }

    /// Every conversion this core classifies, except `NoConversion`, is implicit.
    pub fn is_implicit(self) -> bool {
        self.exists()
    }
}

// ── Operation kinds ─────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    Explicit,
    /// Synthesized from an omitted optional parameter.
    DefaultValue,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BranchKind {
    GoTo,
    Break,
    Continue,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
}

/// The closed set of operation kinds.
///
/// Optional children use [`OpId::INVALID`]; child sequences use [`OpRange`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpKind {
    /// Value is in the node's constant column.
    Literal,
    LocalReference {
        local: LocalId,
        is_declaration: bool,
    },
    ParameterReference(ParamId),
    Invocation {
        method: MethodId,
        instance: OpId,
        args: OpRange,
    },
    Argument {
        kind: ArgumentKind,
        param: ParamId,
        value: OpId,
        in_conversion: Conversion,
        out_conversion: Conversion,
    },
    Conversion {
        operand: OpId,
        conversion: Conversion,
    },
    Binary {
        op: BinaryOp,
        left: OpId,
        right: OpId,
    },
    Unary {
        op: UnaryOp,
        operand: OpId,
    },
    /// `?:` when typed, `if` when the type is `None`.
    Conditional {
        cond: OpId,
        when_true: OpId,
        when_false: OpId,
    },
    Coalesce {
        value: OpId,
        when_null: OpId,
        value_conversion: Conversion,
    },
    IsNull {
        operand: OpId,
    },
    /// `operation?.when_not_null`; typed as the access, made nullable when
    /// the access is a non-nullable value type.
    ConditionalAccess {
        operation: OpId,
        when_not_null: OpId,
    },
    /// The tested receiver inside `when_not_null`.
    ConditionalAccessInstance,
    /// `default(T)`. Produced for the null path of a conditional access.
    DefaultValue,
    /// `sizes` is empty for a missing-size error.
    ArrayCreation {
        sizes: OpRange,
        initializer: OpId,
    },
    ArrayInitializer {
        elements: OpRange,
    },
    /// `construct_args` holds `Argument` nodes when `construct_method`
    /// resolved, and the raw operands otherwise.
    CollectionExpression {
        construct_method: Option<MethodId>,
        construct_args: OpRange,
        elements: OpRange,
    },
    /// Stands for the span of elements passed to a builder factory.
    CollectionElementsPlaceholder,
    SimpleAssignment {
        target: OpId,
        value: OpId,
    },
    VariableDeclaration {
        local: LocalId,
        initializer: OpId,
    },
    ExpressionStatement {
        expr: OpId,
    },
    Block {
        ops: OpRange,
        locals: LocalRange,
    },
    Labeled {
        label: Name,
        body: OpId,
    },
    Branch {
        kind: BranchKind,
        label: Option<Name>,
    },
    WhileLoop {
        cond: OpId,
        body: OpId,
        test_at_top: bool,
    },
    Return {
        value: OpId,
    },
    /// `value` is `INVALID` for a rethrow.
    Throw {
        value: OpId,
    },
    Try {
        body: OpId,
        catches: OpRange,
        finally: OpId,
    },
    CatchClause {
        exception_type: TypeId,
        local: Option<LocalId>,
        handler: OpId,
    },
    /// The exception object at the start of a catch handler.
    CaughtException,
    LocalFunction {
        method: MethodId,
        body: OpId,
    },
    AnonymousFunction {
        method: MethodId,
        body: OpId,
    },
    /// A lambda inside a flow graph; `graph` indexes the parent's nested graphs.
    FlowAnonymousFunction {
        method: MethodId,
        graph: u32,
    },
    FlowCapture {
        id: CaptureId,
        value: OpId,
    },
    FlowCaptureReference {
        id: CaptureId,
    },
    Invalid {
        children: OpRange,
    },
    Empty,
}

impl OpKind {
    /// Operations that only ever appear at statement level.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            OpKind::ExpressionStatement { .. }
                | OpKind::VariableDeclaration { .. }
                | OpKind::Block { .. }
                | OpKind::Labeled { .. }
                | OpKind::Branch { .. }
                | OpKind::WhileLoop { .. }
                | OpKind::Return { .. }
                | OpKind::Throw { .. }
                | OpKind::Try { .. }
                | OpKind::LocalFunction { .. }
                | OpKind::Empty
        )
    }
}

/// One operation, as pushed into or read from an [`OpArena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpNode {
    pub kind: OpKind,
    pub ty: Option<TypeId>,
    pub constant: Option<ConstantValue>,
    pub flags: OpFlags,
    pub span: Span,
}

impl OpNode {
    pub fn new(kind: OpKind, ty: Option<TypeId>, span: Span) -> Self {
        OpNode {
            kind,
            ty,
            constant: None,
            flags: OpFlags::empty(),
            span,
        }
    }

    #[must_use]
    pub fn with_constant(mut self, constant: Option<ConstantValue>) -> Self {
        self.constant = constant;
        self
    }

    #[must_use]
    pub fn implicit(mut self) -> Self {
        self.flags |= OpFlags::IMPLICIT;
        self
    }

    #[must_use]
    pub fn invalid_if(mut self, invalid: bool) -> Self {
        self.flags.set(OpFlags::INVALID, invalid);
        self
    }
}

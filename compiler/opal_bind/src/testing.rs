#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test fixture: panics give clear failure messages"
)]
//! Test fixture for building resolved syntax by hand.
//!
//! There is no parser in this workspace, so tests write the source text a
//! parser would have seen and then allocate the syntax nodes it would have
//! produced. [`Fixture`] keeps a forward cursor into that text so spans can
//! be located in reading order:
//!
//! ```text
//! let mut f = Fixture::new("new int[2] { 1, 2 }");
//! let new = f.find("new");
//! let size = f.int(2);
//! let open = f.find("{");
//! let one = f.int(1);
//! let two = f.int(2);
//! let close = f.find("}");
//! let init = f.initializer(open, &[one, two], close);
//! let creation = f.array_creation(new, TypeId::INT32, 1, &[size], Some(init), close);
//! let bound = f.bind_expr(creation, None);
//! ```
//!
//! It also registers the well-known collection types (`List<T>`,
//! `HashSet<T>`, the collection interfaces) with the constructors the
//! tests rely on.

use rustc_hash::FxHashSet;

use opal_diagnostic::{Diagnostic, ErrorCode};
use opal_ir::syntax::{
    SynArg, SynArgRange, SynCatch, SynCatchRange, SynExprKind, SynRange, SynStmtKind,
    SynStmtRange, WithClause,
};
use opal_ir::operation::{print_tree, PrintContext};
use opal_ir::{
    CollectionBuilder, CollectionKind, ConstantValue, DeclKind, LocalId, MethodId,
    MethodKind, MethodSymbol, NamedType, OpId, OpKind, ParamId, ParamSymbol, Span,
    StringInterner, SymbolTable, SynArena, SynExprId, SynStmtId, TypeId, TypePool,
};

use crate::{BindContext, BindOptions, BoundBody};

const GENERIC: &str = "System.Collections.Generic.";

/// Source text plus the tables a resolver would have produced for it.
pub struct Fixture {
    pub source: String,
    pub interner: StringInterner,
    pub types: TypePool,
    pub symbols: SymbolTable,
    pub syntax: SynArena,
    cursor: usize,
    /// Types whose constructors are already registered.
    registered: FxHashSet<TypeId>,
}

impl Fixture {
    pub fn new(source: &str) -> Self {
        let interner = StringInterner::new();
        let symbols = SymbolTable::new(&interner);
        Fixture {
            source: source.to_owned(),
            interner,
            types: TypePool::new(),
            symbols,
            syntax: SynArena::new(),
            cursor: 0,
            registered: FxHashSet::default(),
        }
    }

    // ── Spans ───────────────────────────────────────────────────────

    /// Locate the next occurrence of `text` at or after the cursor and move
    /// the cursor past it.
    pub fn find(&mut self, text: &str) -> Span {
        let offset = self.source[self.cursor..]
            .find(text)
            .unwrap_or_else(|| panic!("`{text}` not found after offset {}", self.cursor));
        let start = self.cursor + offset;
        self.cursor = start + text.len();
        span(start, self.cursor)
    }

    /// Move the cursor past the next occurrence of `text`.
    pub fn skip(&mut self, text: &str) {
        self.find(text);
    }

    /// First occurrence of `text` anywhere, without moving the cursor.
    pub fn span_of(&self, text: &str) -> Span {
        let start = self
            .source
            .find(text)
            .unwrap_or_else(|| panic!("`{text}` not found"));
        span(start, start + text.len())
    }

    /// Move the cursor back to the start of the source.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn expr_span(&self, id: SynExprId) -> Span {
        self.syntax.expr(id).span
    }

    pub fn stmt_span(&self, id: SynStmtId) -> Span {
        self.syntax.stmt(id).span
    }

    pub fn name(&self, text: &str) -> opal_ir::Name {
        self.interner.intern(text)
    }

    // ── Symbols ─────────────────────────────────────────────────────

    /// A parameter of the body under test.
    pub fn param(&mut self, name: &str, ty: TypeId) -> ParamId {
        let param = self.param_symbol(name, ty, None);
        self.symbols.add_param(param)
    }

    pub fn param_symbol(
        &self,
        name: &str,
        ty: TypeId,
        default: Option<ConstantValue>,
    ) -> ParamSymbol {
        ParamSymbol {
            name: self.interner.intern(name),
            ty,
            default,
        }
    }

    /// Declare a local at the next occurrence of `name`.
    pub fn local(&mut self, name: &str, ty: TypeId) -> LocalId {
        let at = self.find(name);
        let name = self.interner.intern(name);
        self.symbols.add_local(name, ty, at)
    }

    /// A static method `C.name(params)`.
    pub fn method(&mut self, name: &str, ret: TypeId, params: &[ParamSymbol]) -> MethodId {
        let container = self.types.named(NamedType::class(self.interner.intern("C")));
        let name = self.interner.intern(name);
        self.symbols.add_static(container, name, ret, params)
    }

    /// A lambda or local function symbol.
    pub fn function(&mut self, kind: MethodKind, name: &str, ret: TypeId) -> MethodId {
        self.symbols.add_method(MethodSymbol {
            name: self.interner.intern(name),
            kind,
            container: None,
            return_type: Some(ret),
            params: Vec::new(),
        })
    }

    // ── Types ───────────────────────────────────────────────────────

    /// `System.Collections.Generic.<name><elem>` with the given shape.
    fn generic(
        &mut self,
        name: &str,
        elem: TypeId,
        decl: DeclKind,
        collection: Option<CollectionKind>,
        interfaces: &[TypeId],
    ) -> TypeId {
        let mut named = NamedType::class(self.interner.intern(&format!("{GENERIC}{name}")))
            .with_args(&[elem])
            .with_decl(decl);
        for &iface in interfaces {
            named = named.with_interface(iface);
        }
        if let Some(collection) = collection {
            named = named.with_collection(elem, collection);
        }
        self.types.named(named)
    }

    pub fn ienumerable(&mut self, elem: TypeId) -> TypeId {
        self.generic(
            "IEnumerable",
            elem,
            DeclKind::Interface,
            Some(CollectionKind::ReadOnlyInterface),
            &[],
        )
    }

    pub fn ireadonly_list(&mut self, elem: TypeId) -> TypeId {
        let enumerable = self.ienumerable(elem);
        self.generic(
            "IReadOnlyList",
            elem,
            DeclKind::Interface,
            Some(CollectionKind::ReadOnlyInterface),
            &[enumerable],
        )
    }

    pub fn equality_comparer(&mut self, elem: TypeId) -> TypeId {
        self.generic("IEqualityComparer", elem, DeclKind::Interface, None, &[])
    }

    /// `List<T>` with constructors `()`, `(int capacity)` and
    /// `(IEnumerable<T> collection)`.
    pub fn list(&mut self, elem: TypeId) -> TypeId {
        let enumerable = self.ienumerable(elem);
        let list = self.generic(
            "List",
            elem,
            DeclKind::Class,
            Some(CollectionKind::Concrete),
            &[enumerable],
        );
        if self.registered.insert(list) {
            let capacity = self.param_symbol("capacity", TypeId::INT32, None);
            let collection = self.param_symbol("collection", enumerable, None);
            self.symbols.add_constructor(list, &[]);
            self.symbols.add_constructor(list, &[capacity]);
            self.symbols.add_constructor(list, &[collection]);
        }
        list
    }

    /// `IList<T>`, built through `List<T>`.
    pub fn ilist(&mut self, elem: TypeId) -> TypeId {
        let backing = self.list(elem);
        let enumerable = self.ienumerable(elem);
        self.generic(
            "IList",
            elem,
            DeclKind::Interface,
            Some(CollectionKind::MutableInterface { backing }),
            &[enumerable],
        )
    }

    /// `HashSet<T>` with its six constructors, in declaration order:
    /// `()`, `(IEnumerable<T> collection)`, `(IEqualityComparer<T> comparer)`,
    /// `(int capacity)`, `(IEnumerable<T> collection, IEqualityComparer<T> comparer)`,
    /// `(int capacity, IEqualityComparer<T> comparer)`.
    pub fn hash_set(&mut self, elem: TypeId) -> TypeId {
        let enumerable = self.ienumerable(elem);
        let comparer_ty = self.equality_comparer(elem);
        let set = self.generic(
            "HashSet",
            elem,
            DeclKind::Class,
            Some(CollectionKind::Concrete),
            &[enumerable],
        );
        if self.registered.insert(set) {
            let collection = self.param_symbol("collection", enumerable, None);
            let comparer = self.param_symbol("comparer", comparer_ty, None);
            let capacity = self.param_symbol("capacity", TypeId::INT32, None);
            self.symbols.add_constructor(set, &[]);
            self.symbols.add_constructor(set, &[collection.clone()]);
            self.symbols.add_constructor(set, &[comparer.clone()]);
            self.symbols.add_constructor(set, &[capacity.clone()]);
            self.symbols.add_constructor(set, &[collection, comparer.clone()]);
            self.symbols.add_constructor(set, &[capacity, comparer]);
        }
        set
    }

    /// A concrete collection type `name` with the given constructors.
    pub fn collection_type(
        &mut self,
        name: &str,
        elem: TypeId,
        constructors: &[&[ParamSymbol]],
    ) -> TypeId {
        let ty = self.types.named(
            NamedType::class(self.interner.intern(name))
                .with_args(&[elem])
                .with_collection(elem, CollectionKind::Concrete),
        );
        if self.registered.insert(ty) {
            for params in constructors {
                self.symbols.add_constructor(ty, params);
            }
        }
        ty
    }

    /// A collection type `name` whose literals go through the static
    /// `builder.Create` overloads. Each overload gets a trailing
    /// `ReadOnlySpan<T> items` parameter.
    pub fn builder_type(
        &mut self,
        name: &str,
        builder: &str,
        elem: TypeId,
        overloads: &[&[ParamSymbol]],
    ) -> (TypeId, Vec<MethodId>) {
        let ty = self.types.named(
            NamedType::class(self.interner.intern(name))
                .with_args(&[elem])
                .with_collection(elem, CollectionKind::Concrete),
        );
        let container = self
            .types
            .named(NamedType::class(self.interner.intern(builder)));
        let items_ty = self.types.span(elem, true);
        let items = self.param_symbol("items", items_ty, None);
        let create = self.interner.intern("Create");
        let methods: Vec<MethodId> = overloads
            .iter()
            .map(|params| {
                let mut params = params.to_vec();
                params.push(items.clone());
                self.symbols.add_static(container, create, ty, &params)
            })
            .collect();
        self.symbols.set_collection_builder(
            ty,
            CollectionBuilder {
                container,
                methods: methods.clone(),
            },
        );
        (ty, methods)
    }

    // ── Expressions ─────────────────────────────────────────────────

    pub fn expr(&mut self, kind: SynExprKind, span: Span, ty: Option<TypeId>) -> SynExprId {
        self.syntax.alloc_expr(kind, span, ty)
    }

    fn literal(&mut self, text: &str, value: ConstantValue, ty: Option<TypeId>) -> SynExprId {
        let at = self.find(text);
        self.expr(SynExprKind::Literal(value), at, ty)
    }

    /// The next `value` in the source, as an `int` literal.
    pub fn int(&mut self, value: i32) -> SynExprId {
        self.literal(
            &value.to_string(),
            ConstantValue::Int32(value),
            Some(TypeId::INT32),
        )
    }

    /// The next `{value}L` in the source, as a `long` literal.
    pub fn long(&mut self, value: i64) -> SynExprId {
        self.literal(
            &format!("{value}L"),
            ConstantValue::Int64(value),
            Some(TypeId::INT64),
        )
    }

    /// The next `"text"` in the source.
    pub fn string(&mut self, text: &str) -> SynExprId {
        let value = ConstantValue::String(self.interner.intern(text));
        self.literal(&format!("\"{text}\""), value, Some(TypeId::STRING))
    }

    pub fn null(&mut self) -> SynExprId {
        self.literal("null", ConstantValue::Null, None)
    }

    pub fn bool(&mut self, value: bool) -> SynExprId {
        let text = if value { "true" } else { "false" };
        self.literal(text, ConstantValue::Bool(value), Some(TypeId::BOOL))
    }

    /// The next reference to `local`.
    pub fn local_ref(&mut self, local: LocalId) -> SynExprId {
        let symbol = self.symbols.local(local);
        let (name, ty) = (self.interner.lookup(symbol.name), symbol.ty);
        let at = self.find(name);
        self.expr(SynExprKind::Local(local), at, Some(ty))
    }

    /// The next reference to `param`.
    pub fn param_ref(&mut self, param: ParamId) -> SynExprId {
        let symbol = self.symbols.param(param);
        let (name, ty) = (self.interner.lookup(symbol.name), symbol.ty);
        let at = self.find(name);
        self.expr(SynExprKind::Param(param), at, Some(ty))
    }

    pub fn list_of(&mut self, ids: &[SynExprId]) -> SynRange {
        self.syntax.push_exprs(ids)
    }

    /// `{ elements }` between two already located braces.
    pub fn initializer(&mut self, open: Span, elements: &[SynExprId], close: Span) -> SynExprId {
        let elements = self.syntax.push_exprs(elements);
        self.expr(SynExprKind::Initializer { elements }, open.merge(close), None)
    }

    /// `new elem[sizes] initializer`, from `start` through `end`.
    pub fn array_creation(
        &mut self,
        start: Span,
        elem: TypeId,
        rank: u8,
        sizes: &[SynExprId],
        initializer: Option<SynExprId>,
        end: Span,
    ) -> SynExprId {
        let ty = self.types.array(elem, rank);
        let sizes = self.syntax.push_exprs(sizes);
        self.expr(
            SynExprKind::ArrayCreation {
                elem,
                rank,
                sizes,
                initializer,
            },
            start.merge(end),
            Some(ty),
        )
    }

    /// `new[] initializer`, typed `ty` by the resolver.
    pub fn implicit_array(
        &mut self,
        start: Span,
        initializer: SynExprId,
        ty: Option<TypeId>,
    ) -> SynExprId {
        let end = self.expr_span(initializer);
        self.expr(
            SynExprKind::ImplicitArrayCreation { initializer },
            start.merge(end),
            ty,
        )
    }

    /// A positional argument.
    pub fn arg(&self, value: SynExprId) -> SynArg {
        SynArg {
            name: None,
            value,
            span: self.expr_span(value),
        }
    }

    /// `name: value`, where `name` was located at `name_span`.
    pub fn named_arg(&self, name_span: Span, value: SynExprId) -> SynArg {
        let text = name_span
            .text(&self.source)
            .unwrap_or_else(|| panic!("name span {name_span:?} out of bounds"));
        SynArg {
            name: Some(self.interner.intern(text)),
            value,
            span: name_span.merge(self.expr_span(value)),
        }
    }

    pub fn args(&mut self, args: &[SynArg]) -> SynArgRange {
        self.syntax.push_args(args)
    }

    /// `with(args)` from the `with` keyword through the closing parenthesis.
    pub fn with_clause(&mut self, keyword: Span, args: &[SynArg], close: Span) -> WithClause {
        WithClause {
            args: self.syntax.push_args(args),
            span: keyword.merge(close),
        }
    }

    /// `[with(...), elements]` converted to `target`.
    pub fn collection(
        &mut self,
        open: Span,
        with_clause: Option<WithClause>,
        elements: &[SynExprId],
        close: Span,
        target: Option<TypeId>,
    ) -> SynExprId {
        let elements = self.syntax.push_exprs(elements);
        self.expr(
            SynExprKind::Collection {
                with_clause,
                elements,
            },
            open.merge(close),
            target,
        )
    }

    /// A call to `method` spanning `start` through `end`.
    pub fn call(
        &mut self,
        start: Span,
        method: MethodId,
        args: &[SynArg],
        end: Span,
    ) -> SynExprId {
        let ret = self.symbols.method(method).return_type;
        let args = self.syntax.push_args(args);
        self.expr(
            SynExprKind::Call {
                method,
                receiver: None,
                args,
            },
            start.merge(end),
            ret,
        )
    }

    // ── Statements ──────────────────────────────────────────────────

    pub fn stmt(&mut self, kind: SynStmtKind, span: Span) -> SynStmtId {
        self.syntax.alloc_stmt(kind, span)
    }

    pub fn stmts(&mut self, ids: &[SynStmtId]) -> SynStmtRange {
        self.syntax.push_stmts(ids)
    }

    pub fn catches(&mut self, catches: &[SynCatch]) -> SynCatchRange {
        self.syntax.push_catches(catches)
    }

    /// `{ stmts }` between two already located braces.
    pub fn block(&mut self, open: Span, stmts: &[SynStmtId], close: Span) -> SynStmtId {
        let stmts = self.syntax.push_stmts(stmts);
        self.stmt(SynStmtKind::Block(stmts), open.merge(close))
    }

    /// `T name = init;` from `start` through `end`.
    pub fn local_decl(
        &mut self,
        start: Span,
        local: LocalId,
        init: Option<SynExprId>,
        end: Span,
    ) -> SynStmtId {
        self.stmt(SynStmtKind::LocalDecl { local, init }, start.merge(end))
    }

    /// `expr;`, ending at `end`.
    pub fn expr_stmt(&mut self, expr: SynExprId, end: Span) -> SynStmtId {
        let start = self.expr_span(expr);
        self.stmt(SynStmtKind::Expr(expr), start.merge(end))
    }

    // ── Binding ─────────────────────────────────────────────────────

    pub fn context(&self) -> BindContext<'_> {
        BindContext::new(&self.syntax, &self.types, &self.symbols, &self.interner)
    }

    pub fn bind_expr(&self, expr: SynExprId, target: Option<TypeId>) -> BoundBody {
        self.bind_expr_with(expr, target, &BindOptions::default())
    }

    pub fn bind_expr_with(
        &self,
        expr: SynExprId,
        target: Option<TypeId>,
        options: &BindOptions,
    ) -> BoundBody {
        crate::bind_expr(&self.context(), expr, target, options)
    }

    pub fn bind_body(&self, body: SynStmtId) -> BoundBody {
        crate::bind_body(&self.context(), body, &BindOptions::default())
    }

    /// The operation tree under `root`, with syntax snippets.
    pub fn dump(&self, bound: &BoundBody, root: OpId) -> String {
        let ctx = PrintContext::new(&bound.ops, &self.types, &self.symbols, &self.interner)
            .with_source(&self.source);
        print_tree(&ctx, root)
    }

    /// The whole bound tree.
    pub fn dump_root(&self, bound: &BoundBody) -> String {
        self.dump(bound, bound.root)
    }

    /// Diagnostics rendered as `(line,col): error CSxxxx: message`.
    pub fn diagnostics(&self, bound: &BoundBody) -> Vec<String> {
        bound
            .diagnostics
            .iter()
            .map(|d| d.to_line(&self.source))
            .collect()
    }
}

/// Diagnostic codes in report order.
pub fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
    diagnostics.iter().map(|d| d.code).collect()
}

/// Look through the implicit conversions wrapping `op`.
pub fn strip_conversions(bound: &BoundBody, mut op: OpId) -> OpId {
    while let OpKind::Conversion { operand, .. } = bound.ops.kind(op) {
        if !bound.ops.is_implicit(op) {
            break;
        }
        op = operand;
    }
    op
}

fn span(start: usize, end: usize) -> Span {
    Span::try_from_range(start..end).unwrap_or_else(|e| panic!("span out of range: {e:?}"))
}

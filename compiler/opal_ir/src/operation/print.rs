//! Operation-tree printer.
//!
//! Renders operations in the indented dump format used by golden tests and
//! by the flow-graph dump:
//!
//! ```text
//! IArrayCreationOperation (OperationKind.ArrayCreation, Type: System.Int32[]) (Syntax: 'new int[2]')
//!   Dimension Sizes(1):
//!       ILiteralOperation (OperationKind.Literal, Type: System.Int32, Constant: 2) (Syntax: '2')
//!   Initializer:
//!     null
//! ```

use std::fmt::Write as _;

use super::{ArgumentKind, BranchKind, Conversion, OpArena, OpId, OpKind, UnaryOp};
use crate::{LocalId, StringInterner, SymbolTable, TypeId, TypePool};

/// Everything the printer needs to resolve ids into text.
#[derive(Copy, Clone)]
pub struct PrintContext<'a> {
    pub ops: &'a OpArena,
    pub types: &'a TypePool,
    pub symbols: &'a SymbolTable,
    pub interner: &'a StringInterner,
    /// Source text for the `(Syntax: '...')` column; omitted when `None`.
    pub source: Option<&'a str>,
    /// Print the conversion kind under each `Conversion:` line.
    pub conversion_kinds: bool,
    /// Renders the graph behind an `IFlowAnonymousFunctionOperation`, given
    /// its graph index and the header's indentation.
    pub nested_graph: Option<&'a dyn Fn(u32, usize, &mut String)>,
}

impl<'a> PrintContext<'a> {
    pub fn new(
        ops: &'a OpArena,
        types: &'a TypePool,
        symbols: &'a SymbolTable,
        interner: &'a StringInterner,
    ) -> Self {
        PrintContext {
            ops,
            types,
            symbols,
            interner,
            source: None,
            conversion_kinds: false,
            nested_graph: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_conversion_kinds(mut self) -> Self {
        self.conversion_kinds = true;
        self
    }

    #[must_use]
    pub fn with_nested_graphs(mut self, render: &'a dyn Fn(u32, usize, &mut String)) -> Self {
        self.nested_graph = Some(render);
        self
    }
}

/// Render the subtree rooted at `root`.
pub fn print_tree(ctx: &PrintContext<'_>, root: OpId) -> String {
    let mut out = String::new();
    write_tree(ctx, root, 0, &mut out);
    out
}

/// Append the subtree rooted at `root` to `out`, starting at `indent` columns.
pub fn write_tree(ctx: &PrintContext<'_>, root: OpId, indent: usize, out: &mut String) {
    let mut printer = TreePrinter { ctx, out };
    printer.node(root, indent);
}

/// Quote `text` the way dumps show syntax: short single lines in full,
/// anything else as the first and last eleven characters around ` ... `.
pub fn syntax_snippet(text: &str) -> String {
    let text = text.trim_matches(|c| c == '\r' || c == '\n');
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() <= 1 && text.chars().count() < 25 {
        return format!("'{text}'");
    }
    let first = lines.first().copied().unwrap_or_default();
    let last = lines.last().copied().unwrap_or_default();
    let head: String = first.chars().take(11).collect();
    let skip = last.chars().count().saturating_sub(11);
    let tail: String = last.chars().skip(skip).collect();
    format!("'{head} ... {tail}'")
}

struct TreePrinter<'c, 'a> {
    ctx: &'c PrintContext<'a>,
    out: &'c mut String,
}

impl TreePrinter<'_, '_> {
    fn pad(&mut self, indent: usize) {
        for _ in 0..indent {
            self.out.push(' ');
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        self.pad(indent);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn type_name(&self, ty: Option<TypeId>) -> String {
        match ty {
            Some(ty) => self.ctx.types.display(ty, self.ctx.interner).to_string(),
            None => "null".to_owned(),
        }
    }

    fn local_name(&self, local: LocalId) -> &'static str {
        self.ctx
            .interner
            .lookup(self.ctx.symbols.local(local).name)
    }

    fn local_decl(&self, local: LocalId) -> String {
        let symbol = self.ctx.symbols.local(local);
        format!(
            "{} {}",
            self.ctx.types.display(symbol.ty, self.ctx.interner),
            self.ctx.interner.lookup(symbol.name)
        )
    }

    fn common_conversion(conversion: Conversion) -> String {
        format!(
            "CommonConversion (Exists: {}, IsIdentity: {}, IsNumeric: {}, IsReference: {}, IsUserDefined: {}) (MethodSymbol: null)",
            bool_text(conversion.exists()),
            bool_text(conversion.is_identity()),
            bool_text(conversion.is_numeric()),
            bool_text(conversion.is_reference()),
            bool_text(conversion.is_user_defined()),
        )
    }

    /// `(OperationKind.X, Type: T, Constant: c, IsInvalid, IsImplicit) (Syntax: '...')`
    fn attributes(&self, id: OpId, kind_name: &str) -> String {
        let ops = self.ctx.ops;
        let mut text = format!(
            "(OperationKind.{kind_name}, Type: {}",
            self.type_name(ops.ty(id))
        );
        if let Some(constant) = ops.constant(id) {
            let _ = write!(text, ", Constant: {}", constant.display(self.ctx.interner));
        }
        if ops.is_invalid(id) {
            text.push_str(", IsInvalid");
        }
        if ops.is_implicit(id) {
            text.push_str(", IsImplicit");
        }
        text.push(')');
        if let Some(source) = self.ctx.source {
            if let Some(snippet) = ops.span(id).text(source) {
                let _ = write!(text, " (Syntax: {})", syntax_snippet(snippet));
            }
        }
        text
    }

    fn header(&mut self, id: OpId, indent: usize, name: &str, kind_name: &str) {
        let attrs = self.attributes(id, kind_name);
        self.line(indent, &format!("{name} {attrs}"));
    }

    fn child(&mut self, label: &str, id: OpId, indent: usize) {
        self.line(indent + 2, &format!("{label}:"));
        if id.is_valid() {
            self.node(id, indent + 4);
        } else {
            self.line(indent + 4, "null");
        }
    }

    fn list(&mut self, label: &str, ids: &[OpId], indent: usize) {
        if ids.is_empty() {
            self.line(indent + 2, &format!("{label}(0)"));
            return;
        }
        self.line(indent + 2, &format!("{label}({}):", ids.len()));
        for &id in ids {
            self.node(id, indent + 6);
        }
    }

    fn method(&self, id: crate::MethodId) -> String {
        self.ctx
            .symbols
            .display_method(id, self.ctx.types, self.ctx.interner)
            .to_string()
    }

    fn node(&mut self, id: OpId, indent: usize) {
        let ops = self.ctx.ops;
        match ops.kind(id) {
            OpKind::Literal => self.header(id, indent, "ILiteralOperation", "Literal"),
            OpKind::LocalReference {
                local,
                is_declaration,
            } => {
                let mut name = format!("ILocalReferenceOperation: {}", self.local_name(local));
                if is_declaration {
                    name.push_str(" (IsDeclaration: True)");
                }
                self.header(id, indent, &name, "LocalReference");
            }
            OpKind::ParameterReference(param) => {
                let name = self.ctx.interner.lookup(self.ctx.symbols.param(param).name);
                let name = format!("IParameterReferenceOperation: {name}");
                self.header(id, indent, &name, "ParameterReference");
            }
            OpKind::Invocation {
                method,
                instance,
                args,
            } => {
                let receiver = if instance.is_valid() {
                    ops.ty(instance)
                } else {
                    None
                };
                let signature = self
                    .ctx
                    .symbols
                    .display_method(method, self.ctx.types, self.ctx.interner)
                    .at_call_site(receiver, ops.ty(id))
                    .to_string();
                let name = format!("IInvocationOperation ({signature})");
                self.header(id, indent, &name, "Invocation");
                self.child("Instance Receiver", instance, indent);
                self.list("Arguments", ops.list(args), indent);
            }
            OpKind::Argument {
                kind,
                param,
                value,
                in_conversion,
                out_conversion,
            } => {
                let kind = match kind {
                    ArgumentKind::Explicit => "Explicit",
                    ArgumentKind::DefaultValue => "DefaultValue",
                };
                let param = self.ctx.interner.lookup(self.ctx.symbols.param(param).name);
                let name =
                    format!("IArgumentOperation (ArgumentKind.{kind}, Matching Parameter: {param})");
                self.header(id, indent, &name, "Argument");
                self.node(value, indent + 2);
                let conv = Self::common_conversion(in_conversion);
                self.line(indent + 2, &format!("InConversion: {conv}"));
                let conv = Self::common_conversion(out_conversion);
                self.line(indent + 2, &format!("OutConversion: {conv}"));
            }
            OpKind::Conversion {
                operand,
                conversion,
            } => {
                self.header(
                    id,
                    indent,
                    "IConversionOperation (TryCast: False, Unchecked)",
                    "Conversion",
                );
                let conv = Self::common_conversion(conversion);
                self.line(indent + 2, &format!("Conversion: {conv}"));
                if self.ctx.conversion_kinds {
                    self.line(indent + 4, &format!("({})", conversion.kind.name()));
                }
                self.child("Operand", operand, indent);
            }
            OpKind::Binary { op, left, right } => {
                let name = format!("IBinaryOperation (BinaryOperatorKind.{})", op.dump_name());
                self.header(id, indent, &name, "Binary");
                self.child("Left", left, indent);
                self.child("Right", right, indent);
            }
            OpKind::Unary { op, operand } => {
                let op = match op {
                    UnaryOp::Not => "Not",
                };
                let name = format!("IUnaryOperation (UnaryOperatorKind.{op})");
                self.header(id, indent, &name, "Unary");
                self.child("Operand", operand, indent);
            }
            OpKind::Conditional {
                cond,
                when_true,
                when_false,
            } => {
                self.header(id, indent, "IConditionalOperation", "Conditional");
                self.child("Condition", cond, indent);
                self.child("WhenTrue", when_true, indent);
                self.child("WhenFalse", when_false, indent);
            }
            OpKind::Coalesce {
                value,
                when_null,
                value_conversion,
            } => {
                self.header(id, indent, "ICoalesceOperation", "Coalesce");
                self.child("Expression", value, indent);
                let conv = Self::common_conversion(value_conversion);
                self.line(indent + 2, &format!("ValueConversion: {conv}"));
                self.child("WhenNull", when_null, indent);
            }
            OpKind::IsNull { operand } => {
                self.header(id, indent, "IIsNullOperation", "IsNull");
                self.child("Operand", operand, indent);
            }
            OpKind::ConditionalAccess {
                operation,
                when_not_null,
            } => {
                self.header(id, indent, "IConditionalAccessOperation", "ConditionalAccess");
                self.child("Operation", operation, indent);
                self.child("WhenNotNull", when_not_null, indent);
            }
            OpKind::ConditionalAccessInstance => self.header(
                id,
                indent,
                "IConditionalAccessInstanceOperation",
                "ConditionalAccessInstance",
            ),
            OpKind::DefaultValue => {
                self.header(id, indent, "IDefaultValueOperation", "DefaultValue");
            }
            OpKind::ArrayCreation { sizes, initializer } => {
                self.header(id, indent, "IArrayCreationOperation", "ArrayCreation");
                self.list("Dimension Sizes", ops.list(sizes), indent);
                self.child("Initializer", initializer, indent);
            }
            OpKind::ArrayInitializer { elements } => {
                let elements = ops.list(elements);
                let name = format!("IArrayInitializerOperation ({} elements)", elements.len());
                self.header(id, indent, &name, "ArrayInitializer");
                self.list("Element Values", elements, indent);
            }
            OpKind::CollectionExpression {
                construct_method,
                construct_args,
                elements,
            } => {
                let elements = ops.list(elements);
                let method = construct_method.map_or_else(|| "null".to_owned(), |m| self.method(m));
                let name = format!(
                    "ICollectionExpressionOperation ({} elements, ConstructMethod: {method})",
                    elements.len()
                );
                self.header(id, indent, &name, "CollectionExpression");
                let args = ops.list(construct_args);
                if !args.is_empty() {
                    self.list("ConstructArguments", args, indent);
                }
                self.list("Elements", elements, indent);
            }
            OpKind::CollectionElementsPlaceholder => self.header(
                id,
                indent,
                "ICollectionExpressionElementsPlaceholderOperation",
                "CollectionExpressionElementsPlaceholder",
            ),
            OpKind::SimpleAssignment { target, value } => {
                self.header(id, indent, "ISimpleAssignmentOperation", "SimpleAssignment");
                self.child("Left", target, indent);
                self.child("Right", value, indent);
            }
            OpKind::VariableDeclaration { local, initializer } => {
                let name = format!("IVariableDeclaratorOperation (Symbol: {})", self.local_decl(local));
                self.header(id, indent, &name, "VariableDeclarator");
                self.child("Initializer", initializer, indent);
            }
            OpKind::ExpressionStatement { expr } => {
                self.header(id, indent, "IExpressionStatementOperation", "ExpressionStatement");
                self.child("Expression", expr, indent);
            }
            OpKind::Block { ops: body, locals } => {
                let body = ops.list(body);
                let locals = ops.locals(locals);
                let name = if locals.is_empty() {
                    format!("IBlockOperation ({} statements)", body.len())
                } else {
                    format!(
                        "IBlockOperation ({} statements, {} locals)",
                        body.len(),
                        locals.len()
                    )
                };
                self.header(id, indent, &name, "Block");
                if !locals.is_empty() {
                    let mut text = String::from("Locals:");
                    for (i, &local) in locals.iter().enumerate() {
                        let _ = write!(text, " Local_{}: {}", i + 1, self.local_decl(local));
                    }
                    self.line(indent + 2, &text);
                }
                for &stmt in body {
                    self.node(stmt, indent + 2);
                }
            }
            OpKind::Labeled { label, body } => {
                let name = format!("ILabeledOperation (Label: {})", self.ctx.interner.lookup(label));
                self.header(id, indent, &name, "Labeled");
                self.child("Statement", body, indent);
            }
            OpKind::Branch { kind, label } => {
                let kind = match kind {
                    BranchKind::GoTo => "GoTo",
                    BranchKind::Break => "Break",
                    BranchKind::Continue => "Continue",
                };
                let label = label.map_or("null", |l| self.ctx.interner.lookup(l));
                let name = format!("IBranchOperation (BranchKind.{kind}, Label: {label})");
                self.header(id, indent, &name, "Branch");
            }
            OpKind::WhileLoop {
                cond,
                body,
                test_at_top,
            } => {
                let name = format!(
                    "IWhileLoopOperation (ConditionIsTop: {}, ConditionIsUntil: False) (LoopKind.While)",
                    bool_text(test_at_top)
                );
                self.header(id, indent, &name, "Loop");
                self.child("Condition", cond, indent);
                self.child("Body", body, indent);
            }
            OpKind::Return { value } => {
                self.header(id, indent, "IReturnOperation", "Return");
                self.child("ReturnedValue", value, indent);
            }
            OpKind::Throw { value } => {
                self.header(id, indent, "IThrowOperation", "Throw");
                if value.is_valid() {
                    self.node(value, indent + 2);
                } else {
                    self.line(indent + 2, "null");
                }
            }
            OpKind::Try {
                body,
                catches,
                finally,
            } => {
                self.header(id, indent, "ITryOperation", "Try");
                self.child("Body", body, indent);
                self.list("Catch clauses", ops.list(catches), indent);
                self.child("Finally", finally, indent);
            }
            OpKind::CatchClause {
                exception_type,
                local,
                handler,
            } => {
                let name = format!(
                    "ICatchClauseOperation (Exception type: {})",
                    self.type_name(Some(exception_type))
                );
                self.header(id, indent, &name, "CatchClause");
                if let Some(local) = local {
                    let text = format!("Locals: Local_1: {}", self.local_decl(local));
                    self.line(indent + 2, &text);
                }
                self.child("Handler", handler, indent);
            }
            OpKind::CaughtException => {
                self.header(id, indent, "ICaughtExceptionOperation", "CaughtException");
            }
            OpKind::LocalFunction { method, body } => {
                let name = format!("ILocalFunctionOperation (Symbol: {})", self.method(method));
                self.header(id, indent, &name, "LocalFunction");
                self.node(body, indent + 2);
            }
            OpKind::AnonymousFunction { body, .. } => {
                self.header(
                    id,
                    indent,
                    "IAnonymousFunctionOperation (Symbol: lambda expression)",
                    "AnonymousFunction",
                );
                self.node(body, indent + 2);
            }
            OpKind::FlowAnonymousFunction { graph, .. } => {
                self.header(
                    id,
                    indent,
                    "IFlowAnonymousFunctionOperation (Symbol: lambda expression)",
                    "FlowAnonymousFunction",
                );
                if let Some(render) = self.ctx.nested_graph {
                    render(graph, indent, self.out);
                }
            }
            OpKind::FlowCapture { id: capture, value } => {
                let name = format!("IFlowCaptureOperation: {capture}");
                self.header(id, indent, &name, "FlowCapture");
                self.child("Value", value, indent);
            }
            OpKind::FlowCaptureReference { id: capture } => {
                let name = format!("IFlowCaptureReferenceOperation: {capture}");
                self.header(id, indent, &name, "FlowCaptureReference");
            }
            OpKind::Invalid { children } => {
                self.header(id, indent, "IInvalidOperation", "Invalid");
                self.list("Children", ops.list(children), indent);
            }
            OpKind::Empty => self.header(id, indent, "IEmptyOperation", "Empty"),
        }
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

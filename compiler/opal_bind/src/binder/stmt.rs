//! Statement binding.
//!
//! Statements keep their syntactic shape. Label resolution, loop targets and
//! `finally` exits are checked by the flow builder, which is where branches
//! get their meaning.

use smallvec::SmallVec;

use opal_ir::syntax::{SynCatchRange, SynStmtKind, SynStmtRange};
use opal_ir::{BranchKind, OpId, OpKind, OpNode, Span, SynStmtId, TypeId};

use super::Binder;

impl Binder<'_> {
    /// Bind a method, local function or lambda body.
    pub(crate) fn bind_body(&mut self, body: SynStmtId) -> OpId {
        self.bind_stmt(body)
    }

    pub(crate) fn bind_stmt(&mut self, id: SynStmtId) -> OpId {
        let stmt = *self.syntax.stmt(id);
        let span = stmt.span;
        match stmt.kind {
            SynStmtKind::Expr(expr) => {
                let expr = self.bind_expr(expr);
                self.statement(OpKind::ExpressionStatement { expr }, span)
            }
            SynStmtKind::LocalDecl { local, init } => {
                self.declare_local(local);
                let ty = self.symbols.local(local).ty;
                let initializer = init.map_or(OpId::INVALID, |init| self.bind_expr_to(init, ty));
                self.statement(OpKind::VariableDeclaration { local, initializer }, span)
            }
            SynStmtKind::Block(stmts) => self.bind_block(stmts, span),
            SynStmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.bind_expr_to(cond, TypeId::BOOL);
                let when_true = self.bind_stmt(then_branch);
                let when_false = else_branch.map_or(OpId::INVALID, |e| self.bind_stmt(e));
                let kind = OpKind::Conditional {
                    cond,
                    when_true,
                    when_false,
                };
                self.statement(kind, span)
            }
            SynStmtKind::While { cond, body } => {
                let cond = self.bind_expr_to(cond, TypeId::BOOL);
                let body = self.bind_stmt(body);
                self.statement(
                    OpKind::WhileLoop {
                        cond,
                        body,
                        test_at_top: true,
                    },
                    span,
                )
            }
            SynStmtKind::DoWhile { body, cond } => {
                let body = self.bind_stmt(body);
                let cond = self.bind_expr_to(cond, TypeId::BOOL);
                self.statement(
                    OpKind::WhileLoop {
                        cond,
                        body,
                        test_at_top: false,
                    },
                    span,
                )
            }
            SynStmtKind::Labeled { label, body } => {
                let body = self.bind_stmt(body);
                self.statement(OpKind::Labeled { label, body }, span)
            }
            SynStmtKind::Goto(label) => self.statement(
                OpKind::Branch {
                    kind: BranchKind::GoTo,
                    label: Some(label),
                },
                span,
            ),
            SynStmtKind::Break => self.statement(
                OpKind::Branch {
                    kind: BranchKind::Break,
                    label: None,
                },
                span,
            ),
            SynStmtKind::Continue => self.statement(
                OpKind::Branch {
                    kind: BranchKind::Continue,
                    label: None,
                },
                span,
            ),
            SynStmtKind::Return(value) => {
                let value = value.map_or(OpId::INVALID, |v| self.bind_expr(v));
                self.statement(OpKind::Return { value }, span)
            }
            SynStmtKind::Throw(value) => {
                let value = value.map_or(OpId::INVALID, |v| self.bind_expr(v));
                self.statement(OpKind::Throw { value }, span)
            }
            SynStmtKind::Try {
                body,
                catches,
                finally,
            } => self.bind_try(span, body, catches, finally),
            SynStmtKind::LocalFunction { method, body } => {
                let body = self.bind_stmt(body);
                self.statement(OpKind::LocalFunction { method, body }, span)
            }
            SynStmtKind::Empty => self.statement(OpKind::Empty, span),
        }
    }

    fn statement(&mut self, kind: OpKind, span: Span) -> OpId {
        self.push(OpNode::new(kind, None, span))
    }

    fn bind_block(&mut self, stmts: SynStmtRange, span: Span) -> OpId {
        self.open_scope();
        let syntax = self.syntax;
        let ops: SmallVec<[OpId; 8]> = syntax
            .stmts(stmts)
            .iter()
            .map(|&s| self.bind_stmt(s))
            .collect();
        let locals = self.close_scope();
        let ops = self.ops.push_list(&ops);
        let locals = self.ops.push_locals(&locals);
        self.statement(OpKind::Block { ops, locals }, span)
    }

    fn bind_try(
        &mut self,
        span: Span,
        body: SynStmtId,
        catches: SynCatchRange,
        finally: Option<SynStmtId>,
    ) -> OpId {
        let body = self.bind_stmt(body);
        let syntax = self.syntax;
        let clauses: SmallVec<[OpId; 2]> = syntax
            .catches(catches)
            .iter()
            .map(|clause| {
                let handler = self.bind_stmt(clause.body);
                // A bare `catch` catches every thrown object.
                let exception_type = clause.exception_type.unwrap_or(TypeId::OBJECT);
                self.statement(
                    OpKind::CatchClause {
                        exception_type,
                        local: clause.local,
                        handler,
                    },
                    clause.span,
                )
            })
            .collect();
        let finally = finally.map_or(OpId::INVALID, |f| self.bind_stmt(f));
        let catches = self.ops.push_list(&clauses);
        self.statement(
            OpKind::Try {
                body,
                catches,
                finally,
            },
            span,
        )
    }
}

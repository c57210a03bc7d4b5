//! Label pre-pass.
//!
//! Walks the body once before lowering and records every label declaration
//! with the block it is declared in, plus the innermost block around each
//! `goto`. A label is in scope for a `goto` when it is declared in the
//! goto's block or in any block enclosing it. Lambda and local function
//! bodies are skipped; their labels belong to their own graphs.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use opal_ir::operation::{walk_op, OpVisitor};
use opal_ir::{BranchKind, Name, OpArena, OpId, OpKind};

#[derive(Copy, Clone, Debug)]
struct LabelDecl {
    op: OpId,
    /// Innermost block around the declaration; `INVALID` at body level.
    scope: OpId,
}

#[derive(Default)]
pub(super) struct LabelTable {
    declared: FxHashMap<Name, SmallVec<[LabelDecl; 1]>>,
    duplicates: Vec<OpId>,
    finally_depths: FxHashMap<OpId, usize>,
    /// Enclosing block of each block.
    parents: FxHashMap<OpId, OpId>,
    /// Innermost block around each `goto`.
    goto_scopes: FxHashMap<OpId, OpId>,
}

impl LabelTable {
    pub(super) fn collect(ops: &OpArena, root: OpId) -> Self {
        let mut collector = LabelCollector {
            table: LabelTable::default(),
            scopes: Vec::new(),
            finally_depth: 0,
        };
        collector.visit_op(ops, root);
        collector.table
    }

    /// `Labeled` operations whose label was already declared in scope.
    pub(super) fn duplicates(&self) -> &[OpId] {
        &self.duplicates
    }

    /// The `Labeled` operation `goto` jumps to, if `label` is in scope there.
    pub(super) fn resolve(&self, goto: OpId, label: Name) -> Option<OpId> {
        let decls = self.declared.get(&label)?;
        let from = self.goto_scopes.get(&goto).copied().unwrap_or(OpId::INVALID);
        decls
            .iter()
            .find(|decl| self.encloses(decl.scope, from))
            .map(|decl| decl.op)
    }

    /// Finally handlers around a label declaration.
    pub(super) fn finally_depth(&self, labeled: OpId) -> usize {
        self.finally_depths.get(&labeled).copied().unwrap_or(0)
    }

    /// Whether block `outer` is `inner` or encloses it.
    fn encloses(&self, outer: OpId, inner: OpId) -> bool {
        let mut scope = inner;
        loop {
            if scope == outer {
                return true;
            }
            if !scope.is_valid() {
                return false;
            }
            scope = self.parents.get(&scope).copied().unwrap_or(OpId::INVALID);
        }
    }
}

struct LabelCollector {
    table: LabelTable,
    scopes: Vec<OpId>,
    finally_depth: usize,
}

impl LabelCollector {
    fn scope(&self) -> OpId {
        self.scopes.last().copied().unwrap_or(OpId::INVALID)
    }

    fn declare(&mut self, op: OpId, label: Name) {
        let scope = self.scope();
        let shadowed = self.table.declared.get(&label).is_some_and(|decls| {
            decls.iter().any(|decl| {
                self.table.encloses(decl.scope, scope) || self.table.encloses(scope, decl.scope)
            })
        });
        if shadowed {
            self.table.duplicates.push(op);
            return;
        }
        self.table.finally_depths.insert(op, self.finally_depth);
        self.table
            .declared
            .entry(label)
            .or_default()
            .push(LabelDecl { op, scope });
    }
}

impl OpVisitor for LabelCollector {
    fn visit_op(&mut self, arena: &OpArena, id: OpId) {
        match arena.kind(id) {
            OpKind::AnonymousFunction { .. } | OpKind::LocalFunction { .. } => {}
            OpKind::Block { .. } => {
                let parent = self.scope();
                self.table.parents.insert(id, parent);
                self.scopes.push(id);
                walk_op(self, arena, id);
                self.scopes.pop();
            }
            OpKind::Labeled { label, .. } => {
                self.declare(id, label);
                walk_op(self, arena, id);
            }
            OpKind::Branch {
                kind: BranchKind::GoTo,
                ..
            } => {
                let scope = self.scope();
                self.table.goto_scopes.insert(id, scope);
            }
            OpKind::Try {
                body,
                catches,
                finally,
            } => {
                self.visit_op(arena, body);
                for &clause in arena.list(catches) {
                    self.visit_op(arena, clause);
                }
                if finally.is_valid() {
                    self.finally_depth += 1;
                    self.visit_op(arena, finally);
                    self.finally_depth -= 1;
                }
            }
            _ => walk_op(self, arena, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_ir::{OpNode, OpRange, Span, StringInterner};

    fn labeled(arena: &mut OpArena, label: Name) -> OpId {
        let empty = arena.push(OpNode::new(OpKind::Empty, None, Span::DUMMY));
        arena.push(OpNode::new(OpKind::Labeled { label, body: empty }, None, Span::DUMMY))
    }

    fn goto(arena: &mut OpArena, label: Name) -> OpId {
        arena.push(OpNode::new(
            OpKind::Branch {
                kind: BranchKind::GoTo,
                label: Some(label),
            },
            None,
            Span::DUMMY,
        ))
    }

    fn block(arena: &mut OpArena, stmts: &[OpId]) -> OpId {
        let ops = arena.push_list(stmts);
        let locals = arena.push_locals(&[]);
        arena.push(OpNode::new(OpKind::Block { ops, locals }, None, Span::DUMMY))
    }

    #[test]
    fn goto_sees_labels_of_enclosing_blocks_only() {
        let interner = StringInterner::new();
        let outer_label = interner.intern("outer");
        let inner_label = interner.intern("inner");
        let mut arena = OpArena::new();

        let inner_decl = labeled(&mut arena, inner_label);
        let inner = block(&mut arena, &[inner_decl]);
        let to_outer = goto(&mut arena, outer_label);
        let to_inner = goto(&mut arena, inner_label);
        let sibling = block(&mut arena, &[to_outer, to_inner]);
        let outer_decl = labeled(&mut arena, outer_label);
        let root = block(&mut arena, &[outer_decl, inner, sibling]);

        let table = LabelTable::collect(&arena, root);
        assert_eq!(table.resolve(to_outer, outer_label), Some(outer_decl));
        assert_eq!(table.resolve(to_inner, inner_label), None);
        assert!(table.duplicates().is_empty());
    }

    #[test]
    fn redeclaring_a_visible_label_is_a_duplicate() {
        let interner = StringInterner::new();
        let name = interner.intern("L");
        let mut arena = OpArena::new();

        let first = labeled(&mut arena, name);
        let second = labeled(&mut arena, name);
        let nested = block(&mut arena, &[second]);
        let jump = goto(&mut arena, name);
        let root = block(&mut arena, &[first, nested, jump]);

        let table = LabelTable::collect(&arena, root);
        assert_eq!(table.duplicates(), &[second]);
        assert_eq!(table.resolve(jump, name), Some(first));
    }

    #[test]
    fn sibling_blocks_may_reuse_a_label() {
        let interner = StringInterner::new();
        let name = interner.intern("L");
        let mut arena = OpArena::new();

        let first = labeled(&mut arena, name);
        let left = block(&mut arena, &[first]);
        let second = labeled(&mut arena, name);
        let jump = goto(&mut arena, name);
        let right = block(&mut arena, &[second, jump]);
        let root = block(&mut arena, &[left, right]);

        let table = LabelTable::collect(&arena, root);
        assert!(table.duplicates().is_empty());
        assert_eq!(table.resolve(jump, name), Some(second));
    }

    #[test]
    fn labels_in_finally_record_their_depth() {
        let interner = StringInterner::new();
        let name = interner.intern("L");
        let mut arena = OpArena::new();

        let decl = labeled(&mut arena, name);
        let finally = block(&mut arena, &[decl]);
        let body = block(&mut arena, &[]);
        let try_op = arena.push(OpNode::new(
            OpKind::Try {
                body,
                catches: OpRange::EMPTY,
                finally,
            },
            None,
            Span::DUMMY,
        ));
        let root = block(&mut arena, &[try_op]);

        let table = LabelTable::collect(&arena, root);
        assert_eq!(table.finally_depth(decl), 1);
    }
}

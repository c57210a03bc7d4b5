//! Operation tree visitor.
//!
//! Default implementations call [`walk_op`], which visits children in
//! evaluation order. Override `visit_op` to act on specific kinds and call
//! `walk_op` to keep descending.

use super::{OpArena, OpId};

pub trait OpVisitor {
    fn visit_op(&mut self, arena: &OpArena, id: OpId) {
        walk_op(self, arena, id);
    }
}

pub fn walk_op<V: OpVisitor + ?Sized>(visitor: &mut V, arena: &OpArena, id: OpId) {
    for child in arena.children(id) {
        visitor.visit_op(arena, child);
    }
}

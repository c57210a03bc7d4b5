//! Binder tests.
//!
//! Each test writes the source a parser would have seen, builds the resolved
//! syntax for it with [`Fixture`](crate::testing::Fixture), binds it and checks
//! the dumped operation tree and the reported diagnostics.

mod expr_tests;

use opal_ir::{MethodId, OpId, OpKind};

use crate::BoundBody;

/// Construct method, construct arguments and elements of a collection expression.
fn collection_parts(bound: &BoundBody, op: OpId) -> (Option<MethodId>, Vec<OpId>, Vec<OpId>) {
    match bound.ops.kind(op) {
        OpKind::CollectionExpression {
            construct_method,
            construct_args,
            elements,
        } => (
            construct_method,
            bound.ops.list(construct_args).to_vec(),
            bound.ops.list(elements).to_vec(),
        ),
        other => panic!("expected a collection expression, found {other:?}"),
    }
}

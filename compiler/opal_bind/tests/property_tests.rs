#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
//! Property tests for the IR builder.

use proptest::prelude::*;

use opal_diagnostic::ErrorCode;
use opal_ir::{ConstantValue, OpKind, SynExprId, TypeId};
use opal_bind::testing::{codes, Fixture};
use opal_bind::BoundBody;

/// `new int[size] { 10, 11, ... }` with `len` elements.
fn sized_creation(size: i32, len: usize) -> (Fixture, SynExprId) {
    let values: Vec<i32> = (10..).take(len).collect();
    let list: Vec<String> = values.iter().map(ToString::to_string).collect();
    let source = format!("new int[{size}] {{ {} }}", list.join(", "));

    let mut f = Fixture::new(&source);
    let new = f.find("new");
    let size = f.int(size);
    let open = f.find("{");
    let elements: Vec<_> = values.iter().map(|&v| f.int(v)).collect();
    let close = f.find("}");
    let init = f.initializer(open, &elements, close);
    let creation = f.array_creation(new, TypeId::INT32, 1, &[size], Some(init), close);
    (f, creation)
}

/// Every operation with an invalid child is itself invalid.
fn assert_invalid_propagates(bound: &BoundBody) {
    for id in bound.ops.ids() {
        if bound.ops.children(id).iter().any(|&c| bound.ops.is_invalid(c)) {
            assert!(bound.ops.is_invalid(id), "{id:?} has an invalid child");
        }
    }
}

proptest! {
    #[test]
    fn length_mismatch_iff_counts_differ(size in 0i32..6, len in 0usize..6) {
        let (f, creation) = sized_creation(size, len);
        let bound = f.bind_expr(creation, None);

        let expected = if usize::try_from(size).unwrap() == len {
            vec![]
        } else {
            vec![ErrorCode::CS0847]
        };
        prop_assert_eq!(codes(&bound.diagnostics), expected);
        prop_assert_eq!(bound.ops.is_invalid(bound.root), usize::try_from(size).unwrap() != len);
        assert_invalid_propagates(&bound);
    }

    #[test]
    fn implicit_size_counts_elements(len in 0usize..8) {
        let values: Vec<i32> = (10..).take(len).collect();
        let list: Vec<String> = values.iter().map(ToString::to_string).collect();
        let source = format!("new[] {{ {} }}", list.join(", "));

        let mut f = Fixture::new(&source);
        let ty = f.types.array(TypeId::INT32, 1);
        let new = f.find("new");
        let open = f.find("{");
        let elements: Vec<_> = values.iter().map(|&v| f.int(v)).collect();
        let close = f.find("}");
        let init = f.initializer(open, &elements, close);
        let creation = f.implicit_array(new, init, Some(ty));
        let bound = f.bind_expr(creation, None);

        let OpKind::ArrayCreation { sizes, .. } = bound.ops.kind(bound.root) else {
            panic!("expected an array creation");
        };
        let sizes = bound.ops.list(sizes);
        prop_assert_eq!(sizes.len(), 1);
        prop_assert_eq!(
            bound.ops.constant(sizes[0]),
            Some(ConstantValue::Int32(i32::try_from(len).unwrap()))
        );
        prop_assert!(bound.diagnostics.is_empty());
    }

    #[test]
    fn bad_elements_invalidate_only_their_path(strings in prop::collection::vec(any::<bool>(), 1..6)) {
        let texts: Vec<&str> = strings.iter().map(|&s| if s { "\"a\"" } else { "1" }).collect();
        let source = format!("[{}]", texts.join(", "));

        let mut f = Fixture::new(&source);
        let list = f.list(TypeId::INT32);
        let open = f.find("[");
        let elements: Vec<_> = strings
            .iter()
            .map(|&s| if s { f.string("a") } else { f.int(1) })
            .collect();
        let close = f.find("]");
        let lit = f.collection(open, None, &elements, close, Some(list));
        let bound = f.bind_expr(lit, None);

        let bad = strings.iter().filter(|&&s| s).count();
        prop_assert_eq!(bound.diagnostics.len(), bad);
        prop_assert_eq!(bound.ops.is_invalid(bound.root), bad > 0);
        assert_invalid_propagates(&bound);

        let OpKind::Conversion { operand, .. } = bound.ops.kind(bound.root) else {
            panic!("expected the collection conversion");
        };
        let OpKind::CollectionExpression { elements, .. } = bound.ops.kind(operand) else {
            panic!("expected a collection expression");
        };
        for (&op, &is_string) in bound.ops.list(elements).iter().zip(&strings) {
            prop_assert_eq!(bound.ops.is_invalid(op), is_string);
        }
    }
}

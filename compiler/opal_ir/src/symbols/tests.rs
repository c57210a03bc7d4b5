use pretty_assertions::assert_eq;

use super::*;
use crate::types::{CollectionKind, NamedType};

fn param(interner: &StringInterner, name: &str, ty: TypeId) -> ParamSymbol {
    ParamSymbol {
        name: interner.intern(name),
        ty,
        default: None,
    }
}

#[test]
fn constructor_display() {
    let interner = StringInterner::new();
    let mut types = TypePool::new();
    let mut symbols = SymbolTable::new(&interner);
    let list = types.named(
        NamedType::class(interner.intern("System.Collections.Generic.List"))
            .with_args(&[TypeId::INT32])
            .with_collection(TypeId::INT32, CollectionKind::Concrete),
    );
    let empty = symbols.add_constructor(list, &[]);
    let capacity = symbols.add_constructor(list, &[param(&interner, "capacity", TypeId::INT32)]);

    assert_eq!(
        symbols.display_method(empty, &types, &interner).to_string(),
        "System.Collections.Generic.List<System.Int32>..ctor()"
    );
    assert_eq!(
        symbols.display_method(capacity, &types, &interner).to_string(),
        "System.Collections.Generic.List<System.Int32>..ctor(System.Int32 capacity)"
    );
    assert_eq!(symbols.constructors_of(list), &[empty, capacity]);
}

#[test]
fn optional_parameters_render_in_brackets() {
    let interner = StringInterner::new();
    let mut types = TypePool::new();
    let mut symbols = SymbolTable::new(&interner);
    let target = types.named(NamedType::class(interner.intern("MyHashSet")));
    let builder = types.named(NamedType::class(interner.intern("MyHashSetBuilder")));
    let span = types.span(TypeId::INT32, true);
    let create = symbols.add_static(
        builder,
        interner.intern("Create"),
        target,
        &[
            ParamSymbol {
                default: Some(ConstantValue::Int32(42)),
                ..param(&interner, "capacity", TypeId::INT32)
            },
            ParamSymbol {
                default: Some(ConstantValue::Null),
                ..param(&interner, "items", span)
            },
        ],
    );

    assert_eq!(
        symbols.display_method(create, &types, &interner).to_string(),
        "MyHashSet MyHashSetBuilder.Create([System.Int32 capacity = 42], \
         [System.ReadOnlySpan<System.Int32> items = default(System.ReadOnlySpan<System.Int32>)])"
    );
}

#[test]
fn well_known_member_takes_call_site_types() {
    let interner = StringInterner::new();
    let mut types = TypePool::new();
    let symbols = SymbolTable::new(&interner);
    let nullable = types.nullable(TypeId::INT32);
    let shown = symbols
        .display_method(symbols.get_value_or_default(), &types, &interner)
        .at_call_site(Some(nullable), Some(TypeId::INT32))
        .to_string();
    assert_eq!(shown, "System.Int32 System.Int32?.GetValueOrDefault()");
}

#[test]
fn locals_and_builders() {
    let interner = StringInterner::new();
    let mut types = TypePool::new();
    let mut symbols = SymbolTable::new(&interner);
    let a = symbols.add_local(interner.intern("a"), TypeId::INT32, Span::new(4, 5));
    assert_eq!(symbols.local(a).ty, TypeId::INT32);

    let target = types.named(NamedType::class(interner.intern("MySet")));
    assert!(symbols.collection_builder(target).is_none());
    symbols.set_collection_builder(
        target,
        CollectionBuilder {
            container: target,
            methods: Vec::new(),
        },
    );
    assert!(symbols.collection_builder(target).is_some());
}

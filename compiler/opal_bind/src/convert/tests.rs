use pretty_assertions::assert_eq;

use opal_ir::{CollectionKind, DeclKind, NamedType, StringInterner};

use super::*;

fn generic_interface(types: &mut TypePool, interner: &StringInterner, name: &str) -> TypeId {
    types.named(
        NamedType::class(interner.intern(name))
            .with_args(&[TypeId::INT32])
            .with_decl(DeclKind::Interface),
    )
}

#[test]
fn identity_and_error_types() {
    let types = TypePool::new();
    let kind = |from, to| classify_standard(&types, Some(from), None, to);
    assert_eq!(kind(TypeId::INT32, TypeId::INT32), ConversionKind::Identity);
    assert_eq!(kind(TypeId::ERROR, TypeId::STRING), ConversionKind::Identity);
    assert_eq!(kind(TypeId::STRING, TypeId::ERROR), ConversionKind::Identity);
}

#[test]
fn numeric_widening_only() {
    let types = TypePool::new();
    let kind = |from, to| classify_standard(&types, Some(from), None, to);
    assert_eq!(kind(TypeId::INT32, TypeId::INT64), ConversionKind::ImplicitNumeric);
    assert_eq!(kind(TypeId::CHAR, TypeId::DOUBLE), ConversionKind::ImplicitNumeric);
    assert_eq!(kind(TypeId::INT64, TypeId::INT32), ConversionKind::NoConversion);
    assert_eq!(kind(TypeId::DOUBLE, TypeId::INT32), ConversionKind::NoConversion);
    assert_eq!(kind(TypeId::STRING, TypeId::INT32), ConversionKind::NoConversion);
}

#[test]
fn nullable_targets() {
    let mut types = TypePool::new();
    let int_opt = types.nullable(TypeId::INT32);
    let long_opt = types.nullable(TypeId::INT64);
    assert_eq!(
        classify_standard(&types, Some(TypeId::INT32), None, int_opt),
        ConversionKind::ImplicitNullable
    );
    assert_eq!(
        classify_standard(&types, Some(TypeId::INT32), None, long_opt),
        ConversionKind::ImplicitNullable
    );
    assert_eq!(
        classify_standard(&types, None, Some(ConstantValue::Null), int_opt),
        ConversionKind::NullLiteral
    );
    assert_eq!(
        classify_standard(&types, Some(int_opt), None, TypeId::INT32),
        ConversionKind::NoConversion
    );
}

#[test]
fn null_to_reference_types() {
    let interner = StringInterner::new();
    let mut types = TypePool::new();
    let comparer = generic_interface(
        &mut types,
        &interner,
        "System.Collections.Generic.IEqualityComparer",
    );
    assert_eq!(
        classify_standard(&types, None, Some(ConstantValue::Null), comparer),
        ConversionKind::ImplicitReference
    );
    assert_eq!(
        classify_standard(&types, None, Some(ConstantValue::Null), TypeId::INT32),
        ConversionKind::NoConversion
    );
    assert_eq!(
        classify_standard(&types, None, None, TypeId::OBJECT),
        ConversionKind::NoConversion
    );
}

#[test]
fn reference_and_boxing() {
    let interner = StringInterner::new();
    let mut types = TypePool::new();
    let enumerable = generic_interface(
        &mut types,
        &interner,
        "System.Collections.Generic.IEnumerable",
    );
    let list = types.named(
        NamedType::class(interner.intern("System.Collections.Generic.List"))
            .with_args(&[TypeId::INT32])
            .with_interface(enumerable)
            .with_collection(TypeId::INT32, CollectionKind::Concrete),
    );
    let point = types.named(
        NamedType::class(interner.intern("Point"))
            .with_decl(DeclKind::Struct)
            .with_interface(enumerable),
    );

    let kind = |types: &TypePool, from, to| classify_standard(types, Some(from), None, to);
    assert_eq!(kind(&types, list, enumerable), ConversionKind::ImplicitReference);
    assert_eq!(kind(&types, TypeId::STRING, TypeId::OBJECT), ConversionKind::ImplicitReference);
    assert_eq!(kind(&types, TypeId::STRING, enumerable), ConversionKind::NoConversion);
    assert_eq!(kind(&types, enumerable, list), ConversionKind::NoConversion);
    assert_eq!(kind(&types, TypeId::INT32, TypeId::OBJECT), ConversionKind::Boxing);
    assert_eq!(kind(&types, point, enumerable), ConversionKind::Boxing);
}

#[test]
fn constants_fold_through_widening() {
    let types = TypePool::new();
    assert_eq!(
        convert_constant(
            &types,
            ConstantValue::Int32(7),
            ConversionKind::ImplicitNumeric,
            TypeId::INT64
        ),
        Some(ConstantValue::Int64(7))
    );
    assert_eq!(
        convert_constant(
            &types,
            ConstantValue::Char('a'),
            ConversionKind::ImplicitNumeric,
            TypeId::INT32
        ),
        Some(ConstantValue::Int32(97))
    );
    assert_eq!(
        convert_constant(
            &types,
            ConstantValue::Null,
            ConversionKind::ImplicitReference,
            TypeId::STRING
        ),
        Some(ConstantValue::Null)
    );
    assert_eq!(
        convert_constant(
            &types,
            ConstantValue::Int32(1),
            ConversionKind::Boxing,
            TypeId::OBJECT
        ),
        None
    );
}

#[test]
fn identity_ranks_first() {
    assert!(
        conversion_rank(Conversion::IDENTITY)
            < conversion_rank(Conversion::of(ConversionKind::ImplicitNumeric))
    );
    assert!(
        conversion_rank(Conversion::of(ConversionKind::Boxing)) < conversion_rank(Conversion::NONE)
    );
}

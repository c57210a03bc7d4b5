//! Implicit conversion classification.
//!
//! Classifying conversions belongs to the upstream resolver; the IR builder
//! only asks "does `from` convert to `to`, and how". That question is the
//! [`ConversionOracle`] seam. [`StandardConversions`] answers it from the
//! type pool alone, which is all the builder's own tests and the default
//! entry points need.

use opal_ir::{ConstantValue, Conversion, ConversionKind, TypeId, TypeKind, TypePool};

/// Classifies implicit conversions for the IR builder.
///
/// Implementations must be pure: bodies are bound on worker threads and the
/// same oracle is shared between them.
pub trait ConversionOracle: Sync {
    /// Classify the implicit conversion of a value of type `from` to `to`.
    ///
    /// `from` is `None` for typeless values such as the `null` literal;
    /// `constant` is the value's compile-time constant, if any.
    fn classify(
        &self,
        types: &TypePool,
        from: Option<TypeId>,
        constant: Option<ConstantValue>,
        to: TypeId,
    ) -> Conversion;
}

/// The language's built-in implicit conversions over a [`TypePool`].
#[derive(Copy, Clone, Debug, Default)]
pub struct StandardConversions;

impl ConversionOracle for StandardConversions {
    fn classify(
        &self,
        types: &TypePool,
        from: Option<TypeId>,
        constant: Option<ConstantValue>,
        to: TypeId,
    ) -> Conversion {
        Conversion::of(classify_standard(types, from, constant, to))
    }
}

/// Built-in classification used by [`StandardConversions`].
///
/// Error types convert to and from everything as identity so that a failed
/// resolution upstream does not cascade into conversion errors here.
pub fn classify_standard(
    types: &TypePool,
    from: Option<TypeId>,
    constant: Option<ConstantValue>,
    to: TypeId,
) -> ConversionKind {
    if types.is_error(to) {
        return ConversionKind::Identity;
    }
    let Some(from) = from else {
        return match constant {
            Some(ConstantValue::Null) => null_conversion(types, to),
            _ => ConversionKind::NoConversion,
        };
    };
    if from == to || types.is_error(from) {
        return ConversionKind::Identity;
    }
    if is_implicit_numeric(types, from, to) {
        return ConversionKind::ImplicitNumeric;
    }
    if let Some(underlying) = types.nullable_underlying(to) {
        if from == underlying || is_implicit_numeric(types, from, underlying) {
            return ConversionKind::ImplicitNullable;
        }
        return ConversionKind::NoConversion;
    }
    let to_object = matches!(types.kind(to), TypeKind::Object);
    if types.is_reference_type(from) {
        if to_object || types.inherits_from(from, to) {
            return ConversionKind::ImplicitReference;
        }
        return ConversionKind::NoConversion;
    }
    if types.is_value_type(from) && (to_object || is_implemented_interface(types, from, to)) {
        return ConversionKind::Boxing;
    }
    ConversionKind::NoConversion
}

fn null_conversion(types: &TypePool, to: TypeId) -> ConversionKind {
    if types.nullable_underlying(to).is_some() {
        ConversionKind::NullLiteral
    } else if types.is_reference_type(to) {
        ConversionKind::ImplicitReference
    } else {
        ConversionKind::NoConversion
    }
}

fn is_implicit_numeric(types: &TypePool, from: TypeId, to: TypeId) -> bool {
    matches!(
        (types.kind(from), types.kind(to)),
        (TypeKind::Int32, TypeKind::Int64 | TypeKind::Double)
            | (TypeKind::Int64, TypeKind::Double)
            | (
                TypeKind::Char,
                TypeKind::Int32 | TypeKind::Int64 | TypeKind::Double
            )
    )
}

fn is_implemented_interface(types: &TypePool, from: TypeId, to: TypeId) -> bool {
    let is_interface = types
        .named_type(to)
        .is_some_and(|n| n.decl == opal_ir::DeclKind::Interface);
    is_interface && types.inherits_from(from, to)
}

/// Fold a constant through a conversion to `to`.
///
/// Identity and numeric conversions keep a (converted) constant, `null`
/// stays constant when converted to a reference or nullable type, and
/// every other conversion produces a non-constant value.
pub fn convert_constant(
    types: &TypePool,
    value: ConstantValue,
    kind: ConversionKind,
    to: TypeId,
) -> Option<ConstantValue> {
    match kind {
        ConversionKind::Identity => Some(value),
        ConversionKind::NullLiteral | ConversionKind::ImplicitReference if value.is_null() => {
            Some(ConstantValue::Null)
        }
        ConversionKind::ImplicitNumeric => widen(value, types.kind(to)),
        _ => None,
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "long to double is an implicit conversion that rounds by definition"
)]
fn widen(value: ConstantValue, to: &TypeKind) -> Option<ConstantValue> {
    match (value, to) {
        (ConstantValue::Int32(v), TypeKind::Int64) => Some(ConstantValue::Int64(i64::from(v))),
        (ConstantValue::Int32(v), TypeKind::Double) => Some(ConstantValue::double(f64::from(v))),
        (ConstantValue::Int64(v), TypeKind::Double) => Some(ConstantValue::double(v as f64)),
        (ConstantValue::Char(c), TypeKind::Int32) => {
            i32::try_from(u32::from(c)).ok().map(ConstantValue::Int32)
        }
        (ConstantValue::Char(c), TypeKind::Int64) => {
            Some(ConstantValue::Int64(i64::from(u32::from(c))))
        }
        (ConstantValue::Char(c), TypeKind::Double) => {
            Some(ConstantValue::double(f64::from(u32::from(c))))
        }
        _ => None,
    }
}

/// Rank used to compare two conversions of the same argument.
///
/// Lower is better. Identity always wins; every other implicit conversion
/// ranks the same and is separated by target specificity instead.
pub(crate) fn conversion_rank(conversion: Conversion) -> u8 {
    match conversion.kind {
        ConversionKind::Identity => 0,
        ConversionKind::NoConversion => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests;

//! Compile-time constant values.

use std::fmt;

use crate::{Name, StringInterner};

/// A compile-time constant attached to a syntax node or operation.
///
/// `Double` stores the IEEE bit pattern so the enum stays `Eq + Hash`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstantValue {
    /// `null`, or `default(T)` for a type whose default is all-zero.
    Null,
    Bool(bool),
    Char(char),
    Int32(i32),
    Int64(i64),
    Double(u64),
    String(Name),
}

impl ConstantValue {
    /// Wrap an `f64` constant.
    pub fn double(value: f64) -> Self {
        ConstantValue::Double(value.to_bits())
    }

    /// The value as an array length, when it is a non-negative integer.
    pub fn as_length(&self) -> Option<u64> {
        match *self {
            ConstantValue::Int32(v) => u64::try_from(v).ok(),
            ConstantValue::Int64(v) => u64::try_from(v).ok(),
            ConstantValue::Char(c) => Some(u64::from(c)),
            _ => None,
        }
    }

    /// The value as a boolean, for constant branch folding.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ConstantValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConstantValue::Null)
    }

    /// Render the constant the way tree dumps show it.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> ConstantDisplay<'a> {
        ConstantDisplay {
            value: self,
            interner,
        }
    }
}

/// `Display` adapter produced by [`ConstantValue::display`].
pub struct ConstantDisplay<'a> {
    value: &'a ConstantValue,
    interner: &'a StringInterner,
}

impl fmt::Display for ConstantDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.value {
            ConstantValue::Null => write!(f, "null"),
            ConstantValue::Bool(true) => write!(f, "True"),
            ConstantValue::Bool(false) => write!(f, "False"),
            ConstantValue::Char(c) => write!(f, "{c}"),
            ConstantValue::Int32(v) => write!(f, "{v}"),
            ConstantValue::Int64(v) => write!(f, "{v}"),
            ConstantValue::Double(bits) => write!(f, "{}", f64::from_bits(bits)),
            ConstantValue::String(name) => write!(f, "\"{}\"", self.interner.lookup(name)),
        }
    }
}

//! Shared intermediate representation for the Opal compiler core.
//!
//! Everything here is flat and index-based, following the arena design used
//! across the compiler:
//!
//! - [`Span`], [`Name`], [`StringInterner`]: source locations and interned strings
//! - [`TypePool`] / [`TypeId`]: interned types
//! - [`SymbolTable`]: methods, parameters and locals produced by the resolver
//! - [`syntax`]: the resolved syntax tree consumed by the IR builder
//! - [`operation`]: the typed operation tree produced by the IR builder and
//!   rewritten into flow-graph statements by the flow builder
//!
//! Nodes never hold references to other nodes, only ids into their arena, so
//! trees are cheap to clone, trivially `Send`, and immutable once built.

/// Compile-time size assertion for hot IR types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

/// Define a `u32` index newtype with an `INVALID` sentinel.
macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel for "no node" in optional child slots.
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Returns `true` unless this is the [`INVALID`](Self::INVALID) sentinel.
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            /// `None` for the sentinel, `Some(self)` otherwise.
            #[inline]
            pub const fn to_option(self) -> Option<Self> {
                if self.is_valid() {
                    Some(self)
                } else {
                    None
                }
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}::INVALID", stringify!($name))
                }
            }
        }
    };
}

/// Define a `{ start, len }` range into one of an arena's flat lists.
macro_rules! define_range {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            pub start: u32,
            pub len: u16,
        }

        impl $name {
            pub const EMPTY: $name = $name { start: 0, len: 0 };

            #[inline]
            pub const fn new(start: u32, len: u16) -> Self {
                $name { start, len }
            }

            #[inline]
            pub const fn len(self) -> usize {
                self.len as usize
            }

            #[inline]
            pub const fn is_empty(self) -> bool {
                self.len == 0
            }
        }
    };
}

/// Convert a collection length to a `u32` arena index.
///
/// # Panics
/// Panics if the arena outgrows `u32::MAX` entries.
pub(crate) fn to_u32(value: usize, what: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| panic!("{what} exceeded u32::MAX entries"))
}

/// Convert a list length to a `u16` range length.
///
/// # Panics
/// Panics if a single list exceeds `u16::MAX` entries.
pub(crate) fn to_u16(value: usize, what: &str) -> u16 {
    u16::try_from(value).unwrap_or_else(|_| panic!("{what} exceeded u16::MAX entries"))
}

mod constant;
mod interner;
mod name;
pub mod operation;
mod span;
pub mod symbols;
pub mod syntax;
pub mod types;

pub use constant::{ConstantDisplay, ConstantValue};
pub use interner::{SharedInterner, StringInterner};
pub use name::Name;
pub use operation::{
    ArgumentKind, BranchKind, CaptureId, Conversion, ConversionKind, OpArena, OpFlags, OpId,
    OpKind, OpNode, OpRange, UnaryOp,
};
pub use span::{Span, SpanError};
pub use symbols::{
    CollectionBuilder, LocalId, LocalSymbol, MethodId, MethodKind, MethodSymbol, ParamId,
    ParamSymbol, SymbolTable,
};
pub use syntax::{BinaryOp, SynArena, SynExprId, SynStmtId};
pub use types::{CollectionKind, DeclKind, NamedType, TypeId, TypeKind, TypePool};

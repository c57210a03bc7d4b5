//! Type pool.
//!
//! Every type the core reasons about is interned once in a [`TypePool`] and
//! referenced by a 4-byte [`TypeId`]. Primitive types are pre-interned at
//! fixed indices so callers can name them as constants (`TypeId::INT32`).
//!
//! The pool only models what array/collection construction and branch
//! lowering need: primitives, nullable value types, arrays, spans, named
//! class/struct/interface types (with their collection shape) and type
//! parameters.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{Name, StringInterner};

// ── TypeId ──────────────────────────────────────────────────────────

/// Index into a [`TypePool`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const ERROR: TypeId = TypeId(0);
    pub const VOID: TypeId = TypeId(1);
    pub const BOOL: TypeId = TypeId(2);
    pub const CHAR: TypeId = TypeId(3);
    pub const INT32: TypeId = TypeId(4);
    pub const INT64: TypeId = TypeId(5);
    pub const DOUBLE: TypeId = TypeId(6);
    pub const STRING: TypeId = TypeId(7);
    pub const OBJECT: TypeId = TypeId(8);
    pub const EXCEPTION: TypeId = TypeId(9);

    /// Number of pre-interned types.
    const PRIMITIVE_COUNT: u32 = 10;

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
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

// ── Type kinds ──────────────────────────────────────────────────────

/// Whether a named type is a class, struct or interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum DeclKind {
    Class,
    Struct,
    Interface,
}

/// How a collection literal targeting this type is materialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CollectionKind {
    /// Not a collection type.
    None,
    /// `IEnumerable<T>`, `IReadOnlyCollection<T>`, `IReadOnlyList<T>`.
    ReadOnlyInterface,
    /// `ICollection<T>`, `IList<T>`: built through a concrete backing type.
    MutableInterface { backing: TypeId },
    /// A concrete type with constructors and an `Add` method.
    Concrete,
}

/// A class, struct or interface type, possibly constructed with type arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedType {
    /// Fully-qualified name without type arguments (`System.Collections.Generic.List`).
    pub name: Name,
    pub args: SmallVec<[TypeId; 2]>,
    pub decl: DeclKind,
    pub base: Option<TypeId>,
    pub interfaces: SmallVec<[TypeId; 2]>,
    /// Iteration element type, for collection types.
    pub element: Option<TypeId>,
    pub collection: CollectionKind,
}

impl NamedType {
    /// A plain class with no base, interfaces or collection shape.
    pub fn class(name: Name) -> Self {
        NamedType {
            name,
            args: SmallVec::new(),
            decl: DeclKind::Class,
            base: None,
            interfaces: SmallVec::new(),
            element: None,
            collection: CollectionKind::None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: &[TypeId]) -> Self {
        self.args = SmallVec::from_slice(args);
        self
    }

    #[must_use]
    pub fn with_decl(mut self, decl: DeclKind) -> Self {
        self.decl = decl;
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn with_interface(mut self, iface: TypeId) -> Self {
        self.interfaces.push(iface);
        self
    }

    /// Mark as a collection of `element` materialized per `collection`.
    #[must_use]
    pub fn with_collection(mut self, element: TypeId, collection: CollectionKind) -> Self {
        self.element = Some(element);
        self.collection = collection;
        self
    }
}

/// The structure of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    /// Result of a failed resolution; converts to and from everything silently.
    Error,
    Void,
    Bool,
    Char,
    Int32,
    Int64,
    Double,
    String,
    Object,
    /// `System.Exception`, the base of every thrown object.
    Exception,
    /// `T?` for a value type `T`.
    Nullable(TypeId),
    Array {
        elem: TypeId,
        rank: u8,
    },
    /// `Span<T>` / `ReadOnlySpan<T>`.
    Span {
        elem: TypeId,
        read_only: bool,
    },
    Named(NamedType),
    TypeParam {
        name: Name,
        has_new_constraint: bool,
    },
}

// ── Pool ────────────────────────────────────────────────────────────

/// Interning pool for [`TypeKind`]s.
#[derive(Clone, Debug)]
pub struct TypePool {
    kinds: Vec<TypeKind>,
    lookup: FxHashMap<TypeKind, TypeId>,
}

impl TypePool {
    /// Create a pool with the primitive types pre-interned.
    pub fn new() -> Self {
        let mut pool = TypePool {
            kinds: Vec::with_capacity(64),
            lookup: FxHashMap::default(),
        };
        for kind in [
            TypeKind::Error,
            TypeKind::Void,
            TypeKind::Bool,
            TypeKind::Char,
            TypeKind::Int32,
            TypeKind::Int64,
            TypeKind::Double,
            TypeKind::String,
            TypeKind::Object,
            TypeKind::Exception,
        ] {
            pool.intern(kind);
        }
        debug_assert_eq!(pool.kinds.len(), TypeId::PRIMITIVE_COUNT as usize);
        pool
    }

    /// Intern a type, returning the existing id for structurally equal types.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let raw = u32::try_from(self.kinds.len())
            .unwrap_or_else(|_| panic!("type pool exceeded u32::MAX entries"));
        let id = TypeId::new(raw);
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, id);
        id
    }

    pub fn nullable(&mut self, underlying: TypeId) -> TypeId {
        self.intern(TypeKind::Nullable(underlying))
    }

    pub fn array(&mut self, elem: TypeId, rank: u8) -> TypeId {
        self.intern(TypeKind::Array { elem, rank })
    }

    pub fn span(&mut self, elem: TypeId, read_only: bool) -> TypeId {
        self.intern(TypeKind::Span { elem, read_only })
    }

    pub fn named(&mut self, named: NamedType) -> TypeId {
        self.intern(TypeKind::Named(named))
    }

    pub fn type_param(&mut self, name: Name, has_new_constraint: bool) -> TypeId {
        self.intern(TypeKind::TypeParam {
            name,
            has_new_constraint,
        })
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        self.kinds.get(id.index()).unwrap_or(&TypeKind::Error)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Error)
    }

    pub fn is_integral(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Char | TypeKind::Int32 | TypeKind::Int64
        )
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_integral(id) || matches!(self.kind(id), TypeKind::Double)
    }

    /// Reference types accept `null` and convert by reference.
    pub fn is_reference_type(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::String | TypeKind::Object | TypeKind::Exception | TypeKind::Array { .. } => {
                true
            }
            TypeKind::Named(n) => n.decl != DeclKind::Struct,
            _ => false,
        }
    }

    pub fn is_value_type(&self, id: TypeId) -> bool {
        match self.kind(id) {
            TypeKind::Bool
            | TypeKind::Char
            | TypeKind::Int32
            | TypeKind::Int64
            | TypeKind::Double
            | TypeKind::Nullable(_)
            | TypeKind::Span { .. } => true,
            TypeKind::Named(n) => n.decl == DeclKind::Struct,
            _ => false,
        }
    }

    /// The `T` of `T?`, if `id` is a nullable value type.
    pub fn nullable_underlying(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Nullable(inner) => Some(*inner),
            _ => None,
        }
    }

    /// Element type and rank, if `id` is an array.
    pub fn array_shape(&self, id: TypeId) -> Option<(TypeId, u8)> {
        match self.kind(id) {
            TypeKind::Array { elem, rank } => Some((*elem, *rank)),
            _ => None,
        }
    }

    /// The element type a collection literal of this type holds.
    pub fn element_type(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Array { elem, .. } | TypeKind::Span { elem, .. } => Some(*elem),
            TypeKind::Named(n) => n.element,
            _ => None,
        }
    }

    pub fn named_type(&self, id: TypeId) -> Option<&NamedType> {
        match self.kind(id) {
            TypeKind::Named(n) => Some(n),
            _ => None,
        }
    }

    /// Whether `from` reaches `to` through base classes or implemented interfaces.
    pub fn inherits_from(&self, from: TypeId, to: TypeId) -> bool {
        let mut worklist: SmallVec<[TypeId; 8]> = SmallVec::new();
        worklist.push(from);
        let mut steps = 0usize;
        while let Some(cur) = worklist.pop() {
            if cur == to {
                return true;
            }
            steps += 1;
            if steps > self.kinds.len() {
                break;
            }
            if let TypeKind::Named(n) = self.kind(cur) {
                worklist.extend(n.base);
                worklist.extend(n.interfaces.iter().copied());
            }
        }
        false
    }

    // ── Display ─────────────────────────────────────────────────────

    /// Fully-qualified display (`System.Collections.Generic.List<System.Int32>`).
    pub fn display<'a>(&'a self, id: TypeId, interner: &'a StringInterner) -> TypeDisplay<'a> {
        TypeDisplay {
            pool: self,
            interner,
            id,
            style: DisplayStyle::Qualified,
        }
    }

    /// Qualified names with keyword primitives, as argument-conversion
    /// diagnostics show them (`System.Collections.Generic.IEnumerable<int>`).
    pub fn display_keywords<'a>(
        &'a self,
        id: TypeId,
        interner: &'a StringInterner,
    ) -> TypeDisplay<'a> {
        TypeDisplay {
            pool: self,
            interner,
            id,
            style: DisplayStyle::Keywords,
        }
    }

    /// Keyword/short-name display for diagnostics (`List<int>`, `int[]`).
    pub fn display_short<'a>(
        &'a self,
        id: TypeId,
        interner: &'a StringInterner,
    ) -> TypeDisplay<'a> {
        TypeDisplay {
            pool: self,
            interner,
            id,
            style: DisplayStyle::Short,
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum DisplayStyle {
    Qualified,
    Keywords,
    Short,
}

/// `Display` adapter for a [`TypeId`].
pub struct TypeDisplay<'a> {
    pool: &'a TypePool,
    interner: &'a StringInterner,
    id: TypeId,
    style: DisplayStyle,
}

impl TypeDisplay<'_> {
    fn nested(&self, id: TypeId) -> Self {
        TypeDisplay {
            pool: self.pool,
            interner: self.interner,
            id,
            style: self.style,
        }
    }

    fn primitive(&self, qualified: &'static str, keyword: &'static str) -> &'static str {
        match self.style {
            DisplayStyle::Qualified => qualified,
            DisplayStyle::Keywords | DisplayStyle::Short => keyword,
        }
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pool.kind(self.id) {
            TypeKind::Error => write!(f, "?"),
            TypeKind::Void => f.write_str(self.primitive("System.Void", "void")),
            TypeKind::Bool => f.write_str(self.primitive("System.Boolean", "bool")),
            TypeKind::Char => f.write_str(self.primitive("System.Char", "char")),
            TypeKind::Int32 => f.write_str(self.primitive("System.Int32", "int")),
            TypeKind::Int64 => f.write_str(self.primitive("System.Int64", "long")),
            TypeKind::Double => f.write_str(self.primitive("System.Double", "double")),
            TypeKind::String => f.write_str(self.primitive("System.String", "string")),
            TypeKind::Object => f.write_str(self.primitive("System.Object", "object")),
            TypeKind::Exception => f.write_str(self.primitive("System.Exception", "Exception")),
            TypeKind::Nullable(inner) => write!(f, "{}?", self.nested(*inner)),
            TypeKind::Array { elem, rank } => {
                write!(f, "{}[", self.nested(*elem))?;
                for _ in 1..*rank {
                    f.write_str(",")?;
                }
                f.write_str("]")
            }
            TypeKind::Span { elem, read_only } => {
                let name = match (self.style, read_only) {
                    (DisplayStyle::Qualified | DisplayStyle::Keywords, true) => "System.ReadOnlySpan",
                    (DisplayStyle::Qualified | DisplayStyle::Keywords, false) => "System.Span",
                    (DisplayStyle::Short, true) => "ReadOnlySpan",
                    (DisplayStyle::Short, false) => "Span",
                };
                write!(f, "{name}<{}>", self.nested(*elem))
            }
            TypeKind::Named(named) => {
                let full = self.interner.lookup(named.name);
                let name = match self.style {
                    DisplayStyle::Qualified | DisplayStyle::Keywords => full,
                    DisplayStyle::Short => full.rsplit('.').next().unwrap_or(full),
                };
                f.write_str(name)?;
                if !named.args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in named.args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", self.nested(*arg))?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeKind::TypeParam { name, .. } => f.write_str(self.interner.lookup(*name)),
        }
    }
}

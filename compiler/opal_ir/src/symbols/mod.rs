//! Symbol table: methods, parameters and locals.
//!
//! Symbols are produced by the upstream resolver and are read-only while
//! operation trees and flow graphs are built. All tables are plain vectors
//! indexed by newtype ids, in the same flattened style as the type pool.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{ConstantValue, Name, Span, StringInterner, TypeId, TypeKind, TypePool};

// ── IDs ─────────────────────────────────────────────────────────────

macro_rules! symbol_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
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
    };
}

symbol_id!(
    /// Index of a method (constructor, factory, ordinary method, lambda, local function).
    MethodId
);
symbol_id!(
    /// Index of a parameter of any method, including the body being compiled.
    ParamId
);
symbol_id!(
    /// Index of a local variable.
    LocalId
);

fn next_id(len: usize, what: &str) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("{what} table exceeded u32::MAX entries"))
}

// ── Symbols ─────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Constructor,
    /// A static method, including collection-builder factories.
    Static,
    Instance,
    LocalFunction,
    Lambda,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSymbol {
    pub name: Name,
    pub ty: TypeId,
    /// Default value for optional parameters.
    pub default: Option<ConstantValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSymbol {
    pub name: Name,
    pub kind: MethodKind,
    /// Containing type. `None` means "the receiver's type" (well-known
    /// members declared on a generic container such as `Nullable<T>`).
    pub container: Option<TypeId>,
    /// Return type. `None` means "the invocation's result type".
    pub return_type: Option<TypeId>,
    pub params: Vec<ParamId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSymbol {
    pub name: Name,
    pub ty: TypeId,
    pub span: Span,
}

/// Factory overloads a collection type delegates its literals to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionBuilder {
    /// The static class declaring the factory (`MyHashSetBuilder`).
    pub container: TypeId,
    /// Overloads of the factory method; each takes the elements span last.
    pub methods: Vec<MethodId>,
}

// ── Table ───────────────────────────────────────────────────────────

/// Resolved symbols for one compilation.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    methods: Vec<MethodSymbol>,
    params: Vec<ParamSymbol>,
    locals: Vec<LocalSymbol>,
    constructors: FxHashMap<TypeId, Vec<MethodId>>,
    builders: FxHashMap<TypeId, CollectionBuilder>,
    get_value_or_default: MethodId,
}

impl SymbolTable {
    /// Create a table with the well-known members registered.
    pub fn new(interner: &StringInterner) -> Self {
        let mut table = SymbolTable {
            methods: Vec::new(),
            params: Vec::new(),
            locals: Vec::new(),
            constructors: FxHashMap::default(),
            builders: FxHashMap::default(),
            get_value_or_default: MethodId::new(0),
        };
        table.get_value_or_default = table.add_method(MethodSymbol {
            name: interner.intern("GetValueOrDefault"),
            kind: MethodKind::Instance,
            container: None,
            return_type: None,
            params: Vec::new(),
        });
        table
    }

    pub fn add_method(&mut self, method: MethodSymbol) -> MethodId {
        let id = MethodId::new(next_id(self.methods.len(), "method"));
        self.methods.push(method);
        id
    }

    pub fn add_param(&mut self, param: ParamSymbol) -> ParamId {
        let id = ParamId::new(next_id(self.params.len(), "parameter"));
        self.params.push(param);
        id
    }

    pub fn add_local(&mut self, name: Name, ty: TypeId, span: Span) -> LocalId {
        let id = LocalId::new(next_id(self.locals.len(), "local"));
        self.locals.push(LocalSymbol { name, ty, span });
        id
    }

    /// Register a constructor of `ty` with the given parameters.
    pub fn add_constructor(&mut self, ty: TypeId, params: &[ParamSymbol]) -> MethodId {
        let params = params.iter().map(|p| self.add_param(p.clone())).collect();
        let id = self.add_method(MethodSymbol {
            name: Name::EMPTY,
            kind: MethodKind::Constructor,
            container: Some(ty),
            return_type: Some(TypeId::VOID),
            params,
        });
        self.constructors.entry(ty).or_default().push(id);
        id
    }

    /// Register a static method on `container`.
    pub fn add_static(
        &mut self,
        container: TypeId,
        name: Name,
        return_type: TypeId,
        params: &[ParamSymbol],
    ) -> MethodId {
        let params = params.iter().map(|p| self.add_param(p.clone())).collect();
        self.add_method(MethodSymbol {
            name,
            kind: MethodKind::Static,
            container: Some(container),
            return_type: Some(return_type),
            params,
        })
    }

    /// Attach a collection builder to `ty`.
    pub fn set_collection_builder(&mut self, ty: TypeId, builder: CollectionBuilder) {
        self.builders.insert(ty, builder);
    }

    #[inline]
    pub fn method(&self, id: MethodId) -> &MethodSymbol {
        &self.methods[id.index()]
    }

    #[inline]
    pub fn param(&self, id: ParamId) -> &ParamSymbol {
        &self.params[id.index()]
    }

    #[inline]
    pub fn local(&self, id: LocalId) -> &LocalSymbol {
        &self.locals[id.index()]
    }

    pub fn constructors_of(&self, ty: TypeId) -> &[MethodId] {
        self.constructors.get(&ty).map_or(&[], Vec::as_slice)
    }

    pub fn collection_builder(&self, ty: TypeId) -> Option<&CollectionBuilder> {
        self.builders.get(&ty)
    }

    /// `Nullable<T>.GetValueOrDefault()`, used when lowering `??`.
    pub fn get_value_or_default(&self) -> MethodId {
        self.get_value_or_default
    }

    /// Render a method signature as tree dumps show it.
    pub fn display_method<'a>(
        &'a self,
        id: MethodId,
        types: &'a TypePool,
        interner: &'a StringInterner,
    ) -> MethodDisplay<'a> {
        MethodDisplay {
            symbols: self,
            types,
            interner,
            id,
            receiver: None,
            result: None,
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────

/// `Display` adapter for a method signature.
///
/// `System.Collections.Generic.List<System.Int32>..ctor(System.Int32 capacity)`
/// for constructors, `MyHashSet MyHashSetBuilder.Create(...)` for methods.
pub struct MethodDisplay<'a> {
    symbols: &'a SymbolTable,
    types: &'a TypePool,
    interner: &'a StringInterner,
    id: MethodId,
    receiver: Option<TypeId>,
    result: Option<TypeId>,
}

impl MethodDisplay<'_> {
    /// Fill in the container/return type for members declared without them.
    #[must_use]
    pub fn at_call_site(mut self, receiver: Option<TypeId>, result: Option<TypeId>) -> Self {
        self.receiver = receiver;
        self.result = result;
        self
    }

    fn write_default(&self, f: &mut fmt::Formatter<'_>, param: &ParamSymbol) -> fmt::Result {
        match param.default {
            Some(ConstantValue::Null)
                if self.types.is_value_type(param.ty)
                    && !matches!(self.types.kind(param.ty), TypeKind::Nullable(_)) =>
            {
                write!(f, "default({})", self.types.display(param.ty, self.interner))
            }
            Some(value) => write!(f, "{}", value.display(self.interner)),
            None => Ok(()),
        }
    }
}

impl fmt::Display for MethodDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = self.symbols.method(self.id);
        let container = method.container.or(self.receiver);
        match method.kind {
            MethodKind::Constructor => {
                if let Some(ty) = container {
                    write!(f, "{}", self.types.display(ty, self.interner))?;
                }
                f.write_str("..ctor(")?;
            }
            _ => {
                if let Some(ret) = method.return_type.or(self.result) {
                    write!(f, "{} ", self.types.display(ret, self.interner))?;
                }
                if let Some(ty) = container {
                    write!(f, "{}.", self.types.display(ty, self.interner))?;
                }
                write!(f, "{}(", self.interner.lookup(method.name))?;
            }
        }
        for (i, &pid) in method.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let param = self.symbols.param(pid);
            let ty = self.types.display(param.ty, self.interner);
            let name = self.interner.lookup(param.name);
            if param.default.is_some() {
                write!(f, "[{ty} {name} = ")?;
                self.write_default(f, param)?;
                f.write_str("]")?;
            } else {
                write!(f, "{ty} {name}")?;
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests;

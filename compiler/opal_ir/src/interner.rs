//! Sharded string interner.
//!
//! Identifiers, type names and string constants are interned once and then
//! compared as [`Name`]s. Each shard sits behind its own `RwLock` so bodies
//! built on different threads can intern concurrently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::Name;

/// Per-shard storage for interned strings.
struct InternShard {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

impl InternShard {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(64),
        }
    }

    fn with_empty() -> Self {
        let mut shard = Self::new();
        shard.map.insert("", 0);
        shard.strings.push("");
        shard
    }
}

/// Sharded string interner for concurrent access.
pub struct StringInterner {
    shards: [RwLock<InternShard>; Name::NUM_SHARDS],
    total_count: AtomicUsize,
}

/// An interner shared between threads.
pub type SharedInterner = Arc<StringInterner>;

impl StringInterner {
    /// Create a new interner with the well-known names pre-interned.
    pub fn new() -> Self {
        let shards = std::array::from_fn(|i| {
            if i == 0 {
                RwLock::new(InternShard::with_empty())
            } else {
                RwLock::new(InternShard::new())
            }
        });
        let interner = Self {
            shards,
            total_count: AtomicUsize::new(1),
        };
        for name in WELL_KNOWN {
            interner.intern(name);
        }
        interner
    }

    #[inline]
    fn shard_for(s: &str) -> usize {
        let mut hash = 0u32;
        for byte in s.bytes().take(8) {
            hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
        }
        (hash as usize) % Name::NUM_SHARDS
    }

    /// Intern a string, returning its Name.
    ///
    /// # Panics
    /// Panics if a shard exceeds `Name::MAX_LOCAL` entries.
    pub fn intern(&self, s: &str) -> Name {
        let shard_idx = Self::shard_for(s);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard_idx is bounded by NUM_SHARDS (16)"
        )]
        let shard_u32 = shard_idx as u32;
        let shard = &self.shards[shard_idx];

        if let Some(&local) = shard.read().map.get(s) {
            return Name::new(shard_u32, local);
        }

        let mut guard = shard.write();
        if let Some(&local) = guard.map.get(s) {
            return Name::new(shard_u32, local);
        }

        let local = match u32::try_from(guard.strings.len()) {
            Ok(local) if local <= Name::MAX_LOCAL => local,
            _ => panic!("interner shard {shard_idx} exceeded capacity"),
        };
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        guard.strings.push(leaked);
        guard.map.insert(leaked, local);
        self.total_count.fetch_add(1, Ordering::Relaxed);

        Name::new(shard_u32, local)
    }

    /// Look up a name without interning it.
    pub fn get(&self, s: &str) -> Option<Name> {
        let shard_idx = Self::shard_for(s);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard_idx is bounded by NUM_SHARDS (16)"
        )]
        let shard_u32 = shard_idx as u32;
        let guard = self.shards[shard_idx].read();
        guard.map.get(s).map(|&local| Name::new(shard_u32, local))
    }

    /// Look up the string for a Name.
    pub fn lookup(&self, name: Name) -> &'static str {
        let guard = self.shards[name.shard()].read();
        guard.strings.get(name.local()).copied().unwrap_or("<unknown>")
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.total_count.load(Ordering::Relaxed)
    }

    /// Check whether only the empty string is interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Names every compilation touches: well-known type and member names.
const WELL_KNOWN: &[&str] = &[
    "System.Boolean",
    "System.Char",
    "System.Int32",
    "System.Int64",
    "System.Double",
    "System.String",
    "System.Object",
    "System.Void",
    "System.Nullable",
    "System.Span",
    "System.ReadOnlySpan",
    "System.Exception",
    "GetValueOrDefault",
    "capacity",
    "comparer",
    "items",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let interner = StringInterner::new();
        let a = interner.intern("capacity");
        let b = interner.intern("capacity");
        assert_eq!(a, b);
        assert_eq!(interner.lookup(a), "capacity");
    }

    #[test]
    fn distinct_strings_get_distinct_names() {
        let interner = StringInterner::new();
        let before = interner.len();
        let a = interner.intern("d1");
        let b = interner.intern("d2");
        assert_ne!(a, b);
        assert_eq!(interner.len(), before + 2);
    }

    #[test]
    fn empty_string_is_pre_interned() {
        let interner = StringInterner::new();
        assert_eq!(interner.intern(""), Name::EMPTY);
        assert_eq!(interner.get("never-seen"), None);
    }

    #[test]
    fn shared_across_threads() {
        let interner: SharedInterner = Arc::new(StringInterner::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let interner = Arc::clone(&interner);
                std::thread::spawn(move || interner.intern(&format!("local{}", i % 2)))
            })
            .collect();
        let names: Vec<Name> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Name::EMPTY))
            .collect();
        assert_eq!(names[0], names[2]);
        assert_eq!(names[1], names[3]);
    }
}

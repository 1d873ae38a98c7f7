//! Process-wide lookup cache shared by every request of a checker.
//!
//! Entries are insert-only: a key keeps the first payload stored for it until
//! an explicit `invalidate`/`clear`. Negative answers are cached exactly like
//! positive ones. Payloads are reference-counted so readers share them.
//!
//! Remote lookups of a cold key run through [`ValidationCache::single_flight`],
//! which admits one caller per key at a time; the others wait and then read
//! the answer the first one cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::validation::collaborators::{Signature, SymbolKind, SymbolLookup};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Symbol {
        kind: SymbolKind,
        qualified_name: String,
    },
    MethodSignature {
        class_name: String,
        method_name: String,
    },
    FunctionSignature {
        module: String,
        function_name: String,
    },
}

impl CacheKey {
    pub fn symbol(kind: SymbolKind, qualified_name: &str) -> Self {
        CacheKey::Symbol {
            kind,
            qualified_name: qualified_name.to_string(),
        }
    }

    pub fn method_signature(class_name: &str, method_name: &str) -> Self {
        CacheKey::MethodSignature {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
        }
    }

    pub fn function_signature(module: &str, function_name: &str) -> Self {
        CacheKey::FunctionSignature {
            module: module.to_string(),
            function_name: function_name.to_string(),
        }
    }
}

/// Cached payload: an existence answer or a (possibly absent) signature.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedLookup {
    Symbol(Arc<SymbolLookup>),
    Signature(Option<Arc<Signature>>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct ValidationCache {
    entries: RwLock<IndexMap<CacheKey, CachedLookup>>,
    flights: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a key up, counting the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<CachedLookup> {
        let found = self.entries.read().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `value` unless the key is already present, and return whatever
    /// the cache holds for the key afterwards. Concurrent inserts of the same
    /// cold key all observe the first value written.
    pub fn insert_if_absent(&self, key: CacheKey, value: CachedLookup) -> CachedLookup {
        let mut entries = self.entries.write();
        entries.entry(key).or_insert(value).clone()
    }

    /// Run `fetch` while holding the gate for `key`. Callers should re-check
    /// the cache inside `fetch`, since a previous holder may have filled it.
    pub fn single_flight<T>(&self, key: &CacheKey, fetch: impl FnOnce() -> T) -> T {
        let gate = self.flights.lock().entry(key.clone()).or_default().clone();
        let out = {
            let _held = gate.lock();
            fetch()
        };
        let mut flights = self.flights.lock();
        // The map and this caller hold the only references: nobody is queued.
        if Arc::strong_count(&gate) == 2 {
            flights.remove(key);
        }
        out
    }

    pub fn get_symbol(&self, kind: SymbolKind, qualified_name: &str) -> Option<Arc<SymbolLookup>> {
        match self.get(&CacheKey::symbol(kind, qualified_name)) {
            Some(CachedLookup::Symbol(lookup)) => Some(lookup),
            _ => None,
        }
    }

    pub fn insert_symbol(
        &self,
        kind: SymbolKind,
        qualified_name: &str,
        lookup: SymbolLookup,
    ) -> Arc<SymbolLookup> {
        let stored = self.insert_if_absent(
            CacheKey::symbol(kind, qualified_name),
            CachedLookup::Symbol(Arc::new(lookup)),
        );
        match stored {
            CachedLookup::Symbol(lookup) => lookup,
            // Keys of the Symbol variant only ever hold symbol payloads.
            CachedLookup::Signature(_) => Arc::new(SymbolLookup::missing()),
        }
    }

    /// `Some(None)` is a cached "no signature known" answer.
    pub fn get_signature(&self, key: &CacheKey) -> Option<Option<Arc<Signature>>> {
        match self.get(key) {
            Some(CachedLookup::Signature(signature)) => Some(signature),
            _ => None,
        }
    }

    pub fn insert_signature(
        &self,
        key: CacheKey,
        signature: Option<Signature>,
    ) -> Option<Arc<Signature>> {
        let stored =
            self.insert_if_absent(key, CachedLookup::Signature(signature.map(Arc::new)));
        match stored {
            CachedLookup::Signature(signature) => signature,
            CachedLookup::Symbol(_) => None,
        }
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().shift_remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::collaborators::ParamSpec;

    #[test]
    fn first_insert_wins() {
        let cache = ValidationCache::new();
        let first = cache.insert_symbol(SymbolKind::Class, "acme.Widget", SymbolLookup::found(["acme"]));
        let second = cache.insert_symbol(SymbolKind::Class, "acme.Widget", SymbolLookup::missing());
        assert!(first.exists);
        assert!(second.exists);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn negative_answers_are_cached() {
        let cache = ValidationCache::new();
        assert!(cache.get_symbol(SymbolKind::Module, "ghost_lib").is_none());
        cache.insert_symbol(SymbolKind::Module, "ghost_lib", SymbolLookup::missing());
        let hit = cache.get_symbol(SymbolKind::Module, "ghost_lib").unwrap();
        assert!(!hit.exists);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn kinds_do_not_collide() {
        let cache = ValidationCache::new();
        cache.insert_symbol(SymbolKind::Module, "acme.util", SymbolLookup::found(["acme"]));
        assert!(cache.get_symbol(SymbolKind::Class, "acme.util").is_none());
    }

    #[test]
    fn absent_signature_is_a_cached_answer() {
        let cache = ValidationCache::new();
        let key = CacheKey::method_signature("acme.Widget", "render");
        assert_eq!(cache.get_signature(&key), None);
        cache.insert_signature(key.clone(), None);
        assert_eq!(cache.get_signature(&key), Some(None));

        let other = CacheKey::function_signature("acme", "make");
        let signature = Signature {
            params: vec![ParamSpec::required("name", Some("str"))],
            return_type: None,
        };
        let stored = cache.insert_signature(other.clone(), Some(signature.clone()));
        assert_eq!(stored.as_deref(), Some(&signature));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = ValidationCache::new();
        cache.insert_symbol(SymbolKind::Module, "a", SymbolLookup::missing());
        cache.insert_symbol(SymbolKind::Module, "b", SymbolLookup::missing());

        assert!(cache.invalidate(&CacheKey::symbol(SymbolKind::Module, "a")));
        assert!(!cache.invalidate(&CacheKey::symbol(SymbolKind::Module, "a")));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn concurrent_inserts_agree() {
        use rayon::prelude::*;

        let cache = ValidationCache::new();
        let seen: Vec<bool> = (0..64)
            .into_par_iter()
            .map(|i| {
                let lookup = if i % 2 == 0 {
                    SymbolLookup::found(["acme"])
                } else {
                    SymbolLookup::missing()
                };
                cache.insert_symbol(SymbolKind::Class, "acme.Race", lookup).exists
            })
            .collect();
        let first = cache.get_symbol(SymbolKind::Class, "acme.Race").unwrap().exists;
        assert!(seen.iter().all(|&exists| exists == first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn single_flight_admits_one_fetch_per_key() {
        use std::sync::atomic::AtomicUsize;
        use std::time::Duration;

        let cache = ValidationCache::new();
        let key = CacheKey::symbol(SymbolKind::Module, "ghost_lib");
        let fetches = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache.single_flight(&key, || {
                        if cache.get_symbol(SymbolKind::Module, "ghost_lib").is_some() {
                            return;
                        }
                        fetches.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        cache.insert_symbol(SymbolKind::Module, "ghost_lib", SymbolLookup::missing());
                    })
                });
            }
        });

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(cache.flights.lock().is_empty());
    }
}

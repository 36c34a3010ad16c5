use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use slab::Slab;
use tracing::debug;

/// A key-value store for memoized values.
///
/// Keys are 128-bit hashes. A memoizer holds both the results of atomic
/// sub-calls and the recorders keeping track of served intervals, so a caller
/// may share one memoizer across several combinators.
pub trait Memoizer<V>: Send + Sync {
    /// Look up the value stored under `key`.
    fn lookup(&self, key: u128) -> Option<V>;

    /// Store `value` under `key` unless the key is already taken.
    ///
    /// Returns the value that ends up stored, which is the existing one if
    /// there was any.
    fn insert(&self, key: u128, value: V) -> V;

    /// Whether a value is stored under `key`.
    fn contains(&self, key: u128) -> bool;

    /// Usage counters.
    fn stats(&self) -> Stats;

    /// Look up the value under `key` or store the one produced by `make`.
    fn get_or_compute(&self, key: u128, make: impl FnOnce() -> V) -> V
    where
        Self: Sized,
    {
        match self.lookup(key) {
            Some(value) => value,
            None => self.insert(key, make()),
        }
    }
}

/// A value that may be held outside a [`Cache`] while stored in it.
///
/// Values in use are never evicted, neither to make room nor by age.
pub trait Evictable {
    /// Whether the value is still in use outside the cache.
    fn in_use(&self) -> bool {
        false
    }
}

/// Usage counters of a memoizer.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Stats {
    /// Lookups that found a value.
    pub hits: usize,
    /// Lookups that found nothing.
    pub misses: usize,
    /// Values admitted into the store.
    pub loads: usize,
    /// Values removed to stay within capacity or by [`Cache::evict`].
    pub evictions: usize,
}

/// The default in-memory memoizer.
///
/// Unbounded unless created with [`Cache::bounded`], in which case the least
/// recently used value not [in use](Evictable::in_use) makes room for a new
/// one. Evicting a recorder forgets which intervals were served, so the next
/// query re-fetches them. Recorders held by a running call are in use.
pub struct Cache<V> {
    data: RwLock<CacheData<V>>,
    capacity: Option<NonZeroUsize>,
    clock: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
    loads: AtomicUsize,
    evictions: AtomicUsize,
}

struct CacheData<V> {
    /// Maps from keys to slots in `entries`.
    index: FxHashMap<u128, usize>,
    entries: Slab<CacheEntry<V>>,
}

/// A memoized value.
struct CacheEntry<V> {
    key: u128,
    value: V,
    /// How many evictions have passed since the entry has last been used.
    age: AtomicUsize,
    /// Tick of the last use.
    used: AtomicU64,
}

impl<V> Cache<V> {
    /// Create an empty, unbounded cache.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create an empty cache holding at most `capacity` values.
    ///
    /// Values in use may push the cache past its capacity until they are
    /// released. Making room scans all stored values, so inserting into a full
    /// cache takes time linear in its capacity.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            data: RwLock::new(CacheData {
                index: FxHashMap::default(),
                entries: Slab::new(),
            }),
            capacity,
            clock: AtomicU64::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
            evictions: AtomicUsize::new(0),
        }
    }

    /// The maximum number of values, if any.
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// The number of stored values.
    pub fn len(&self) -> usize {
        self.data.read().entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all values.
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.index.clear();
        data.entries.clear();
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}

impl<V: Evictable> Cache<V> {
    /// Evict all values whose age is larger than `max_age`.
    ///
    /// The age of a value grows by one during each eviction and is reset to
    /// zero when the value is looked up. Set `max_age` to zero to drop every
    /// value not used since the last eviction. Values in use are kept.
    pub fn evict(&self, max_age: usize) {
        let mut data = self.data.write();
        let CacheData { index, entries } = &mut *data;
        let before = entries.len();
        entries.retain(|_, entry| {
            let age = entry.age.get_mut();
            *age += 1;
            let keep = *age <= max_age || entry.value.in_use();
            if !keep {
                index.remove(&entry.key);
            }
            keep
        });
        let evicted = before - entries.len();
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        debug!(evicted, max_age, "evicted cache");
    }
}

impl<V: Evictable> CacheData<V> {
    /// Remove the least recently used entry that is not in use.
    fn evict_lru(&mut self) -> Option<u128> {
        let (slot, key) = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.value.in_use())
            .min_by_key(|(_, entry)| entry.used.load(Ordering::Relaxed))
            .map(|(slot, entry)| (slot, entry.key))?;
        self.entries.remove(slot);
        self.index.remove(&key);
        Some(key)
    }
}

impl<V: Clone + Send + Sync + Evictable> Memoizer<V> for Cache<V> {
    fn lookup(&self, key: u128) -> Option<V> {
        let data = self.data.read();
        let found = data.index.get(&key).map(|&slot| {
            let entry = &data.entries[slot];
            entry.age.store(0, Ordering::Relaxed);
            entry.used.store(self.tick(), Ordering::Relaxed);
            entry.value.clone()
        });
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn insert(&self, key: u128, value: V) -> V {
        let mut data = self.data.write();
        if let Some(&slot) = data.index.get(&key) {
            // A concurrent call may have stored a value in the meantime.
            return data.entries[slot].value.clone();
        }

        while let Some(capacity) = self.capacity
            && data.entries.len() >= capacity.get()
            && let Some(evicted) = data.evict_lru()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = ?evicted, "evicted least recently used value");
        }

        let slot = data.entries.insert(CacheEntry {
            key,
            value: value.clone(),
            age: AtomicUsize::new(0),
            used: AtomicU64::new(self.tick()),
        });
        data.index.insert(key, slot);
        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!(key = ?key, len = data.entries.len(), "stored value");
        value
    }

    fn contains(&self, key: u128) -> bool {
        self.data.read().index.contains_key(&key)
    }

    fn stats(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}

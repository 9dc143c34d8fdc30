//! Resident-set cache: a bounded, load-on-miss, evict-on-insert cache for
//! objects that are expensive to read from disk (genome indexes,
//! methylomes) and are shared read-only across worker threads once loaded.
//!
//! Concurrent misses on the same key single-flight: the first caller
//! claims a `Loading` slot and does the I/O; later callers for the same
//! key block on a condvar instead of re-reading the file. A failed load
//! clears the slot without evicting anything else, so a bad request
//! doesn't cost the cache one of its resident entries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

use indexmap::IndexSet;

use crate::error::Result;

enum Slot<T> {
    Loading,
    Ready(Arc<T>),
}

struct Inner<T> {
    slots: HashMap<String, Slot<T>>,
    /// Recency order, most-recently-used last. Only entries with a
    /// `Ready` slot appear here; `Loading` placeholders are tracked only
    /// in `slots` until they resolve.
    order: IndexSet<String>,
}

/// A bounded cache of `T`, keyed by name, loaded from `dir` via `loader`.
pub struct ResidentCache<T> {
    dir: PathBuf,
    capacity: usize,
    inner: Mutex<Inner<T>>,
    ready: Condvar,
    loader: Box<dyn Fn(&std::path::Path, &str) -> Result<T> + Send + Sync>,
}

impl<T> ResidentCache<T> {
    pub fn new<F>(dir: PathBuf, capacity: usize, loader: F) -> Self
    where
        F: Fn(&std::path::Path, &str) -> Result<T> + Send + Sync + 'static,
    {
        assert!(capacity > 0, "resident cache capacity must be positive");
        Self {
            dir,
            capacity,
            inner: Mutex::new(Inner { slots: HashMap::new(), order: IndexSet::new() }),
            ready: Condvar::new(),
            loader: Box::new(loader),
        }
    }

    /// Number of resident (fully loaded) entries right now.
    pub fn resident_count(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        matches!(self.inner.lock().unwrap().slots.get(name), Some(Slot::Ready(_)))
    }

    /// Get a handle to `name`, loading it from disk on a miss. Concurrent
    /// callers for the same missing key block until the first caller's
    /// load resolves (success or failure) rather than duplicating I/O.
    pub fn get(&self, name: &str) -> Result<Arc<T>> {
        loop {
            let mut guard = self.inner.lock().unwrap();
            match guard.slots.get(name) {
                Some(Slot::Ready(v)) => {
                    let v = v.clone();
                    guard.order.shift_remove(name);
                    guard.order.insert(name.to_string());
                    return Ok(v);
                }
                Some(Slot::Loading) => {
                    guard = self.ready.wait(guard).unwrap();
                    continue;
                }
                None => {
                    guard.slots.insert(name.to_string(), Slot::Loading);
                    drop(guard);
                    break;
                }
            }
        }

        let result = (self.loader)(&self.dir, name);

        let mut guard = self.inner.lock().unwrap();
        match result {
            Ok(value) => {
                let value = Arc::new(value);
                guard.slots.insert(name.to_string(), Slot::Ready(value.clone()));
                guard.order.insert(name.to_string());
                self.evict_if_over_capacity(&mut guard);
                drop(guard);
                self.ready.notify_all();
                Ok(value)
            }
            Err(e) => {
                guard.slots.remove(name);
                drop(guard);
                self.ready.notify_all();
                Err(e)
            }
        }
    }

    /// Evict the least-recently-used resident entries until capacity is
    /// met. Only called right after a successful insert, so a failed load
    /// never costs the cache a resident entry.
    fn evict_if_over_capacity(&self, guard: &mut Inner<T>) {
        while guard.order.len() > self.capacity {
            if let Some(lru) = guard.order.shift_remove_index(0) {
                guard.slots.remove(&lru);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_cache(capacity: usize) -> (Arc<ResidentCache<String>>, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let loads_for_loader = loads.clone();
        let cache = Arc::new(ResidentCache::new(PathBuf::from("."), capacity, move |_dir, name| {
            loads_for_loader.fetch_add(1, Ordering::SeqCst);
            Ok(name.to_string())
        }));
        (cache, loads)
    }

    #[test]
    fn loads_once_and_caches() {
        let (cache, loads) = counting_cache(2);
        assert_eq!(*cache.get("a").unwrap(), "a");
        assert_eq!(*cache.get("a").unwrap(), "a");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resident_count(), 1);
    }

    /// Scenario: capacity 2, access sequence A B A C. After that sequence,
    /// B has aged out and the resident set is {A, C}.
    #[test]
    fn scenario_6_lru_eviction_order() {
        let (cache, _loads) = counting_cache(2);
        cache.get("A").unwrap();
        cache.get("B").unwrap();
        cache.get("A").unwrap();
        cache.get("C").unwrap();
        assert!(cache.contains("A"));
        assert!(cache.contains("C"));
        assert!(!cache.contains("B"));
        assert_eq!(cache.resident_count(), 2);
    }

    #[test]
    fn concurrent_misses_on_same_key_single_flight() {
        let (cache, loads) = counting_cache(4);
        let barrier = Arc::new(std::sync::Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                cache.get("shared").unwrap()
            }));
        }
        for h in handles {
            assert_eq!(*h.join().unwrap(), "shared");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_does_not_evict_other_entries() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loads_for_loader = loads.clone();
        let cache = ResidentCache::new(PathBuf::from("."), 2, move |_dir, name| {
            loads_for_loader.fetch_add(1, Ordering::SeqCst);
            if name == "bad" {
                Err(crate::error::Error::MethylomeNotFound(name.to_string()))
            } else {
                Ok(name.to_string())
            }
        });
        cache.get("good").unwrap();
        assert!(cache.get("bad").is_err());
        assert!(cache.contains("good"));
        assert!(!cache.contains("bad"));
    }
}

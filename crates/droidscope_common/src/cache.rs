//! TTL-scoped result cache.
//!
//! Entries are stored as `serde_json::Value` with their creation instant and
//! are only checked for expiry when read; there is no background sweeper.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    created_at: Instant,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Keyed memo of computed records.
///
/// Each key has its own slot lock, held from the freshness check until the
/// new value is stored, so concurrent misses on one key compute once while
/// other keys proceed.
pub struct ResultCache {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Return the value cached under `key` if younger than `ttl`, otherwise
    /// run `compute` and cache its result.
    ///
    /// Errors from `compute` are returned as-is and leave any previous entry
    /// in place.
    pub fn get_or_compute<T, E, F>(&self, key: &str, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = entry.as_ref() {
            let age = self.clock.now().saturating_duration_since(cached.created_at);
            if age < ttl {
                match serde_json::from_value::<T>(cached.value.clone()) {
                    Ok(value) => {
                        debug!("  cache hit: {} (age {:?})", key, age);
                        return Ok(value);
                    }
                    Err(e) => warn!("  cache entry {} has unexpected shape: {}", key, e),
                }
            }
        }

        debug!("  cache miss: {}", key);
        let value = compute()?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                *entry = Some(CacheEntry {
                    value: json,
                    created_at: self.clock.now(),
                });
            }
            Err(e) => warn!("  not caching {}: {}", key, e),
        }

        Ok(value)
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &str) {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(key).cloned()
        };
        if let Some(slot) = slot {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of keys holding a value, fresh or stale.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn manual_cache() -> (Arc<ManualClock>, ResultCache) {
        let clock = Arc::new(ManualClock::new());
        let cache = ResultCache::with_clock(clock.clone());
        (clock, cache)
    }

    fn counted(calls: &AtomicUsize, value: u64) -> Result<u64, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[test]
    fn test_hit_within_ttl_computes_once() {
        let (_clock, cache) = manual_cache();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(300);

        let first = cache.get_or_compute("device", ttl, || counted(&calls, 7));
        let second = cache.get_or_compute("device", ttl, || counted(&calls, 8));

        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ttl_boundary() {
        let (clock, cache) = manual_cache();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(30);

        assert_eq!(cache.get_or_compute("net", ttl, || counted(&calls, 1)), Ok(1));

        clock.advance(Duration::from_millis(29_999));
        assert_eq!(cache.get_or_compute("net", ttl, || counted(&calls, 2)), Ok(1));

        // exactly at the TTL the entry is stale
        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get_or_compute("net", ttl, || counted(&calls, 3)), Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_not_cached() {
        let (clock, cache) = manual_cache();
        let ttl = Duration::from_secs(10);

        assert_eq!(cache.get_or_compute("k", ttl, || Ok::<_, String>(1u64)), Ok(1));
        clock.advance(Duration::from_secs(11));

        let err = cache.get_or_compute::<u64, _, _>("k", ttl, || Err("down".to_string()));
        assert_eq!(err, Err("down".to_string()));

        // stale entry still present, next success refreshes it
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_or_compute("k", ttl, || Ok::<_, String>(2u64)), Ok(2));

        let err = cache.get_or_compute::<u64, _, _>("fresh", ttl, || Err("down".to_string()));
        assert!(err.is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let (_clock, cache) = manual_cache();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let _ = cache.get_or_compute("x", Duration::ZERO, || counted(&calls, 1));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (_clock, cache) = manual_cache();
        let ttl = Duration::from_secs(60);
        let calls = AtomicUsize::new(0);

        let _ = cache.get_or_compute("a", ttl, || counted(&calls, 1));
        let _ = cache.get_or_compute("b", ttl, || counted(&calls, 1));
        assert_eq!(cache.len(), 2);

        cache.invalidate("a");
        assert_eq!(cache.len(), 1);
        let _ = cache.get_or_compute("a", ttl, || counted(&calls, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        cache.invalidate("missing");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_are_independent() {
        let (_clock, cache) = manual_cache();
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.get_or_compute("a", ttl, || Ok::<_, String>("one".to_string())), Ok("one".to_string()));
        assert_eq!(cache.get_or_compute("b", ttl, || Ok::<_, String>("two".to_string())), Ok("two".to_string()));
        assert_eq!(cache.get_or_compute("a", ttl, || Ok::<_, String>("x".to_string())), Ok("one".to_string()));
    }

    #[test]
    fn test_concurrent_misses_compute_once() {
        let cache = Arc::new(ResultCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache.get_or_compute("slow", Duration::from_secs(60), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok::<_, String>(42u64)
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

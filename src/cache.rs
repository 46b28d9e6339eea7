//! Time-bounded memoization for query results. Expiry is lazy: entries are
//! dropped when observed stale, and a stale hit is never returned.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

pub struct QueryCache<V> {
    inner: RwLock<AHashMap<String, Entry<V>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the stored value only while it is fresh. An expired entry is
    /// removed on observation and counts as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = {
            let guard = self.inner.read();
            match guard.get(key) {
                Some(entry) if entry.is_fresh() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.inner.write().remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores with the cache-wide default TTL, overwriting any existing entry.
    pub fn put(&self, key: String, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    pub fn put_with_ttl(&self, key: String, value: V, ttl: Duration) {
        self.inner.write().insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// With no pattern, clears everything; with a pattern, removes only keys
    /// containing it. Write operations call this to keep reads coherent.
    pub fn invalidate(&self, pattern: Option<&str>) {
        let mut guard = self.inner.write();
        match pattern {
            None => guard.clear(),
            Some(needle) => guard.retain(|key, _| !key.contains(needle)),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.read().len(),
        }
    }
}

/// Cache key for a statement and its parameters. Parameter serialization is
/// canonical (object keys sorted recursively) so logically-identical
/// parameter maps produce identical keys regardless of construction order.
pub fn cache_key(statement: &str, params: &BTreeMap<String, Value>) -> String {
    let mut key = String::with_capacity(statement.len() + 32);
    key.push_str(statement);
    key.push_str("::");
    key.push('{');
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(&Value::String(name.clone()).to_string());
        key.push(':');
        write_canonical(value, &mut key);
    }
    key.push('}');
    key
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(&map[k], out);
            }
            out.push('}');
        }
    }
}

//! Query Micro-Cache
//!
//! Tiny per-request map keyed by query fingerprint, used to avoid re-issuing
//! identical read queries inside one request. Capped in size; oldest entry
//! drops on overflow. Never shared across requests - the owner clears it
//! between logical requests.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use serde_json::Value;

use super::QUERY_CACHE_CAPACITY;

/// Fingerprint a query description string
pub fn fingerprint(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

#[derive(Default)]
struct Inner {
    entries: HashMap<u64, Value>,
    order: VecDeque<u64>,
}

/// Capped in-process result cache keyed by query fingerprint
pub struct QueryCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(QUERY_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    pub fn get(&self, fp: u64) -> Option<Value> {
        self.inner.lock().entries.get(&fp).cloned()
    }

    pub fn insert(&self, fp: u64, value: Value) {
        let mut inner = self.inner.lock();
        if inner.entries.insert(fp, value).is_none() {
            inner.order.push_back(fp);
        }
        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

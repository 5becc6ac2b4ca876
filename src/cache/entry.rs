//! Cache key derivation and entry bookkeeping
//!
//! Keys are derived purely and deterministically from (group, key); the
//! cache never hashes. Callers with long or variable keys hash them before
//! handing them in.

use std::time::{Duration, Instant};

use serde_json::Value;

use super::KEY_PREFIX;

/// Derive the full storage key for a (group, key) pair.
///
/// `"{prefix}_{group}_{key}"` - stable across processes so all tiers agree.
pub fn derive_key(group: &str, key: &str) -> String {
    format!("{}_{}_{}", KEY_PREFIX, group, key)
}

/// Rough resident-size estimate for a JSON payload, in bytes.
///
/// Used for the process tier's memory budget accounting. The constants
/// approximate per-node allocator overhead; exactness is not required, only
/// monotonicity with payload size.
pub fn estimated_size(value: &Value) -> u64 {
    match value {
        Value::Null | Value::Bool(_) => 8,
        Value::Number(_) => 16,
        Value::String(s) => 24 + s.len() as u64,
        Value::Array(items) => 24 + items.iter().map(estimated_size).sum::<u64>(),
        Value::Object(map) => {
            24 + map
                .iter()
                .map(|(k, v)| 24 + k.len() as u64 + estimated_size(v))
                .sum::<u64>()
        }
    }
}

/// One entry in the process tier
#[derive(Debug, Clone)]
pub(crate) struct ProcessEntry {
    pub value: Value,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub size: u64,
}

impl ProcessEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        let now = Instant::now();
        let size = estimated_size(&value);
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
            size,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_key_shape() {
        assert_eq!(derive_key("network_data", "total_posts_count"), "netdash_network_data_total_posts_count");
        assert_eq!(derive_key("default", "k"), "netdash_default_k");
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_key("g", "k");
        let b = derive_key("g", "k");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_key_separates_groups() {
        assert_ne!(derive_key("g1", "k"), derive_key("g2", "k"));
    }

    #[test]
    fn test_estimated_size_grows_with_payload() {
        let small = json!({"a": 1});
        let large = json!({"a": 1, "b": "some longer string value", "c": [1, 2, 3, 4]});
        assert!(estimated_size(&large) > estimated_size(&small));
    }

    #[test]
    fn test_entry_expiry() {
        let live = ProcessEntry::new(json!(42), Duration::from_secs(60));
        assert!(!live.is_expired());

        let dead = ProcessEntry::new(json!(42), Duration::ZERO);
        assert!(dead.is_expired());
    }

    proptest::proptest! {
        #[test]
        fn prop_derive_key_carries_both_parts(group in "[a-z_]{1,16}", key in "[a-z0-9_]{1,32}") {
            let derived = derive_key(&group, &key);
            proptest::prop_assert!(derived.starts_with(KEY_PREFIX));
            proptest::prop_assert!(derived.contains(&group));
            proptest::prop_assert!(derived.ends_with(&key));
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key-value store seam and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use blattwerk_core::error::{BlattwerkError, Result};

/// Byte-oriented key-value persistence.
///
/// `set` fails with `StorageQuotaExceeded` when the write would push the
/// store past its byte quota; the previous value (if any) is left intact.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Process-local store, mainly for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once `quota_bytes` of keys and values
    /// would be exceeded.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(quota) = self.quota_bytes {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
            let size = (key.len() + value.len()) as u64;
            if others + size > quota {
                return Err(BlattwerkError::StorageQuotaExceeded {
                    key: key.to_string(),
                    size,
                    quota,
                });
            }
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").expect("get"), None);
        store.set("a", b"one").expect("set");
        store.set("a", b"two").expect("overwrite");
        assert_eq!(store.get("a").expect("get"), Some(b"two".to_vec()));
        store.remove("a").expect("remove");
        store.remove("a").expect("remove missing");
        assert!(store.is_empty());
    }

    #[test]
    fn quota_rejects_oversized_write_and_keeps_old_value() {
        let store = MemoryStore::with_quota(16);
        store.set("k", b"small").expect("fits");
        let err = store.set("k", &[0u8; 64]).expect_err("over quota");
        assert!(matches!(err, BlattwerkError::StorageQuotaExceeded { quota: 16, .. }));
        assert_eq!(store.get("k").expect("get"), Some(b"small".to_vec()));
    }

    #[test]
    fn keys_filter_by_prefix() {
        let store = MemoryStore::new();
        store.set("blattwerk.sessions.a", b"1").expect("set");
        store.set("blattwerk.sessions.b", b"2").expect("set");
        store.set("other", b"3").expect("set");
        assert_eq!(
            store.keys("blattwerk.sessions.").expect("keys"),
            vec!["blattwerk.sessions.a", "blattwerk.sessions.b"]
        );
    }
}

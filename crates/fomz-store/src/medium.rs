//! The synchronous key-value medium underneath the local store.

use std::collections::BTreeMap;

use fomz_shared::{FomzError, Result};

/// String-keyed, string-valued storage with no query capability.
///
/// Implementations reject writes that would push usage past their capacity
/// with [`FomzError::QuotaExceeded`].
pub trait KvMedium: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Sum of key and value lengths over every stored entry.
    fn used_bytes(&self) -> Result<u64> {
        let mut total = 0u64;
        for key in self.keys()? {
            let value_len = self.get(&key)?.map(|v| v.len()).unwrap_or(0);
            total += (key.len() + value_len) as u64;
        }
        Ok(total)
    }
}

/// In-process medium, optionally bounded to a byte capacity.
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    entries: BTreeMap<String, String>,
    capacity: Option<u64>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity_bytes: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: Some(capacity_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity {
            let current: u64 = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
            let needed = current + (key.len() + value.len()) as u64;
            if needed > capacity {
                return Err(FomzError::QuotaExceeded(format!(
                    "writing {key} needs {needed} bytes, capacity is {capacity}"
                )));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

//! Usage estimate for the local medium.

use fomz_shared::Result;
use serde::{Deserialize, Serialize};

use crate::local::LocalStore;
use crate::medium::KvMedium;

/// Approximate medium usage. Computed from key and value lengths, not from
/// any authoritative quota API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    #[serde(rename = "usedKB")]
    pub used_kb: f64,
    #[serde(rename = "totalKB")]
    pub total_kb: u64,
    pub percentage: f64,
    pub is_near_limit: bool,
}

impl LocalStore {
    pub fn check_quota(&self) -> Result<QuotaStatus> {
        let used_bytes = self.medium().used_bytes()?;
        let total_kb = self.config().quota_kb;
        let used_kb = used_bytes as f64 / 1024.0;
        let percentage = if total_kb == 0 {
            100.0
        } else {
            used_kb / total_kb as f64 * 100.0
        };

        Ok(QuotaStatus {
            used_kb,
            total_kb,
            percentage,
            is_near_limit: percentage >= self.config().near_limit_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::MemoryMedium;

    #[test]
    fn percentage_is_monotonic_and_returns_to_baseline() {
        let mut store = LocalStore::new(MemoryMedium::new());
        let baseline = store.check_quota().unwrap();
        assert_eq!(baseline.total_kb, 5120);
        assert_eq!(baseline.percentage, 0.0);

        let mut last = baseline.percentage;
        for i in 0..20 {
            let key = format!("key-{i}");
            store.medium_mut().set(&key, &"x".repeat(100 * (i + 1))).unwrap();
            let now = store.check_quota().unwrap().percentage;
            assert!(now >= last);
            last = now;
        }
        assert!(last > baseline.percentage);

        let keys = store.medium().keys().unwrap();
        for key in keys {
            store.medium_mut().remove(&key).unwrap();
        }
        assert_eq!(store.check_quota().unwrap().percentage, baseline.percentage);
    }

    #[test]
    fn near_limit_threshold() {
        let mut store = LocalStore::with_config(
            MemoryMedium::new(),
            crate::LocalConfig {
                quota_kb: 1,
                ..Default::default()
            },
            std::sync::Arc::new(fomz_shared::SystemClock),
        );
        store.medium_mut().set("k", &"v".repeat(700)).unwrap();
        assert!(!store.check_quota().unwrap().is_near_limit);
        store.medium_mut().set("k", &"v".repeat(900)).unwrap();
        assert!(store.check_quota().unwrap().is_near_limit);
    }
}

//! The [`LocalStore`] handle and its JSON helpers.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fomz_shared::constants::{ANALYTICS_CACHE_TTL_SECS, LOCAL_QUOTA_KB, NEAR_LIMIT_PERCENT};
use fomz_shared::{Clock, FomzError, Result, SystemClock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::medium::KvMedium;

/// Tunables for the local store.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Nominal capacity used for the quota estimate.
    pub quota_kb: u64,
    /// Usage percentage treated as "near limit".
    pub near_limit_percent: f64,
    /// Maximum age of a cached analytics result.
    pub analytics_ttl: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            quota_kb: LOCAL_QUOTA_KB,
            near_limit_percent: NEAR_LIMIT_PERCENT,
            analytics_ttl: Duration::seconds(ANALYTICS_CACHE_TTL_SECS),
        }
    }
}

/// Synchronous local storage for forms, responses, drafts and analytics.
pub struct LocalStore {
    medium: Box<dyn KvMedium>,
    clock: Arc<dyn Clock>,
    config: LocalConfig,
}

impl LocalStore {
    pub fn new(medium: impl KvMedium + 'static) -> Self {
        Self::with_config(medium, LocalConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(
        medium: impl KvMedium + 'static,
        config: LocalConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            medium: Box::new(medium),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    pub fn medium(&self) -> &dyn KvMedium {
        self.medium.as_ref()
    }

    pub fn medium_mut(&mut self) -> &mut dyn KvMedium {
        self.medium.as_mut()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read and decode the JSON document stored under `key`.
    pub(crate) fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.medium.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Like [`read_json`](Self::read_json) but treats a corrupt document as
    /// absent. Used for list reads, which must never fail on bad data.
    pub(crate) fn read_json_lenient<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_json(key) {
            Err(FomzError::Serialization(e)) => {
                tracing::warn!(key, error = %e, "discarding corrupt local record");
                Ok(None)
            }
            other => other,
        }
    }

    pub(crate) fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.medium.set(key, &raw)
    }

    pub(crate) fn remove_key(&mut self, key: &str) -> Result<()> {
        self.medium.remove(key)
    }
}

//! # fomz-store
//!
//! Local, single-device storage for published forms, their responses, the
//! builder's draft slot and the per-form analytics cache.
//!
//! Everything lives in a synchronous string key-value [`KvMedium`] with a
//! small practical capacity. Lists are stored as whole JSON documents under
//! one key and scanned in-process. Two media are provided: an in-memory map
//! ([`MemoryMedium`]) and a SQLite file ([`SqliteMedium`]).
//!
//! Read misses come back as `Ok(None)` / `Ok(false)`; only writes fail.

pub mod analytics;
pub mod backup;
pub mod database;
pub mod drafts;
pub mod forms;
pub mod keys;
pub mod local;
pub mod medium;
pub mod migrations;
pub mod quota;
pub mod responses;

pub use analytics::{AnalyticsCacheEntry, AnalyticsResult, QuestionAnalytics, QuestionSummary, TimelinePoint};
pub use backup::{FormExport, FullBackup};
pub use database::SqliteMedium;
pub use local::{LocalConfig, LocalStore};
pub use medium::{KvMedium, MemoryMedium};
pub use quota::QuotaStatus;

/// Practical capacity of the browser-local medium, in KiB.
pub const LOCAL_QUOTA_KB: u64 = 5 * 1024;

/// Usage percentage at which the local medium is considered near its limit.
pub const NEAR_LIMIT_PERCENT: f64 = 80.0;

/// Maximum age of a cached analytics result, in seconds.
pub const ANALYTICS_CACHE_TTL_SECS: i64 = 5 * 60;

/// Quiet period before a dirty builder session is autosaved, in milliseconds.
pub const AUTOSAVE_DELAY_MS: u64 = 1_500;

/// Version tag written into full-backup exports.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// `metadata.migratedFrom` value stamped on responses copied to the cloud.
pub const MIGRATED_FROM_LOCAL: &str = "localStorage";

/// Prefix of every locally generated form id.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Default theme key for new forms.
pub const DEFAULT_THEME: &str = "default";

//! # fomz-client
//!
//! Client-side coordination between the local store and the cloud store:
//! debounced draft autosave, one-shot migration of local forms on sign-in,
//! and the [`AppContext`] that owns both stores for a session.

pub mod autosave;
pub mod config;
pub mod events;
pub mod migration;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard};

use fomz_store::LocalStore;
use tracing_subscriber::{fmt, EnvFilter};

pub use autosave::{AutosaveController, Debouncer, SaveOutcome, SaveState, Session};
pub use config::ClientConfig;
pub use events::{AuthEvent, MigrationOffer, MigrationProgress};
pub use migration::{migrate_all, FormMigration, MigrationError, MigrationResult};
pub use state::AppContext;

/// The local store shared between the UI handlers and background saves.
pub type SharedLocal = Arc<Mutex<LocalStore>>;

/// Lock the local store, recovering from poisoning. Local writes replace
/// whole documents.
pub fn lock_local(local: &SharedLocal) -> MutexGuard<'_, LocalStore> {
    local.lock().unwrap_or_else(|e| e.into_inner())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("fomz_client=debug,fomz_store=info,fomz_cloud=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

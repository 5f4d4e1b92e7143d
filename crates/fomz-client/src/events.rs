//! Identity-provider transitions and the notices the client raises for them.

use fomz_shared::UserId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(UserId),
    SignedOut,
}

/// Raised on sign-in when local data could be moved to the cloud.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOffer {
    pub local_forms: usize,
    pub local_responses: usize,
}

/// Emitted before each form is migrated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    pub current: usize,
    pub total: usize,
    pub form_title: String,
}

//! Key layout inside the local medium.

/// Every locally published form, as one JSON array.
pub const PUBLISHED_FORMS: &str = "fomz_published_forms";

/// The single local draft slot.
pub const LOCAL_DRAFT: &str = "fomz_draft";

/// Id of the draft the builder was last editing (local or cloud).
pub const DRAFT_POINTER: &str = "fomz_current_draft_id";

/// Response array for one share token.
pub fn responses(share_id: &str) -> String {
    format!("fomz_responses_{share_id}")
}

/// Analytics cache entry for one share token.
pub fn analytics(share_id: &str) -> String {
    format!("fomz_analytics_{share_id}")
}

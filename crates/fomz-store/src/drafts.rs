//! The single local draft slot and the per-browser draft pointer.

use fomz_shared::{local_draft_id, Draft, FormContent, Result};

use crate::keys;
use crate::local::LocalStore;

impl LocalStore {
    /// Overwrite the local draft slot with `content`, keeping the slot's id
    /// stable across saves. Empty content is never written; `Ok(None)` is
    /// returned instead.
    pub fn save_local_draft(&mut self, content: &FormContent) -> Result<Option<Draft>> {
        if content.is_empty() {
            tracing::debug!("not saving empty local draft");
            return Ok(None);
        }

        let now = self.now();
        let id = match self.load_local_draft()? {
            Some(existing) => existing.id,
            None => local_draft_id(now),
        };
        let draft = Draft {
            id,
            created_by: None,
            content: content.clone(),
            updated_at: now,
        };
        self.write_json(keys::LOCAL_DRAFT, &draft)?;

        tracing::debug!(draft_id = %draft.id, "local draft saved");
        Ok(Some(draft))
    }

    pub fn load_local_draft(&self) -> Result<Option<Draft>> {
        self.read_json_lenient(keys::LOCAL_DRAFT)
    }

    pub fn has_local_draft(&self) -> Result<bool> {
        Ok(self.load_local_draft()?.is_some())
    }

    /// Remove the local draft. Returns whether one existed.
    pub fn clear_local_draft(&mut self) -> Result<bool> {
        let existed = self.medium().get(keys::LOCAL_DRAFT)?.is_some();
        self.remove_key(keys::LOCAL_DRAFT)?;
        Ok(existed)
    }

    /// Id of the draft the builder should resume on reopen.
    pub fn draft_pointer(&self) -> Result<Option<String>> {
        Ok(self
            .medium()
            .get(keys::DRAFT_POINTER)?
            .filter(|id| !id.is_empty()))
    }

    pub fn set_draft_pointer(&mut self, draft_id: &str) -> Result<()> {
        self.medium_mut().set(keys::DRAFT_POINTER, draft_id)
    }

    pub fn clear_draft_pointer(&mut self) -> Result<()> {
        self.remove_key(keys::DRAFT_POINTER)
    }
}

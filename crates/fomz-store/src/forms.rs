//! Locally published forms.

use fomz_shared::{
    local_form_id, share_token, FomzError, Form, FormContent, FormPatch, MigrationMarker, Result,
};

use crate::keys;
use crate::local::LocalStore;

impl LocalStore {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Publish `content` as a local-only form.
    ///
    /// Fails with [`FomzError::QuotaExceeded`] when the medium is full.
    pub fn publish_locally(&mut self, mut content: FormContent) -> Result<Form> {
        let now = self.now();
        content.settings.published = true;

        let form = Form {
            id: local_form_id(now),
            share_id: Some(share_token(now)),
            created_by: None,
            content,
            is_local: true,
            created_at: now,
            updated_at: now,
            published_at: Some(now),
            response_count: 0,
            last_response_at: None,
            migration: None,
        };

        let mut forms = self.list_published()?;
        forms.push(form.clone());
        self.write_json(keys::PUBLISHED_FORMS, &forms)
            .map_err(|e| match e {
                FomzError::QuotaExceeded(detail) => FomzError::QuotaExceeded(format!(
                    "could not publish form locally ({detail}); sign in to store forms in the cloud"
                )),
                other => other,
            })?;

        tracing::info!(form_id = %form.id, share_id = ?form.share_id, "form published locally");
        Ok(form)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All locally published forms; empty when none are stored or the list
    /// is unreadable.
    pub fn list_published(&self) -> Result<Vec<Form>> {
        Ok(self
            .read_json_lenient::<Vec<Form>>(keys::PUBLISHED_FORMS)?
            .unwrap_or_default())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Form>> {
        Ok(self.list_published()?.into_iter().find(|f| f.id == id))
    }

    pub fn get_by_share_id(&self, share_id: &str) -> Result<Option<Form>> {
        Ok(self
            .list_published()?
            .into_iter()
            .find(|f| f.share_id.as_deref() == Some(share_id)))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Merge `patch` into the stored form and bump `updatedAt`.
    pub fn update(&mut self, id: &str, patch: FormPatch) -> Result<Option<Form>> {
        self.modify_form(|f| f.id == id, |form| patch.apply(&mut form.content))
    }

    /// Record that the form now has a cloud counterpart.
    pub fn mark_migrated(&mut self, id: &str, marker: MigrationMarker) -> Result<Option<Form>> {
        self.modify_form(|f| f.id == id, move |form| form.migration = Some(marker))
    }

    /// Apply `change` to the first form matching `select`, bump `updatedAt`
    /// and persist the list.
    pub(crate) fn modify_form(
        &mut self,
        select: impl Fn(&Form) -> bool,
        change: impl FnOnce(&mut Form),
    ) -> Result<Option<Form>> {
        let now = self.now();
        let mut forms = self.list_published()?;
        let Some(form) = forms.iter_mut().find(|f| select(f)) else {
            return Ok(None);
        };
        change(form);
        form.updated_at = now;
        let updated = form.clone();

        self.write_json(keys::PUBLISHED_FORMS, &forms)?;
        Ok(Some(updated))
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a form together with its responses and analytics cache entry.
    /// Returns `false` if no such form exists.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let mut forms = self.list_published()?;
        let Some(index) = forms.iter().position(|f| f.id == id) else {
            return Ok(false);
        };
        let removed = forms.remove(index);
        self.write_json(keys::PUBLISHED_FORMS, &forms)?;

        if let Some(share_id) = removed.share_id.as_deref() {
            self.remove_key(&keys::responses(share_id))?;
            self.remove_key(&keys::analytics(share_id))?;
        }

        tracing::info!(form_id = %id, "local form deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use fomz_shared::{is_local_id, Question, QuestionKind};

    use super::*;
    use crate::medium::{KvMedium, MemoryMedium};

    fn store() -> LocalStore {
        LocalStore::new(MemoryMedium::new())
    }

    #[test]
    fn publish_assigns_local_identity() {
        let mut store = store();
        let form = store.publish_locally(FormContent::titled("Survey")).unwrap();

        assert!(is_local_id(&form.id));
        assert!(form.is_local);
        assert!(form.is_published());
        assert_eq!(form.response_count, 0);
        assert!(form.published_at.is_some());

        let share_id = form.share_id.clone().unwrap();
        assert_eq!(store.get_by_share_id(&share_id).unwrap(), Some(form.clone()));
        assert_eq!(store.get_by_id(&form.id).unwrap(), Some(form));
    }

    #[test]
    fn missing_records_are_none_not_errors() {
        let mut store = store();
        assert!(store.list_published().unwrap().is_empty());
        assert_eq!(store.get_by_id("nope").unwrap(), None);
        assert_eq!(store.update("nope", FormPatch::default()).unwrap(), None);
        assert!(!store.delete("nope").unwrap());
    }

    #[test]
    fn corrupt_list_reads_as_empty() {
        let mut store = store();
        store
            .medium_mut()
            .set(keys::PUBLISHED_FORMS, "{not json")
            .unwrap();
        assert!(store.list_published().unwrap().is_empty());
    }

    #[test]
    fn update_merges_and_bumps_timestamp() {
        let mut store = store();
        let form = store.publish_locally(FormContent::titled("Before")).unwrap();

        let patch = FormPatch {
            title: Some("After".into()),
            questions: Some(vec![Question::new("q1", "Age", QuestionKind::Number {
                min: None,
                max: None,
            })]),
            ..Default::default()
        };
        let updated = store.update(&form.id, patch).unwrap().unwrap();
        assert_eq!(updated.title(), "After");
        assert_eq!(updated.content.questions.len(), 1);
        assert!(updated.updated_at >= form.updated_at);
        assert_eq!(updated.share_id, form.share_id);
    }

    #[test]
    fn quota_failure_propagates_from_publish() {
        let mut store = LocalStore::new(MemoryMedium::with_capacity(64));
        let err = store
            .publish_locally(FormContent::titled("too big for the medium"))
            .unwrap_err();
        assert!(matches!(err, FomzError::QuotaExceeded(_)));
        assert!(err.to_string().contains("storage may be full"));
    }
}

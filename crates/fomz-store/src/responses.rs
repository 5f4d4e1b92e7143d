//! Responses to locally published forms, stored as one array per share token.

use chrono::{DateTime, Utc};
use fomz_shared::{local_response_id, Answers, FomzError, Form, Response, ResponseMetadata, Result};

use crate::keys;
use crate::local::LocalStore;

impl LocalStore {
    /// Append a response for `share_id`, update the parent form's counters
    /// and evict its analytics cache entry.
    pub fn save_response(
        &mut self,
        share_id: &str,
        answers: Answers,
        metadata: ResponseMetadata,
    ) -> Result<Response> {
        let Some(parent) = self.get_by_share_id(share_id)? else {
            return Err(FomzError::not_found("form", share_id));
        };

        let now = self.now();
        let response = Response {
            id: local_response_id(now),
            form_id: None,
            share_id: Some(share_id.to_string()),
            answers,
            submitted_at: now,
            submitter_id: None,
            metadata,
        };

        let mut responses = self.list_responses(share_id)?;
        responses.push(response.clone());
        self.store_responses(share_id, &parent, &responses, Some(now))?;

        tracing::debug!(share_id, response_id = %response.id, "local response saved");
        Ok(response)
    }

    /// Responses for `share_id` in submission order; empty when none are
    /// stored or the array is unreadable.
    pub fn list_responses(&self, share_id: &str) -> Result<Vec<Response>> {
        Ok(self
            .read_json_lenient::<Vec<Response>>(&keys::responses(share_id))?
            .unwrap_or_default())
    }

    pub fn get_response(&self, share_id: &str, id: &str) -> Result<Option<Response>> {
        Ok(self
            .list_responses(share_id)?
            .into_iter()
            .find(|r| r.id == id))
    }

    /// Delete one response. Returns `false` if it does not exist.
    pub fn delete_response(&mut self, share_id: &str, id: &str) -> Result<bool> {
        let mut responses = self.list_responses(share_id)?;
        let before = responses.len();
        responses.retain(|r| r.id != id);
        if responses.len() == before {
            return Ok(false);
        }

        let last = responses.iter().map(|r| r.submitted_at).max();
        match self.get_by_share_id(share_id)? {
            Some(parent) => self.store_responses(share_id, &parent, &responses, last)?,
            None => {
                self.write_json(&keys::responses(share_id), &responses)?;
                self.evict_analytics(share_id)?;
            }
        }

        tracing::debug!(share_id, response_id = %id, "local response deleted");
        Ok(true)
    }

    /// Persist the parent's counters, then the response array. When the
    /// array write fails the counters are put back, so neither record
    /// changes.
    fn store_responses(
        &mut self,
        share_id: &str,
        parent: &Form,
        responses: &[Response],
        last_response_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let count = responses.len() as u64;
        let is_parent = |f: &Form| f.share_id.as_deref() == Some(share_id);

        self.modify_form(is_parent, |form| {
            form.response_count = count;
            form.last_response_at = last_response_at;
        })?;

        if let Err(e) = self.write_json(&keys::responses(share_id), responses) {
            let (prev_count, prev_last) = (parent.response_count, parent.last_response_at);
            if let Err(restore) = self.modify_form(is_parent, |form| {
                form.response_count = prev_count;
                form.last_response_at = prev_last;
            }) {
                tracing::warn!(share_id, error = %restore, "could not restore response counters");
            }
            return Err(e);
        }

        self.evict_analytics(share_id)
    }

    /// Drop the cached analytics for `share_id`.
    pub fn evict_analytics(&mut self, share_id: &str) -> Result<()> {
        self.remove_key(&keys::analytics(share_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use fomz_shared::{Answer, FormContent};

    use super::*;
    use crate::medium::{KvMedium, MemoryMedium};

    /// Medium that rejects writes to keys with a given prefix, as a full
    /// medium would.
    struct FullFor {
        inner: MemoryMedium,
        prefix: Arc<Mutex<Option<&'static str>>>,
    }

    impl KvMedium for FullFor {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if let Some(prefix) = *self.prefix.lock().unwrap() {
                if key.starts_with(prefix) {
                    return Err(FomzError::QuotaExceeded(format!("no room for {key}")));
                }
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys()
        }
    }

    fn filling_store() -> (LocalStore, Arc<Mutex<Option<&'static str>>>) {
        let prefix = Arc::new(Mutex::new(None));
        let medium = FullFor {
            inner: MemoryMedium::new(),
            prefix: prefix.clone(),
        };
        (LocalStore::new(medium), prefix)
    }

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Answer::from(*v)))
            .collect()
    }

    #[test]
    fn save_updates_parent_counters() {
        let mut store = LocalStore::new(MemoryMedium::new());
        let form = store.publish_locally(FormContent::titled("Poll")).unwrap();
        let share_id = form.share_id.unwrap();

        let first = store
            .save_response(&share_id, answers(&[("q1", "yes")]), ResponseMetadata::with_user_agent("test"))
            .unwrap();
        store
            .save_response(&share_id, answers(&[("q1", "no")]), ResponseMetadata::default())
            .unwrap();

        let parent = store.get_by_share_id(&share_id).unwrap().unwrap();
        assert_eq!(parent.response_count, 2);
        assert!(parent.last_response_at.is_some());

        assert_eq!(store.list_responses(&share_id).unwrap().len(), 2);
        assert_eq!(
            store.get_response(&share_id, &first.id).unwrap().unwrap().metadata.user_agent,
            "test"
        );

        assert!(store.delete_response(&share_id, &first.id).unwrap());
        assert!(!store.delete_response(&share_id, &first.id).unwrap());
        let parent = store.get_by_share_id(&share_id).unwrap().unwrap();
        assert_eq!(parent.response_count, 1);
    }

    #[test]
    fn response_requires_existing_form() {
        let mut store = LocalStore::new(MemoryMedium::new());
        let err = store
            .save_response("ghost", Answers::new(), ResponseMetadata::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn deleting_form_cascades_to_responses() {
        let mut store = LocalStore::new(MemoryMedium::new());
        let form = store.publish_locally(FormContent::titled("Poll")).unwrap();
        let share_id = form.share_id.clone().unwrap();
        store
            .save_response(&share_id, answers(&[("q1", "yes")]), ResponseMetadata::default())
            .unwrap();

        assert!(store.delete(&form.id).unwrap());
        assert!(store.list_responses(&share_id).unwrap().is_empty());
    }

    #[test]
    fn full_medium_leaves_responses_and_counters_untouched() {
        let (mut store, full) = filling_store();
        let form = store.publish_locally(FormContent::titled("Poll")).unwrap();
        let share_id = form.share_id.unwrap();
        let kept = store
            .save_response(&share_id, answers(&[("q1", "yes")]), ResponseMetadata::default())
            .unwrap();

        for prefix in ["fomz_responses_", "fomz_published_forms"] {
            *full.lock().unwrap() = Some(prefix);
            let err = store
                .save_response(&share_id, answers(&[("q1", "no")]), ResponseMetadata::default())
                .unwrap_err();
            assert!(matches!(err, FomzError::QuotaExceeded(_)));

            let stored = store.list_responses(&share_id).unwrap();
            assert_eq!(stored.len(), 1);
            let parent = store.get_by_share_id(&share_id).unwrap().unwrap();
            assert_eq!(parent.response_count, 1);
            assert_eq!(parent.last_response_at, Some(kept.submitted_at));

            assert!(store.delete_response(&share_id, &kept.id).is_err());
            assert_eq!(store.list_responses(&share_id).unwrap().len(), 1);
            let parent = store.get_by_share_id(&share_id).unwrap().unwrap();
            assert_eq!(parent.response_count, 1);
        }

        *full.lock().unwrap() = None;
        store
            .save_response(&share_id, answers(&[("q1", "no")]), ResponseMetadata::default())
            .unwrap();
        assert_eq!(store.list_responses(&share_id).unwrap().len(), 2);
        assert_eq!(store.get_by_share_id(&share_id).unwrap().unwrap().response_count, 2);
    }
}

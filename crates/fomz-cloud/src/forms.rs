//! Form documents.

use fomz_shared::{share_token, FomzError, Form, FormContent, FormPatch, Result, UserId};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{responses_collection, server_timestamp, Direction, Query};
use crate::store::{decode, encode, CloudStore, FORMS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub id: String,
    pub share_id: String,
}

impl CloudStore {
    /// Create a form owned by `owner`. A share token is minted for it.
    pub async fn create_form(&self, content: FormContent, owner: &UserId) -> Result<Form> {
        self.create_form_with_share_id(content, owner, None).await
    }

    /// Create a form owned by `owner`, keeping `share_id` when given and
    /// minting a share token otherwise.
    pub async fn create_form_with_share_id(
        &self,
        content: FormContent,
        owner: &UserId,
        share_id: Option<&str>,
    ) -> Result<Form> {
        let published = content.settings.published;
        let share_id = match share_id {
            Some(existing) if !existing.is_empty() => existing.to_string(),
            _ => share_token(chrono::Utc::now()),
        };
        let mut data = encode(&content)?;
        data.insert("createdBy".into(), Value::String(owner.to_string()));
        data.insert("shareId".into(), Value::String(share_id));
        data.insert("isLocal".into(), Value::Bool(false));
        data.insert("responseCount".into(), Value::from(0));
        data.insert("createdAt".into(), server_timestamp());
        data.insert("updatedAt".into(), server_timestamp());
        if published {
            data.insert("publishedAt".into(), server_timestamp());
        }

        let caller = self.identity();
        let id = self
            .docs()
            .create(caller.as_ref(), FORMS, Value::Object(data))
            .await?;

        tracing::info!(form_id = %id, owner = %owner, "cloud form created");
        self.get_form(&id).await
    }

    /// Fetch a form. Fails with `NotFound` if it does not exist.
    pub async fn get_form(&self, id: &str) -> Result<Form> {
        let caller = self.identity();
        match self.docs().get(caller.as_ref(), FORMS, id).await? {
            Some(data) => decode(id, data),
            None => Err(FomzError::not_found("form", id)),
        }
    }

    /// Look up a published form by its share token.
    pub async fn get_form_by_share_id(&self, share_id: &str) -> Result<Option<Form>> {
        let query = Query::collection(FORMS)
            .where_eq("shareId", share_id)
            .where_eq("settings.published", true)
            .limit(1);

        let caller = self.identity();
        let found = match self.docs().query(caller.as_ref(), &query).await {
            Ok(found) => found,
            Err(FomzError::PermissionDenied(detail)) => {
                tracing::debug!(share_id, %detail, "share lookup denied");
                return Err(FomzError::PermissionDenied(
                    "this form might not be published".to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        found
            .into_iter()
            .next()
            .map(|snapshot| decode(&snapshot.id, snapshot.data))
            .transpose()
    }

    /// Forms owned by `owner`, newest first, each annotated with its
    /// response count. A failed count reads as zero.
    pub async fn list_owner_forms(&self, owner: &UserId) -> Result<Vec<Form>> {
        let query = Query::collection(FORMS)
            .where_eq("createdBy", owner.as_str())
            .order_by("createdAt", Direction::Descending);

        let caller = self.identity();
        let snapshots = self.docs().query(caller.as_ref(), &query).await?;

        let mut forms = snapshots
            .into_iter()
            .map(|s| decode::<Form>(&s.id, s.data))
            .collect::<Result<Vec<_>>>()?;

        let counts = join_all(forms.iter().map(|f| self.count_responses_or_zero(&f.id))).await;
        for (form, count) in forms.iter_mut().zip(counts) {
            form.response_count = count;
        }
        Ok(forms)
    }

    pub async fn update_form(&self, id: &str, patch: FormPatch) -> Result<()> {
        let mut data = encode(&patch)?;
        data.insert("updatedAt".into(), server_timestamp());

        let caller = self.identity();
        self.docs()
            .merge(caller.as_ref(), FORMS, id, Value::Object(data))
            .await?;
        tracing::debug!(form_id = %id, "cloud form updated");
        Ok(())
    }

    /// Delete a form; its responses go with it.
    pub async fn delete_form(&self, id: &str) -> Result<()> {
        let caller = self.identity();
        self.docs().delete(caller.as_ref(), FORMS, id).await?;
        tracing::info!(form_id = %id, "cloud form deleted");
        Ok(())
    }

    /// Set the published flag, keeping an existing share token or minting one.
    pub async fn publish(&self, id: &str, publish: bool) -> Result<PublishResult> {
        let form = self.get_form(id).await?;
        let share_id = form
            .share_id
            .unwrap_or_else(|| share_token(chrono::Utc::now()));

        let mut data = serde_json::Map::new();
        data.insert("shareId".into(), Value::String(share_id.clone()));
        data.insert("settings.published".into(), Value::Bool(publish));
        data.insert("updatedAt".into(), server_timestamp());
        if publish {
            data.insert("publishedAt".into(), server_timestamp());
        }

        let caller = self.identity();
        self.docs()
            .merge(caller.as_ref(), FORMS, id, Value::Object(data))
            .await?;

        tracing::info!(form_id = %id, publish, "cloud form publish state changed");
        Ok(PublishResult {
            id: id.to_string(),
            share_id,
        })
    }

    pub(crate) async fn count_responses_or_zero(&self, form_id: &str) -> u64 {
        let caller = self.identity();
        match self
            .docs()
            .count(caller.as_ref(), &responses_collection(form_id))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(form_id, error = %e, "response count failed, reporting 0");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fomz_shared::{Answers, ResponseMetadata};

    use super::*;
    use crate::document::{DocumentStore, Snapshot};
    use crate::memory::MemoryDocumentStore;

    /// Delegates to the in-memory store, rejecting queries or counts on
    /// demand.
    #[derive(Default)]
    struct RestrictedDocuments {
        inner: MemoryDocumentStore,
        deny_queries: bool,
        fail_counts: bool,
    }

    #[async_trait]
    impl DocumentStore for RestrictedDocuments {
        async fn create(
            &self,
            caller: Option<&UserId>,
            collection: &str,
            data: Value,
        ) -> Result<String> {
            self.inner.create(caller, collection, data).await
        }

        async fn get(
            &self,
            caller: Option<&UserId>,
            collection: &str,
            id: &str,
        ) -> Result<Option<Value>> {
            self.inner.get(caller, collection, id).await
        }

        async fn merge(
            &self,
            caller: Option<&UserId>,
            collection: &str,
            id: &str,
            data: Value,
        ) -> Result<()> {
            self.inner.merge(caller, collection, id, data).await
        }

        async fn delete(&self, caller: Option<&UserId>, collection: &str, id: &str) -> Result<()> {
            self.inner.delete(caller, collection, id).await
        }

        async fn query(&self, caller: Option<&UserId>, query: &Query) -> Result<Vec<Snapshot>> {
            if self.deny_queries {
                return Err(FomzError::PermissionDenied("missing or insufficient permissions".into()));
            }
            self.inner.query(caller, query).await
        }

        async fn count(&self, caller: Option<&UserId>, collection: &str) -> Result<u64> {
            if self.fail_counts {
                return Err(FomzError::Unavailable("aggregation timed out".into()));
            }
            self.inner.count(caller, collection).await
        }
    }

    fn signed_in(docs: Arc<MemoryDocumentStore>, user: &str) -> CloudStore {
        let store = CloudStore::new(docs);
        store.set_identity(Some(UserId::new(user)));
        store
    }

    #[tokio::test]
    async fn create_then_get() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = signed_in(docs, "alice");
        let owner = UserId::new("alice");

        let form = store
            .create_form(FormContent::titled("Signup"), &owner)
            .await
            .unwrap();
        assert!(!form.is_local);
        assert!(form.share_id.is_some());
        assert_eq!(form.created_by, Some(owner));
        assert_eq!(store.get_form(&form.id).await.unwrap(), form);

        let err = store.get_form("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn share_lookup_requires_publish() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let owner_store = signed_in(docs.clone(), "alice");
        let visitor = CloudStore::new(docs);

        let form = owner_store
            .create_form(FormContent::titled("Quiz"), &UserId::new("alice"))
            .await
            .unwrap();
        let share_id = form.share_id.clone().unwrap();
        assert_eq!(visitor.get_form_by_share_id(&share_id).await.unwrap(), None);

        let published = owner_store.publish(&form.id, true).await.unwrap();
        assert_eq!(published.share_id, share_id);
        let again = owner_store.publish(&form.id, true).await.unwrap();
        assert_eq!(again, published);

        let seen = visitor.get_form_by_share_id(&share_id).await.unwrap().unwrap();
        assert_eq!(seen.id, form.id);
        assert!(seen.is_published());
        assert!(seen.published_at.is_some());
    }

    #[tokio::test]
    async fn owner_listing_is_newest_first_with_counts() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = signed_in(docs, "alice");
        let owner = UserId::new("alice");

        let mut content = FormContent::titled("First");
        content.settings.published = true;
        let first = store.create_form(content, &owner).await.unwrap();
        let second = store
            .create_form(FormContent::titled("Second"), &owner)
            .await
            .unwrap();
        store
            .submit_response(&first.id, Answers::new(), None, ResponseMetadata::default())
            .await
            .unwrap();

        let listed = store.list_owner_forms(&owner).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert_eq!(listed[1].response_count, 1);
        assert_eq!(listed[0].response_count, 0);
    }

    #[tokio::test]
    async fn update_merges_patch() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = signed_in(docs, "alice");
        let form = store
            .create_form(FormContent::titled("Old"), &UserId::new("alice"))
            .await
            .unwrap();

        store
            .update_form(
                &form.id,
                FormPatch {
                    title: Some("New".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let updated = store.get_form(&form.id).await.unwrap();
        assert_eq!(updated.title(), "New");
        assert!(updated.updated_at > form.updated_at);

        store.delete_form(&form.id).await.unwrap();
        assert!(store.get_form(&form.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn existing_share_id_is_kept() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = signed_in(docs, "alice");
        let owner = UserId::new("alice");

        let kept = store
            .create_form_with_share_id(FormContent::titled("Moved"), &owner, Some("mvbb793scshqv3zh"))
            .await
            .unwrap();
        assert_eq!(kept.share_id.as_deref(), Some("mvbb793scshqv3zh"));

        let minted = store
            .create_form_with_share_id(FormContent::titled("Fresh"), &owner, None)
            .await
            .unwrap();
        assert!(minted.share_id.is_some_and(|s| s != "mvbb793scshqv3zh"));
    }

    #[tokio::test]
    async fn failed_counts_list_as_zero() {
        let docs = Arc::new(RestrictedDocuments {
            fail_counts: true,
            ..RestrictedDocuments::default()
        });
        let store = CloudStore::new(docs);
        let owner = UserId::new("alice");
        store.set_identity(Some(owner.clone()));

        let mut content = FormContent::titled("Counted");
        content.settings.published = true;
        let form = store.create_form(content, &owner).await.unwrap();
        store
            .submit_response(&form.id, Answers::new(), None, ResponseMetadata::default())
            .await
            .unwrap();

        let listed = store.list_owner_forms(&owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, form.id);
        assert_eq!(listed[0].response_count, 0);
    }

    #[tokio::test]
    async fn denied_share_lookup_reports_unpublished() {
        let docs = Arc::new(RestrictedDocuments {
            deny_queries: true,
            ..RestrictedDocuments::default()
        });
        let visitor = CloudStore::new(docs);

        let err = visitor.get_form_by_share_id("abc123").await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("this form might not be published"));
    }
}

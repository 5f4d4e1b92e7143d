//! Draft documents. Every mutation checks that the draft belongs to the
//! caller first.

use fomz_shared::{Draft, FomzError, FormContent, Result, UserId};
use serde_json::Value;

use crate::document::{server_timestamp, Direction, Query};
use crate::store::{decode, encode, CloudStore, DRAFTS};

impl CloudStore {
    /// Save `content` as a draft owned by `owner`.
    ///
    /// When `draft_id` names a draft that no longer exists or is not owned
    /// by `owner`, a new draft is created instead of overwriting it.
    pub async fn save_draft(
        &self,
        content: &FormContent,
        owner: &UserId,
        draft_id: Option<&str>,
    ) -> Result<Draft> {
        if let Some(id) = draft_id {
            if self.owned_draft(id, owner).await?.is_some() {
                let mut data = encode(content)?;
                data.insert("updatedAt".into(), server_timestamp());
                let caller = self.identity();
                self.docs()
                    .merge(caller.as_ref(), DRAFTS, id, Value::Object(data))
                    .await?;
                tracing::debug!(draft_id = id, "cloud draft updated");
                return self.require_draft(id).await;
            }
            tracing::warn!(
                draft_id = id,
                owner = %owner,
                "draft missing or owned by someone else, creating a new one"
            );
        }

        let mut data = encode(content)?;
        data.insert("createdBy".into(), Value::String(owner.to_string()));
        data.insert("createdAt".into(), server_timestamp());
        data.insert("updatedAt".into(), server_timestamp());

        let caller = self.identity();
        let id = self
            .docs()
            .create(caller.as_ref(), DRAFTS, Value::Object(data))
            .await?;
        tracing::debug!(draft_id = %id, "cloud draft created");
        self.require_draft(&id).await
    }

    /// Fetch a draft. `Ok(None)` when it does not exist.
    pub async fn get_draft(&self, id: &str) -> Result<Option<Draft>> {
        let caller = self.identity();
        self.docs()
            .get(caller.as_ref(), DRAFTS, id)
            .await?
            .map(|data| decode(id, data))
            .transpose()
    }

    /// Drafts owned by `owner`, most recently updated first.
    pub async fn list_drafts(&self, owner: &UserId) -> Result<Vec<Draft>> {
        let query = Query::collection(DRAFTS)
            .where_eq("createdBy", owner.as_str())
            .order_by("updatedAt", Direction::Descending);
        let caller = self.identity();
        self.docs()
            .query(caller.as_ref(), &query)
            .await?
            .into_iter()
            .map(|s| decode(&s.id, s.data))
            .collect()
    }

    /// Best-effort draft removal. A missing draft, a draft owned by someone
    /// else and an access-control rejection all count as success.
    pub async fn delete_draft(&self, id: &str, owner: Option<&UserId>) -> Result<()> {
        let caller = self.identity();
        let existing = match self.docs().get(caller.as_ref(), DRAFTS, id).await {
            Ok(Some(data)) => decode::<Draft>(id, data)?,
            Ok(None) => return Ok(()),
            Err(FomzError::PermissionDenied(_)) => {
                tracing::debug!(draft_id = id, "draft not readable, nothing to delete");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Some(owner) = owner {
            if existing.created_by.as_ref() != Some(owner) {
                tracing::debug!(draft_id = id, "draft owned by someone else, leaving it");
                return Ok(());
            }
        }

        match self.docs().delete(caller.as_ref(), DRAFTS, id).await {
            Ok(()) => {
                tracing::debug!(draft_id = id, "cloud draft deleted");
                Ok(())
            }
            Err(FomzError::PermissionDenied(_)) | Err(FomzError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn owned_draft(&self, id: &str, owner: &UserId) -> Result<Option<Draft>> {
        match self.get_draft(id).await {
            Ok(Some(draft)) if draft.created_by.as_ref() == Some(owner) => Ok(Some(draft)),
            Ok(_) | Err(FomzError::PermissionDenied(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn require_draft(&self, id: &str) -> Result<Draft> {
        self.get_draft(id)
            .await?
            .ok_or_else(|| FomzError::not_found("draft", id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::MemoryDocumentStore;

    fn store_for(docs: &Arc<MemoryDocumentStore>, user: &str) -> CloudStore {
        let store = CloudStore::new(docs.clone());
        store.set_identity(Some(UserId::new(user)));
        store
    }

    #[tokio::test]
    async fn save_updates_own_draft_in_place() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let store = store_for(&docs, "alice");
        let alice = UserId::new("alice");

        let first = store
            .save_draft(&FormContent::titled("v1"), &alice, None)
            .await
            .unwrap();
        let second = store
            .save_draft(&FormContent::titled("v2"), &alice, Some(&first.id))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.content.title, "v2");
        assert_eq!(store.list_drafts(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_or_missing_draft_forks() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let alice_store = store_for(&docs, "alice");
        let bob_store = store_for(&docs, "bob");

        let alices = alice_store
            .save_draft(&FormContent::titled("mine"), &UserId::new("alice"), None)
            .await
            .unwrap();
        let bobs = bob_store
            .save_draft(&FormContent::titled("theirs"), &UserId::new("bob"), Some(&alices.id))
            .await
            .unwrap();
        assert_ne!(bobs.id, alices.id);
        assert_eq!(
            alice_store.get_draft(&alices.id).await.unwrap().unwrap().content.title,
            "mine"
        );

        let fresh = alice_store
            .save_draft(&FormContent::titled("again"), &UserId::new("alice"), Some("gone"))
            .await
            .unwrap();
        assert_ne!(fresh.id, "gone");
    }

    #[tokio::test]
    async fn delete_is_best_effort() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let alice_store = store_for(&docs, "alice");
        let bob_store = store_for(&docs, "bob");
        let alice = UserId::new("alice");

        let draft = alice_store
            .save_draft(&FormContent::titled("keep"), &alice, None)
            .await
            .unwrap();

        bob_store.delete_draft("missing", None).await.unwrap();
        bob_store.delete_draft(&draft.id, Some(&UserId::new("bob"))).await.unwrap();
        assert!(alice_store.get_draft(&draft.id).await.unwrap().is_some());

        alice_store
            .delete_draft(&draft.id, Some(&UserId::new("carol")))
            .await
            .unwrap();
        assert!(alice_store.get_draft(&draft.id).await.unwrap().is_some());

        alice_store.delete_draft(&draft.id, Some(&alice)).await.unwrap();
        assert!(alice_store.get_draft(&draft.id).await.unwrap().is_none());
    }
}

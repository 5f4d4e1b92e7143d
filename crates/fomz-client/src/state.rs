//! The application context shared by every UI handler.
//!
//! [`AppContext`] owns the local store, the cloud store and the autosave
//! controller for one client session, and routes identity-provider events
//! to them.

use std::sync::{Arc, Mutex};

use fomz_cloud::{CloudStore, DocumentStore};
use fomz_shared::{FomzError, Result, SystemClock, UserId};
use fomz_store::{KvMedium, LocalStore, SqliteMedium};

use crate::autosave::AutosaveController;
use crate::config::ClientConfig;
use crate::events::{AuthEvent, MigrationOffer, MigrationProgress};
use crate::migration::{migrate_all, MigrationResult};
use crate::{lock_local, SharedLocal};

/// Central client state.
pub struct AppContext {
    /// Settings the context was created with.
    config: ClientConfig,

    /// Device-local storage, shared with background autosaves.
    local: SharedLocal,

    /// Cloud storage. Its identity tracks the signed-in user.
    cloud: Arc<CloudStore>,

    /// Builder session autosave.
    autosave: AutosaveController,
}

impl AppContext {
    pub fn create(
        config: ClientConfig,
        medium: impl KvMedium + 'static,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let local = LocalStore::with_config(medium, config.local.clone(), Arc::new(SystemClock));
        let local: SharedLocal = Arc::new(Mutex::new(local));
        let cloud = Arc::new(CloudStore::new(documents));
        let autosave = AutosaveController::new(local.clone(), cloud.clone(), config.autosave_delay);

        Self {
            config,
            local,
            cloud,
            autosave,
        }
    }

    /// Create a context over the on-disk local store in `config.data_dir`.
    pub fn open(config: ClientConfig, documents: Arc<dyn DocumentStore>) -> Result<Self> {
        let medium =
            SqliteMedium::open_in_dir(&config.data_dir, Some(config.local_capacity_bytes()))?;
        Ok(Self::create(config, medium, documents))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn local(&self) -> &SharedLocal {
        &self.local
    }

    pub fn cloud(&self) -> &Arc<CloudStore> {
        &self.cloud
    }

    pub fn autosave(&self) -> &AutosaveController {
        &self.autosave
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.cloud.identity()
    }

    /// React to an identity transition.
    ///
    /// On sign-in the local draft moves to the cloud and, when locally
    /// published forms exist, an offer to migrate them is returned. On
    /// sign-out pending edits are flushed while the user can still write
    /// them.
    pub async fn handle_auth(&self, event: AuthEvent) -> Result<Option<MigrationOffer>> {
        match event {
            AuthEvent::SignedIn(user) => {
                tracing::info!(user = %user, "signed in");
                self.cloud.set_identity(Some(user.clone()));
                if let Err(e) = self.autosave.sign_in(user).await {
                    tracing::warn!(error = %e, "could not move local draft to the cloud");
                }
                self.migration_offer()
            }
            AuthEvent::SignedOut => {
                if let Err(e) = self.autosave.flush().await {
                    tracing::warn!(error = %e, "pending edits lost on sign-out");
                }
                self.autosave.sign_out().await;
                self.cloud.set_identity(None);
                tracing::info!("signed out");
                Ok(None)
            }
        }
    }

    /// Describe the local forms a migration would move, if any.
    pub fn migration_offer(&self) -> Result<Option<MigrationOffer>> {
        let forms = lock_local(&self.local).list_published()?;
        if forms.is_empty() {
            return Ok(None);
        }

        let local_responses = forms.iter().map(|f| f.response_count as usize).sum();
        Ok(Some(MigrationOffer {
            local_forms: forms.len(),
            local_responses,
        }))
    }

    /// Accept the migration offer for the signed-in user.
    pub async fn migrate_local_forms(
        &self,
        on_progress: impl FnMut(MigrationProgress),
    ) -> Result<MigrationResult> {
        let owner = self.cloud.identity().ok_or_else(|| {
            FomzError::PermissionDenied("sign in before migrating local forms".to_string())
        })?;
        Ok(migrate_all(&self.local, &self.cloud, &owner, on_progress).await)
    }

    /// Write out pending edits and stop the autosave timer.
    pub async fn teardown(&self) {
        if let Err(e) = self.autosave.flush().await {
            tracing::warn!(error = %e, "final autosave failed");
        }
        self.autosave.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use fomz_cloud::MemoryDocumentStore;
    use fomz_shared::{Answer, Answers, FormContent, Question, QuestionKind, ResponseMetadata};
    use fomz_store::MemoryMedium;

    use super::*;

    fn context() -> (AppContext, Arc<MemoryDocumentStore>) {
        let docs = Arc::new(MemoryDocumentStore::new());
        let ctx = AppContext::create(ClientConfig::default(), MemoryMedium::new(), docs.clone());
        (ctx, docs)
    }

    fn content(title: &str) -> FormContent {
        let mut content = FormContent::titled(title);
        content
            .questions
            .push(Question::new("q1", "Name", QuestionKind::ShortText));
        content
    }

    #[tokio::test]
    async fn sign_in_offers_migration_of_local_forms() {
        let (ctx, _) = context();
        {
            let mut local = lock_local(ctx.local());
            let form = local.publish_locally(content("Local")).unwrap();
            let answers = Answers::from([("q1".to_string(), Answer::from("Ada"))]);
            local
                .save_response(
                    form.share_id.as_deref().unwrap(),
                    answers,
                    ResponseMetadata::with_user_agent("test"),
                )
                .unwrap();
        }

        let offer = ctx
            .handle_auth(AuthEvent::SignedIn(UserId::new("alice")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(offer, MigrationOffer { local_forms: 1, local_responses: 1 });

        let result = ctx.migrate_local_forms(|_| {}).await.unwrap();
        assert!(result.success);
        assert_eq!(result.migrated_responses, 1);
        assert_eq!(ctx.migration_offer().unwrap(), None);
    }

    #[tokio::test]
    async fn sign_in_without_local_data_offers_nothing() {
        let (ctx, docs) = context();
        let offer = ctx
            .handle_auth(AuthEvent::SignedIn(UserId::new("alice")))
            .await
            .unwrap();
        assert_eq!(offer, None);
        assert_eq!(docs.calls(), 0);
        assert_eq!(ctx.current_user(), Some(UserId::new("alice")));
    }

    #[tokio::test]
    async fn sign_out_flushes_pending_edits() {
        let (ctx, docs) = context();
        let alice = UserId::new("alice");
        ctx.handle_auth(AuthEvent::SignedIn(alice.clone())).await.unwrap();

        ctx.autosave().edit(content("unsaved")).await;
        ctx.handle_auth(AuthEvent::SignedOut).await.unwrap();
        assert_eq!(ctx.current_user(), None);

        let observer = CloudStore::new(docs);
        observer.set_identity(Some(alice.clone()));
        let drafts = observer.list_drafts(&alice).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].content.title, "unsaved");
    }

    #[tokio::test]
    async fn migration_requires_a_signed_in_user() {
        let (ctx, _) = context();
        let err = ctx.migrate_local_forms(|_| {}).await.unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn teardown_writes_local_draft() {
        let (ctx, _) = context();
        ctx.autosave().edit(content("half done")).await;
        ctx.teardown().await;

        assert_eq!(ctx.autosave().session().await.state, crate::SaveState::Clean);
        let draft = lock_local(ctx.local()).load_local_draft().unwrap().unwrap();
        assert_eq!(draft.content.title, "half done");
    }

    #[tokio::test]
    async fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            data_dir: dir.path().to_path_buf(),
            ..ClientConfig::default()
        };

        let id = {
            let ctx = AppContext::open(config.clone(), Arc::new(MemoryDocumentStore::new())).unwrap();
            let form = lock_local(ctx.local()).publish_locally(content("Durable")).unwrap();
            form.id
        };

        let ctx = AppContext::open(config, Arc::new(MemoryDocumentStore::new())).unwrap();
        let form = lock_local(ctx.local()).get_by_id(&id).unwrap().unwrap();
        assert_eq!(form.title(), "Durable");
    }
}

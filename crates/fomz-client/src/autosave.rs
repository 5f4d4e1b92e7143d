//! Debounced draft autosave for a builder session.
//!
//! Edits mark the session dirty and (re)arm a single trailing timer. When
//! the timer fires the current content is written once:
//!
//! - no form id yet, anonymous: the local draft slot;
//! - no form id yet, signed in: a cloud draft;
//! - cloud form id: an update of that form.
//!
//! Empty content is never written. Saves are serialized, so at most one
//! write per session is in flight; a write that has started always runs to
//! completion.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use fomz_cloud::{CloudStore, PublishResult};
use fomz_shared::{is_local_id, Draft, FomzError, Form, FormContent, FormPatch, Result, UserId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{lock_local, SharedLocal};

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Single-slot trailing timer. Scheduling supersedes whatever was armed
/// before; only the most recent task ever runs.
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` once the quiet period elapses without another call.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let armed = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == armed {
                task.await;
            }
        }));
    }

    /// Disarm the timer. A task that already fired keeps running.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether the latest scheduled task has yet to finish.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Clean,
    Dirty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing changed since the last save.
    Unchanged,
    /// Content was empty and not written.
    SkippedEmpty,
    /// The session edits a form that this path does not autosave.
    SkippedForm,
    LocalDraft(String),
    CloudDraft(String),
    FormUpdated(String),
}

/// In-memory state of one builder session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub content: FormContent,
    pub form_id: Option<String>,
    pub draft_id: Option<String>,
    pub user: Option<UserId>,
    pub state: SaveState,
    revision: u64,
}

struct Inner {
    local: SharedLocal,
    cloud: Arc<CloudStore>,
    session: Mutex<Session>,
    save_lock: Mutex<()>,
}

impl Inner {
    async fn save(&self) -> Result<SaveOutcome> {
        let _serial = self.save_lock.lock().await;

        let snapshot = {
            let session = self.session.lock().await;
            if session.state == SaveState::Clean {
                return Ok(SaveOutcome::Unchanged);
            }
            session.clone()
        };

        let result = self.persist(&snapshot).await;

        let mut session = self.session.lock().await;
        match &result {
            Ok(outcome) => {
                if let SaveOutcome::LocalDraft(id) | SaveOutcome::CloudDraft(id) = outcome {
                    session.draft_id = Some(id.clone());
                }
                if session.revision == snapshot.revision {
                    session.state = SaveState::Clean;
                }
                tracing::debug!(?outcome, "autosave finished");
            }
            Err(e) => tracing::warn!(error = %e, "autosave failed, session stays dirty"),
        }
        result
    }

    async fn persist(&self, snapshot: &Session) -> Result<SaveOutcome> {
        if snapshot.content.is_empty() {
            tracing::debug!("skipping autosave of empty form");
            return Ok(SaveOutcome::SkippedEmpty);
        }

        if let Some(form_id) = &snapshot.form_id {
            if is_local_id(form_id) || snapshot.user.is_none() {
                return Ok(SaveOutcome::SkippedForm);
            }
            self.cloud
                .update_form(form_id, FormPatch::from_content(&snapshot.content))
                .await?;
            return Ok(SaveOutcome::FormUpdated(form_id.clone()));
        }

        match &snapshot.user {
            None => {
                let mut local = lock_local(&self.local);
                let Some(draft) = local.save_local_draft(&snapshot.content)? else {
                    return Ok(SaveOutcome::SkippedEmpty);
                };
                local.set_draft_pointer(&draft.id)?;
                Ok(SaveOutcome::LocalDraft(draft.id))
            }
            Some(user) => {
                let draft = self
                    .cloud
                    .save_draft(&snapshot.content, user, snapshot.draft_id.as_deref())
                    .await?;
                lock_local(&self.local).set_draft_pointer(&draft.id)?;
                Ok(SaveOutcome::CloudDraft(draft.id))
            }
        }
    }

    /// Drop every draft a freshly created form supersedes. Failures are
    /// logged and otherwise ignored.
    async fn discard_drafts(&self, draft_id: Option<&str>, user: &UserId) {
        if let Some(id) = draft_id {
            if let Err(e) = self.cloud.delete_draft(id, Some(user)).await {
                tracing::warn!(draft_id = id, error = %e, "could not delete superseded draft");
            }
        }

        let mut local = lock_local(&self.local);
        if let Err(e) = local.clear_local_draft() {
            tracing::warn!(error = %e, "could not clear local draft");
        }
        if let Err(e) = local.clear_draft_pointer() {
            tracing::warn!(error = %e, "could not clear draft pointer");
        }
    }

    async fn mark_saved(&self, form_id: &str, revision: u64) {
        let mut session = self.session.lock().await;
        session.form_id = Some(form_id.to_string());
        session.draft_id = None;
        if session.revision == revision {
            session.state = SaveState::Clean;
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct AutosaveController {
    inner: Arc<Inner>,
    debouncer: StdMutex<Debouncer>,
}

impl AutosaveController {
    pub fn new(local: SharedLocal, cloud: Arc<CloudStore>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                cloud,
                session: Mutex::new(Session::default()),
                save_lock: Mutex::new(()),
            }),
            debouncer: StdMutex::new(Debouncer::new(delay)),
        }
    }

    fn debouncer(&self) -> MutexGuard<'_, Debouncer> {
        self.debouncer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the session.
    pub async fn session(&self) -> Session {
        self.inner.session.lock().await.clone()
    }

    /// Record new builder content and re-arm the autosave timer.
    pub async fn edit(&self, content: FormContent) {
        {
            let mut session = self.inner.session.lock().await;
            session.content = content;
            session.revision += 1;
            session.state = SaveState::Dirty;
        }

        let inner = Arc::clone(&self.inner);
        self.debouncer().schedule(async move {
            if let Err(e) = inner.save().await {
                tracing::debug!(error = %e, "debounced save did not complete");
            }
        });
    }

    /// Save immediately instead of waiting for the timer.
    pub async fn flush(&self) -> Result<SaveOutcome> {
        self.debouncer().cancel();
        self.inner.save().await
    }

    /// Drop a pending (not yet fired) save.
    pub fn cancel_pending(&self) {
        self.debouncer().cancel();
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer().is_pending()
    }

    /// Start editing an existing form.
    pub async fn open_form(&self, form: &Form) {
        self.cancel_pending();
        let mut session = self.inner.session.lock().await;
        session.content = form.content.clone();
        session.form_id = Some(form.id.clone());
        session.draft_id = None;
        session.revision += 1;
        session.state = SaveState::Clean;
    }

    /// Manually save the session as a cloud form. The first save of a new
    /// form creates it and deletes the drafts it supersedes.
    pub async fn save_form(&self) -> Result<Form> {
        self.cancel_pending();
        let _serial = self.inner.save_lock.lock().await;
        let snapshot = self.inner.session.lock().await.clone();

        let user = snapshot.user.clone().ok_or_else(|| {
            FomzError::PermissionDenied("sign in to save forms to the cloud".to_string())
        })?;

        let form = match snapshot.form_id.as_deref() {
            Some(id) if is_local_id(id) => {
                return Err(FomzError::InvalidInput(
                    "local forms move to the cloud through migration".to_string(),
                ));
            }
            Some(id) => {
                self.inner
                    .cloud
                    .update_form(id, FormPatch::from_content(&snapshot.content))
                    .await?;
                self.inner.cloud.get_form(id).await?
            }
            None => {
                let form = self
                    .inner
                    .cloud
                    .create_form(snapshot.content.clone(), &user)
                    .await?;
                self.inner
                    .discard_drafts(snapshot.draft_id.as_deref(), &user)
                    .await;
                form
            }
        };

        self.inner.mark_saved(&form.id, snapshot.revision).await;
        tracing::info!(form_id = %form.id, "form saved");
        Ok(form)
    }

    /// Publish the session's form: in the cloud when signed in, otherwise
    /// into the local store.
    pub async fn publish(&self) -> Result<PublishResult> {
        let user = self.inner.session.lock().await.user.clone();
        if user.is_some() {
            let form = self.save_form().await?;
            return self.inner.cloud.publish(&form.id, true).await;
        }

        self.cancel_pending();
        let _serial = self.inner.save_lock.lock().await;
        let snapshot = self.inner.session.lock().await.clone();
        if snapshot.content.is_empty() {
            return Err(FomzError::InvalidInput("cannot publish an empty form".to_string()));
        }

        let mut content = snapshot.content.clone();
        content.settings.published = true;

        let form = {
            let mut local = lock_local(&self.inner.local);
            let form = match snapshot.form_id.as_deref() {
                Some(id) if is_local_id(id) => local
                    .update(id, FormPatch::from_content(&content))?
                    .ok_or_else(|| FomzError::not_found("form", id))?,
                _ => local.publish_locally(content)?,
            };
            local.clear_local_draft()?;
            local.clear_draft_pointer()?;
            form
        };

        self.inner.mark_saved(&form.id, snapshot.revision).await;
        Ok(PublishResult {
            id: form.id,
            share_id: form.share_id.unwrap_or_default(),
        })
    }

    /// React to a sign-in. A local draft, if any, is copied to a cloud draft
    /// exactly once and the draft pointer is moved to it.
    pub async fn sign_in(&self, user: UserId) -> Result<Option<Draft>> {
        let _serial = self.inner.save_lock.lock().await;
        self.inner.session.lock().await.user = Some(user.clone());

        let local_draft = lock_local(&self.inner.local).load_local_draft()?;
        let Some(local_draft) = local_draft else {
            return Ok(None);
        };

        let draft = self
            .inner
            .cloud
            .save_draft(&local_draft.content, &user, None)
            .await?;
        {
            let mut local = lock_local(&self.inner.local);
            local.set_draft_pointer(&draft.id)?;
            local.clear_local_draft()?;
        }

        let mut session = self.inner.session.lock().await;
        if session.form_id.is_none() {
            session.draft_id = Some(draft.id.clone());
        }
        tracing::info!(local_draft = %local_draft.id, cloud_draft = %draft.id, "local draft moved to cloud");
        Ok(Some(draft))
    }

    pub async fn sign_out(&self) {
        let mut session = self.inner.session.lock().await;
        session.user = None;
        session.draft_id = None;
    }

    /// Resume the draft recorded by the draft pointer (signed in) or the
    /// local draft slot (anonymous).
    pub async fn restore(&self) -> Result<Option<Draft>> {
        let user = self.inner.session.lock().await.user.clone();
        let pointer = lock_local(&self.inner.local).draft_pointer()?;

        let draft = match (&user, pointer) {
            (Some(_), Some(id)) => match self.inner.cloud.get_draft(&id).await {
                Ok(found) => found,
                Err(FomzError::PermissionDenied(_)) => None,
                Err(e) => return Err(e),
            },
            (None, _) => lock_local(&self.inner.local).load_local_draft()?,
            (Some(_), None) => None,
        };

        let Some(draft) = draft else {
            if user.is_some() {
                lock_local(&self.inner.local).clear_draft_pointer()?;
            }
            return Ok(None);
        };

        let mut session = self.inner.session.lock().await;
        session.content = draft.content.clone();
        session.draft_id = Some(draft.id.clone());
        session.form_id = None;
        session.revision += 1;
        session.state = SaveState::Clean;
        Ok(Some(draft))
    }
}

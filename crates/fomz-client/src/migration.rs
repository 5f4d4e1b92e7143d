//! One-shot copy of every locally published form, with its responses, into
//! the cloud for a freshly signed-in owner.
//!
//! Forms are processed strictly in listed order and responses strictly in
//! stored order. A failure never escapes [`migrate_all`]; it becomes an
//! entry in the returned [`MigrationResult`].
//!
//! Each local form carries a [`MigrationMarker`] once its cloud copy exists,
//! updated after every migrated response. An interrupted run can therefore
//! be repeated without creating a second cloud form or resubmitting
//! responses.

use std::collections::BTreeMap;

use chrono::Utc;
use fomz_cloud::CloudStore;
use fomz_shared::constants::MIGRATED_FROM_LOCAL;
use fomz_shared::{FomzError, Form, MigrationMarker, ResponseMetadata, Result, UserId};
use serde::Serialize;

use crate::events::MigrationProgress;
use crate::{lock_local, SharedLocal};

/// A form that could not be moved at all.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationError {
    pub form_id: String,
    pub form_title: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseError {
    pub response_id: String,
    pub error: String,
}

/// Outcome for one form whose cloud copy exists.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FormMigration {
    pub local_id: String,
    pub cloud_id: String,
    pub title: String,
    /// Responses submitted during this run.
    pub migrated_responses: usize,
    /// Responses a previous run already moved.
    pub previously_migrated: usize,
    pub response_errors: Vec<ResponseError>,
    /// The local copy is kept whenever a response failed.
    pub local_deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    /// True when every form reached the cloud. Response-level failures are
    /// reported in `details` only.
    pub success: bool,
    pub migrated_forms: usize,
    pub migrated_responses: usize,
    pub errors: Vec<MigrationError>,
    /// Local form id to cloud form id.
    pub form_mapping: BTreeMap<String, String>,
    pub details: Vec<FormMigration>,
}

/// Move every local form into the cloud under `owner`.
///
/// `on_progress` is called before each form starts. With no local forms
/// the cloud store is never touched.
pub async fn migrate_all(
    local: &SharedLocal,
    cloud: &CloudStore,
    owner: &UserId,
    mut on_progress: impl FnMut(MigrationProgress),
) -> MigrationResult {
    let forms = match lock_local(local).list_published() {
        Ok(forms) => forms,
        Err(e) => {
            tracing::error!(error = %e, "could not enumerate local forms");
            return MigrationResult {
                success: false,
                errors: vec![MigrationError {
                    form_id: String::new(),
                    form_title: String::new(),
                    error: e.to_string(),
                }],
                ..MigrationResult::default()
            };
        }
    };

    let mut result = MigrationResult {
        success: true,
        ..MigrationResult::default()
    };
    if forms.is_empty() {
        tracing::debug!("no local forms to migrate");
        return result;
    }

    let total = forms.len();
    tracing::info!(forms = total, owner = %owner, "starting local form migration");

    for (index, form) in forms.iter().enumerate() {
        on_progress(MigrationProgress {
            current: index + 1,
            total,
            form_title: form.title().to_string(),
        });

        match migrate_form(local, cloud, owner, &form.id).await {
            Ok(detail) => {
                result.migrated_forms += 1;
                result.migrated_responses += detail.migrated_responses;
                result
                    .form_mapping
                    .insert(detail.local_id.clone(), detail.cloud_id.clone());
                result.details.push(detail);
            }
            Err(e) => {
                tracing::warn!(form_id = %form.id, error = %e, "form migration failed");
                result.errors.push(MigrationError {
                    form_id: form.id.clone(),
                    form_title: form.title().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    result.success = result.errors.is_empty();
    tracing::info!(
        migrated_forms = result.migrated_forms,
        migrated_responses = result.migrated_responses,
        failed_forms = result.errors.len(),
        "local form migration finished"
    );
    result
}

async fn migrate_form(
    local: &SharedLocal,
    cloud: &CloudStore,
    owner: &UserId,
    local_id: &str,
) -> Result<FormMigration> {
    let export = lock_local(local)
        .export_form(local_id)?
        .ok_or_else(|| FomzError::not_found("form", local_id))?;
    let form = export.form;

    let resumable = match form.migration.clone() {
        Some(marker) => resumable_marker(cloud, owner, marker).await?,
        None => None,
    };
    let (cloud_id, mut migrated_ids) = match resumable {
        Some(marker) => {
            tracing::debug!(form_id = local_id, cloud_id = %marker.cloud_form_id, "resuming migration");
            (marker.cloud_form_id, marker.migrated_response_ids)
        }
        None => (create_cloud_copy(local, cloud, owner, &form).await?, Vec::new()),
    };

    let mut detail = FormMigration {
        local_id: form.id.clone(),
        cloud_id: cloud_id.clone(),
        title: form.title().to_string(),
        migrated_responses: 0,
        previously_migrated: 0,
        response_errors: Vec::new(),
        local_deleted: false,
    };

    for response in export.responses {
        if migrated_ids.contains(&response.id) {
            detail.previously_migrated += 1;
            continue;
        }

        let metadata = ResponseMetadata {
            migrated_from: Some(MIGRATED_FROM_LOCAL.to_string()),
            original_submitted_at: Some(response.submitted_at),
            ..response.metadata
        };

        match cloud
            .submit_response(&cloud_id, response.answers, response.submitter_id.as_ref(), metadata)
            .await
        {
            Ok(_) => {
                detail.migrated_responses += 1;
                migrated_ids.push(response.id);
                record_marker(local, &form.id, &cloud_id, &migrated_ids);
            }
            Err(e) => {
                tracing::warn!(response_id = %response.id, error = %e, "response migration failed");
                detail.response_errors.push(ResponseError {
                    response_id: response.id,
                    error: e.to_string(),
                });
            }
        }
    }

    if detail.response_errors.is_empty() {
        match lock_local(local).delete(&form.id) {
            Ok(deleted) => detail.local_deleted = deleted,
            Err(e) => tracing::warn!(form_id = %form.id, error = %e, "could not delete migrated local form"),
        }
    } else {
        tracing::warn!(
            form_id = %form.id,
            failed = detail.response_errors.len(),
            "keeping local copy, some responses were not migrated"
        );
    }

    Ok(detail)
}

/// The marker, if it names a cloud form that still exists and belongs to
/// `owner`. A marker left by another account or pointing at a deleted form
/// is stale.
async fn resumable_marker(
    cloud: &CloudStore,
    owner: &UserId,
    marker: MigrationMarker,
) -> Result<Option<MigrationMarker>> {
    let cloud_id = marker.cloud_form_id.clone();
    match cloud.get_form(&cloud_id).await {
        Ok(existing) if existing.created_by.as_ref() == Some(owner) => Ok(Some(marker)),
        Ok(_) => {
            tracing::warn!(cloud_id = %cloud_id, owner = %owner, "migration marker belongs to another account, starting over");
            Ok(None)
        }
        Err(e) if e.is_not_found() || e.is_permission_denied() => {
            tracing::debug!(cloud_id = %cloud_id, error = %e, "stale migration marker");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn create_cloud_copy(
    local: &SharedLocal,
    cloud: &CloudStore,
    owner: &UserId,
    form: &Form,
) -> Result<String> {
    let mut content = form.content.clone();
    content.settings.published = true;

    let share_id = match form.share_id.as_deref() {
        Some(share_id) => match cloud.get_form_by_share_id(share_id).await {
            Ok(None) => Some(share_id),
            Ok(Some(taken)) => {
                tracing::warn!(share_id, taken_by = %taken.id, "share token already used in the cloud, minting a new one");
                None
            }
            Err(e) => {
                tracing::warn!(share_id, error = %e, "could not check share token, minting a new one");
                None
            }
        },
        None => None,
    };

    let created = cloud
        .create_form_with_share_id(content, owner, share_id)
        .await?;
    record_marker(local, &form.id, &created.id, &[]);
    Ok(created.id)
}

/// Persist the marker. A failed write only costs idempotency, so it is
/// logged rather than failing the form.
fn record_marker(local: &SharedLocal, local_id: &str, cloud_id: &str, migrated: &[String]) {
    let marker = MigrationMarker {
        cloud_form_id: cloud_id.to_string(),
        migrated_response_ids: migrated.to_vec(),
        migrated_at: Utc::now(),
    };
    if let Err(e) = lock_local(local).mark_migrated(local_id, marker) {
        tracing::warn!(form_id = local_id, error = %e, "could not record migration marker");
    }
}

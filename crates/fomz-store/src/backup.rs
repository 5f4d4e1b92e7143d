//! JSON export of local forms for user-initiated backup downloads.
//!
//! Export only; backups are not imported back.

use chrono::{DateTime, Utc};
use fomz_shared::constants::BACKUP_FORMAT_VERSION;
use fomz_shared::{Form, Response, Result};
use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsResult;
use crate::local::LocalStore;

/// One form with its full response history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormExport {
    pub form: Form,
    pub responses: Vec<Response>,
    pub analytics: AnalyticsResult,
    pub exported_at: DateTime<Utc>,
}

/// Every local form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FullBackup {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub forms: Vec<FormExport>,
}

impl LocalStore {
    /// Snapshot a single form. `Ok(None)` if it does not exist.
    pub fn export_form(&mut self, id: &str) -> Result<Option<FormExport>> {
        let Some(form) = self.get_by_id(id)? else {
            return Ok(None);
        };

        let (responses, analytics) = match form.share_id.as_deref() {
            Some(share_id) => {
                let responses = self.list_responses(share_id)?;
                let analytics = self.compute_analytics(share_id, &form.content.questions)?;
                (responses, analytics)
            }
            None => (
                Vec::new(),
                crate::analytics::analyze(&[], &form.content.questions),
            ),
        };

        Ok(Some(FormExport {
            form,
            responses,
            analytics,
            exported_at: self.now(),
        }))
    }

    /// Snapshot every local form.
    pub fn export_all(&mut self) -> Result<FullBackup> {
        let ids: Vec<String> = self.list_published()?.into_iter().map(|f| f.id).collect();

        let mut forms = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(export) = self.export_form(&id)? {
                forms.push(export);
            }
        }

        tracing::info!(forms = forms.len(), "local backup exported");

        Ok(FullBackup {
            exported_at: self.now(),
            version: BACKUP_FORMAT_VERSION.to_string(),
            forms,
        })
    }
}

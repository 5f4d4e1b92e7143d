//! Response sub-documents.

use chrono::Utc;
use fomz_shared::{Answers, FomzError, Response, ResponseMetadata, Result, UserId};
use serde_json::Value;

use crate::document::{responses_collection, server_timestamp, Direction, Query};
use crate::store::{decode, CloudStore, FORMS};

impl CloudStore {
    /// Append a response to the form named by `form_or_share_id` (a form id
    /// or a share token).
    pub async fn submit_response(
        &self,
        form_or_share_id: &str,
        answers: Answers,
        submitter: Option<&UserId>,
        metadata: ResponseMetadata,
    ) -> Result<Response> {
        let form_id = self.resolve_form_id(form_or_share_id).await?;

        let mut data = serde_json::Map::new();
        data.insert("formId".into(), Value::String(form_id.clone()));
        data.insert("answers".into(), serde_json::to_value(&answers)?);
        data.insert("submittedAt".into(), server_timestamp());
        if let Some(submitter) = submitter {
            data.insert("submitterId".into(), Value::String(submitter.to_string()));
        }
        data.insert("metadata".into(), serde_json::to_value(&metadata)?);

        let caller = self.identity();
        let id = self
            .docs()
            .create(caller.as_ref(), &responses_collection(&form_id), Value::Object(data))
            .await?;

        tracing::debug!(form_id = %form_id, response_id = %id, "cloud response submitted");

        // Submitters generally cannot read responses back; report local time.
        Ok(Response {
            id,
            form_id: Some(form_id),
            share_id: None,
            answers,
            submitted_at: Utc::now(),
            submitter_id: submitter.cloned(),
            metadata,
        })
    }

    /// Responses for a form in submission order. Owner only.
    pub async fn list_responses(&self, form_id: &str) -> Result<Vec<Response>> {
        let query = Query::collection(responses_collection(form_id))
            .order_by("submittedAt", Direction::Ascending);
        let caller = self.identity();
        self.docs()
            .query(caller.as_ref(), &query)
            .await?
            .into_iter()
            .map(|s| decode(&s.id, s.data))
            .collect()
    }

    /// Server-side response count. Callers that only display the number
    /// should treat a failure as zero.
    pub async fn count_responses(&self, form_id: &str) -> Result<u64> {
        let caller = self.identity();
        self.docs()
            .count(caller.as_ref(), &responses_collection(form_id))
            .await
    }

    async fn resolve_form_id(&self, form_or_share_id: &str) -> Result<String> {
        let caller = self.identity();
        match self.docs().get(caller.as_ref(), FORMS, form_or_share_id).await {
            Ok(Some(_)) => return Ok(form_or_share_id.to_string()),
            Ok(None) | Err(FomzError::PermissionDenied(_)) => {}
            Err(e) => return Err(e),
        }
        match self.get_form_by_share_id(form_or_share_id).await? {
            Some(form) => Ok(form.id),
            None => Err(FomzError::not_found("form", form_or_share_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fomz_shared::{Answer, FormContent};

    use super::*;
    use crate::memory::MemoryDocumentStore;

    #[tokio::test]
    async fn anonymous_submission_by_share_token() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let owner_store = CloudStore::new(docs.clone());
        owner_store.set_identity(Some(UserId::new("alice")));
        let visitor = CloudStore::new(docs);

        let mut content = FormContent::titled("Feedback");
        content.settings.published = true;
        let form = owner_store
            .create_form(content, &UserId::new("alice"))
            .await
            .unwrap();

        let mut answers = Answers::new();
        answers.insert("q".into(), Answer::from("great"));
        let submitted = visitor
            .submit_response(
                form.share_id.as_deref().unwrap(),
                answers.clone(),
                None,
                ResponseMetadata::with_user_agent("curl"),
            )
            .await
            .unwrap();
        assert_eq!(submitted.form_id.as_deref(), Some(form.id.as_str()));

        let stored = owner_store.list_responses(&form.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].answers, answers);
        assert_eq!(stored[0].metadata.user_agent, "curl");
        assert_eq!(owner_store.count_responses(&form.id).await.unwrap(), 1);

        assert!(visitor.count_responses(&form.id).await.is_err());
        assert!(visitor
            .submit_response("nope", Answers::new(), None, ResponseMetadata::default())
            .await
            .unwrap_err()
            .is_not_found());
    }
}

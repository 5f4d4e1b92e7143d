//! The hosted document store seam.

use async_trait::async_trait;
use fomz_shared::{Result, UserId};
use serde_json::Value;

/// Placeholder replaced with the server's clock when a document is written.
pub const SERVER_TIMESTAMP_SENTINEL: &str = "__fomz_server_timestamp__";

/// Field value asking the store to stamp its own time.
pub fn server_timestamp() -> Value {
    Value::String(SERVER_TIMESTAMP_SENTINEL.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality-filtered, optionally ordered and limited collection query.
/// Field paths may be dotted (`settings.published`).
#[derive(Debug, Clone)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A document returned from a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub data: Value,
}

/// Collection-scoped document CRUD with server timestamps, queries and
/// counting. Every call carries the authenticated caller (if any); access
/// rules are enforced by the store and reported as
/// [`FomzError::PermissionDenied`](fomz_shared::FomzError::PermissionDenied).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id.
    async fn create(&self, caller: Option<&UserId>, collection: &str, data: Value)
        -> Result<String>;

    async fn get(&self, caller: Option<&UserId>, collection: &str, id: &str)
        -> Result<Option<Value>>;

    /// Shallow-merge `data` into an existing document. Dotted keys address
    /// nested fields. Fails with `NotFound` if the document is absent.
    async fn merge(&self, caller: Option<&UserId>, collection: &str, id: &str, data: Value)
        -> Result<()>;

    /// Delete a document and any sub-collections under it.
    async fn delete(&self, caller: Option<&UserId>, collection: &str, id: &str) -> Result<()>;

    async fn query(&self, caller: Option<&UserId>, query: &Query) -> Result<Vec<Snapshot>>;

    /// Server-side document count for a collection.
    async fn count(&self, caller: Option<&UserId>, collection: &str) -> Result<u64>;
}

/// Read a possibly dotted field path out of a JSON object.
pub fn field<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, part| current.get(part))
}

/// Path of the responses sub-collection for a form.
pub fn responses_collection(form_id: &str) -> String {
    format!("forms/{form_id}/responses")
}

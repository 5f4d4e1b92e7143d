//! The [`CloudStore`] handle.

use std::sync::{Arc, RwLock};

use fomz_shared::{FomzError, Result, UserId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::DocumentStore;

pub(crate) const FORMS: &str = "forms";
pub(crate) const DRAFTS: &str = "drafts";

/// Network-backed storage for forms, drafts and responses.
///
/// Calls are made on behalf of the current identity, which the client
/// updates on sign-in and sign-out.
pub struct CloudStore {
    docs: Arc<dyn DocumentStore>,
    identity: RwLock<Option<UserId>>,
}

impl CloudStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            identity: RwLock::new(None),
        }
    }

    pub fn set_identity(&self, user: Option<UserId>) {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = user;
    }

    pub fn identity(&self) -> Option<UserId> {
        self.identity
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn docs(&self) -> &dyn DocumentStore {
        self.docs.as_ref()
    }
}

/// Decode a stored document, injecting its id.
pub(crate) fn decode<T: DeserializeOwned>(id: &str, mut data: Value) -> Result<T> {
    if let Value::Object(map) = &mut data {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    Ok(serde_json::from_value(data)?)
}

/// Encode a value as a JSON object suitable for writing.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(FomzError::InvalidInput(format!(
            "expected an object document, got {other}"
        ))),
    }
}

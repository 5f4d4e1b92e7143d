//! In-process [`DocumentStore`] that enforces the hosted access rules:
//!
//! - `forms`: readable by the owner, or by anyone once `settings.published`
//!   is true; created, updated and deleted only by the owner.
//! - `drafts`: every operation restricted to the owner.
//! - `forms/{id}/responses`: created by anyone while the parent form is
//!   published (or by its owner); read and counted by the parent's owner.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use fomz_shared::{FomzError, Result, UserId};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::document::{
    field, Direction, DocumentStore, Query, Snapshot, SERVER_TIMESTAMP_SENTINEL,
};

enum Collection<'a> {
    Forms,
    Drafts,
    Responses(&'a str),
    Other,
}

fn classify(collection: &str) -> Collection<'_> {
    match collection {
        "forms" => Collection::Forms,
        "drafts" => Collection::Drafts,
        other => match other
            .strip_prefix("forms/")
            .and_then(|rest| rest.strip_suffix("/responses"))
        {
            Some(form_id) => Collection::Responses(form_id),
            None => Collection::Other,
        },
    }
}

type Docs = Vec<(String, Value)>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Docs>>,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
    calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made against the store so far.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }

    /// Strictly increasing server time, so ordering by stamp is stable.
    async fn stamp(&self) -> Value {
        let mut last = self.last_stamp.lock().await;
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::nanoseconds(1);
            }
        }
        *last = Some(now);
        Value::String(now.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    async fn resolve_timestamps(&self, value: &mut Value) {
        let stamp = self.stamp().await;
        replace_sentinels(value, &stamp);
    }
}

fn replace_sentinels(value: &mut Value, stamp: &Value) {
    match value {
        Value::String(s) if s == SERVER_TIMESTAMP_SENTINEL => *value = stamp.clone(),
        Value::Object(map) => map.values_mut().for_each(|v| replace_sentinels(v, stamp)),
        Value::Array(items) => items.iter_mut().for_each(|v| replace_sentinels(v, stamp)),
        _ => {}
    }
}

fn owned_by(doc: &Value, caller: Option<&UserId>) -> bool {
    match (field(doc, "createdBy").and_then(Value::as_str), caller) {
        (Some(owner), Some(caller)) => owner == caller.as_str(),
        _ => false,
    }
}

fn is_published(doc: &Value) -> bool {
    field(doc, "settings.published").and_then(Value::as_bool) == Some(true)
}

fn denied(what: impl std::fmt::Display) -> FomzError {
    FomzError::PermissionDenied(format!("missing or insufficient permissions for {what}"))
}

fn find<'a>(collections: &'a HashMap<String, Docs>, collection: &str, id: &str) -> Option<&'a Value> {
    collections
        .get(collection)?
        .iter()
        .find(|(doc_id, _)| doc_id == id)
        .map(|(_, data)| data)
}

impl MemoryDocumentStore {
    fn can_read(
        collections: &HashMap<String, Docs>,
        collection: &str,
        doc: &Value,
        caller: Option<&UserId>,
    ) -> bool {
        match classify(collection) {
            Collection::Forms => owned_by(doc, caller) || is_published(doc),
            Collection::Drafts => owned_by(doc, caller),
            Collection::Responses(form_id) => {
                find(collections, "forms", form_id).is_some_and(|form| owned_by(form, caller))
            }
            Collection::Other => true,
        }
    }

    fn can_modify(
        collections: &HashMap<String, Docs>,
        collection: &str,
        doc: &Value,
        caller: Option<&UserId>,
    ) -> bool {
        match classify(collection) {
            Collection::Forms | Collection::Drafts => owned_by(doc, caller),
            Collection::Responses(form_id) => {
                find(collections, "forms", form_id).is_some_and(|form| owned_by(form, caller))
            }
            Collection::Other => true,
        }
    }

    fn can_create(
        collections: &HashMap<String, Docs>,
        collection: &str,
        data: &Value,
        caller: Option<&UserId>,
    ) -> bool {
        match classify(collection) {
            Collection::Forms | Collection::Drafts => owned_by(data, caller),
            Collection::Responses(form_id) => find(collections, "forms", form_id)
                .is_some_and(|form| is_published(form) || owned_by(form, caller)),
            Collection::Other => true,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(
        &self,
        caller: Option<&UserId>,
        collection: &str,
        mut data: Value,
    ) -> Result<String> {
        self.record_call();
        if !data.is_object() {
            return Err(FomzError::InvalidInput("document must be an object".into()));
        }
        self.resolve_timestamps(&mut data).await;

        let mut collections = self.collections.write().await;
        if !Self::can_create(&collections, collection, &data, caller) {
            return Err(denied(format!("create in {collection}")));
        }

        let id = Uuid::new_v4().simple().to_string();
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), data));
        Ok(id)
    }

    async fn get(&self, caller: Option<&UserId>, collection: &str, id: &str) -> Result<Option<Value>> {
        self.record_call();
        let collections = self.collections.read().await;
        let Some(doc) = find(&collections, collection, id) else {
            return Ok(None);
        };
        if !Self::can_read(&collections, collection, doc, caller) {
            return Err(denied(format!("{collection}/{id}")));
        }
        Ok(Some(doc.clone()))
    }

    async fn merge(
        &self,
        caller: Option<&UserId>,
        collection: &str,
        id: &str,
        mut data: Value,
    ) -> Result<()> {
        self.record_call();
        self.resolve_timestamps(&mut data).await;
        let Value::Object(patch) = data else {
            return Err(FomzError::InvalidInput("merge data must be an object".into()));
        };

        let mut collections = self.collections.write().await;
        let Some(existing) = find(&collections, collection, id) else {
            return Err(FomzError::not_found("document", format!("{collection}/{id}")));
        };
        if !Self::can_modify(&collections, collection, existing, caller) {
            return Err(denied(format!("{collection}/{id}")));
        }

        let docs = collections.entry(collection.to_string()).or_default();
        if let Some((_, doc)) = docs.iter_mut().find(|(doc_id, _)| doc_id == id) {
            for (key, value) in patch {
                set_path(doc, &key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, caller: Option<&UserId>, collection: &str, id: &str) -> Result<()> {
        self.record_call();
        let mut collections = self.collections.write().await;
        let Some(existing) = find(&collections, collection, id) else {
            return Ok(());
        };
        if !Self::can_modify(&collections, collection, existing, caller) {
            return Err(denied(format!("{collection}/{id}")));
        }

        if let Some(docs) = collections.get_mut(collection) {
            docs.retain(|(doc_id, _)| doc_id != id);
        }
        let prefix = format!("{collection}/{id}/");
        collections.retain(|name, _| !name.starts_with(&prefix));
        Ok(())
    }

    async fn query(&self, caller: Option<&UserId>, query: &Query) -> Result<Vec<Snapshot>> {
        self.record_call();
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<&(String, Value)> = docs
            .iter()
            .filter(|(_, doc)| {
                query
                    .filters
                    .iter()
                    .all(|(path, expected)| field(doc, path) == Some(expected))
            })
            .collect();

        // A query is rejected outright if any result would be unreadable.
        if matches
            .iter()
            .any(|(_, doc)| !Self::can_read(&collections, &query.collection, doc, caller))
        {
            return Err(denied(format!("query on {}", query.collection)));
        }

        if let Some((path, direction)) = &query.order_by {
            matches.sort_by(|(_, a), (_, b)| {
                let ord = compare(field(a, path), field(b, path));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }

        Ok(matches
            .into_iter()
            .map(|(id, data)| Snapshot {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn count(&self, caller: Option<&UserId>, collection: &str) -> Result<u64> {
        self.record_call();
        let collections = self.collections.read().await;
        if let Collection::Responses(form_id) = classify(collection) {
            let allowed = find(&collections, "forms", form_id)
                .is_some_and(|form| owned_by(form, caller));
            if !allowed {
                return Err(denied(format!("count on {collection}")));
            }
        }
        Ok(collections.get(collection).map_or(0, |docs| docs.len() as u64))
    }
}

fn set_path(doc: &mut Value, path: &str, value: Value) {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut current = doc;
    if let Some(parents) = parents {
        for part in parents.split('.') {
            current = ensure_object(current)
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }
    ensure_object(current).insert(leaf.to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn owner_only_drafts() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create(Some(&alice()), "drafts", json!({"createdBy": "alice", "title": "x"}))
            .await
            .unwrap();

        assert!(store.get(Some(&alice()), "drafts", &id).await.unwrap().is_some());
        let err = store
            .get(Some(&UserId::new("bob")), "drafts", &id)
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let err = store
            .create(None, "drafts", json!({"createdBy": "alice"}))
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn server_timestamps_and_dotted_merge() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create(
                Some(&alice()),
                "forms",
                json!({"createdBy": "alice", "createdAt": crate::server_timestamp(), "settings": {"published": false, "requireLogin": true}}),
            )
            .await
            .unwrap();
        store
            .merge(Some(&alice()), "forms", &id, json!({"settings.published": true}))
            .await
            .unwrap();

        let doc = store.get(None, "forms", &id).await.unwrap().unwrap();
        assert_eq!(doc["settings"]["published"], true);
        assert_eq!(doc["settings"]["requireLogin"], true);
        let stamp = doc["createdAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[tokio::test]
    async fn deleting_form_drops_responses() {
        let store = MemoryDocumentStore::new();
        let form_id = store
            .create(Some(&alice()), "forms", json!({"createdBy": "alice", "settings": {"published": true}}))
            .await
            .unwrap();
        let responses = crate::document::responses_collection(&form_id);
        store.create(None, &responses, json!({"answers": {}})).await.unwrap();
        assert_eq!(store.count(Some(&alice()), &responses).await.unwrap(), 1);
        assert!(store.count(None, &responses).await.is_err());

        store.delete(Some(&alice()), "forms", &form_id).await.unwrap();
        assert!(store.get(Some(&alice()), "forms", &form_id).await.unwrap().is_none());
        assert!(!store.collections.read().await.contains_key(&responses));
    }

    #[tokio::test]
    async fn query_orders_and_limits() {
        let store = MemoryDocumentStore::new();
        for n in [3, 1, 2] {
            store
                .create(Some(&alice()), "forms", json!({"createdBy": "alice", "n": n}))
                .await
                .unwrap();
        }
        let query = Query::collection("forms")
            .where_eq("createdBy", "alice")
            .order_by("n", Direction::Descending)
            .limit(2);
        let found = store.query(Some(&alice()), &query).await.unwrap();
        let ns: Vec<_> = found.iter().map(|s| s.data["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 2]);

        // Unpublished forms are invisible to anonymous queries.
        assert!(store.query(None, &query).await.is_err());
        assert_eq!(store.calls(), 5);
    }
}

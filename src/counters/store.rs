use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::IF_NONE_MATCH;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::record::non_negative_field;
use crate::error::{IntakeError, Result};

/// Key/value document store holding per-user counters
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Point lookup; `None` if the document does not exist
    async fn get(&self, uid: &str) -> Result<Option<Value>>;

    /// Create the document unless one already exists. Returns `false` if it did.
    async fn create(&self, uid: &str, doc: Value) -> Result<bool>;

    /// Atomically add `deltas` to numeric fields and overwrite `fields`.
    ///
    /// Returns the updated document, or `None` if it does not exist.
    async fn increment(
        &self,
        uid: &str,
        deltas: &Map<String, Value>,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>>;
}

/// In-process store, used when no hosted store is configured and in tests
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    docs: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, uid: &str) -> Option<Value> {
        self.docs.read().await.get(uid).cloned()
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, uid: &str) -> Result<Option<Value>> {
        Ok(self.docs.read().await.get(uid).cloned())
    }

    async fn create(&self, uid: &str, doc: Value) -> Result<bool> {
        match self.docs.write().await.entry(uid.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(doc);
                Ok(true)
            }
        }
    }

    async fn increment(
        &self,
        uid: &str,
        deltas: &Map<String, Value>,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>> {
        let mut docs = self.docs.write().await;
        Ok(docs.get_mut(uid).map(|doc| {
            apply_increment(doc, deltas, fields);
            doc.clone()
        }))
    }
}

/// Document store reached over a REST API
///
/// Documents live at `{base_url}/{collection}/{uid}`:
/// - `GET` reads; `404` means the document does not exist
/// - `PUT` with `If-None-Match: *` creates; `412` means it already exists
/// - `PATCH` with `{"increment": {..}, "set": {..}}` applies the increment
///   server-side and answers with the updated document, or `404`
#[derive(Clone)]
pub struct HttpCounterStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl HttpCounterStore {
    pub fn new(client: Client, base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
        }
    }

    fn url(&self, uid: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.collection, uid)
    }
}

fn store_error(e: reqwest::Error) -> IntakeError {
    IntakeError::Counters(e.to_string())
}

#[async_trait::async_trait]
impl CounterStore for HttpCounterStore {
    async fn get(&self, uid: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(self.url(uid))
            .send()
            .await
            .map_err(store_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No counters record for {}", uid);
            return Ok(None);
        }

        let doc = response
            .error_for_status()
            .map_err(store_error)?
            .json::<Value>()
            .await
            .map_err(store_error)?;
        Ok(Some(doc))
    }

    async fn create(&self, uid: &str, doc: Value) -> Result<bool> {
        let response = self
            .client
            .put(self.url(uid))
            .header(IF_NONE_MATCH, "*")
            .json(&doc)
            .send()
            .await
            .map_err(store_error)?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            debug!("Counters record for {} already exists", uid);
            return Ok(false);
        }
        response.error_for_status().map_err(store_error)?;
        Ok(true)
    }

    async fn increment(
        &self,
        uid: &str,
        deltas: &Map<String, Value>,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>> {
        let response = self
            .client
            .patch(self.url(uid))
            .json(&json!({ "increment": deltas, "set": fields }))
            .send()
            .await
            .map_err(store_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc = response
            .error_for_status()
            .map_err(store_error)?
            .json::<Value>()
            .await
            .map_err(store_error)?;
        Ok(Some(doc))
    }
}

/// Add `deltas` to the numeric fields of `doc` and overwrite `fields`.
///
/// Existing values are coerced like `CountersRecord::normalize` reads them.
/// Integer deltas on integral values stay integers. A non-object `doc` is
/// replaced by an empty object first.
pub fn apply_increment(doc: &mut Value, deltas: &Map<String, Value>, fields: &Map<String, Value>) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }

    let sums: Vec<(String, Value)> = deltas
        .iter()
        .map(|(key, delta)| {
            let base = non_negative_field(doc, key);
            let sum = match delta.as_u64() {
                Some(step) if base.fract() == 0.0 => Value::from(base as u64 + step),
                _ => Value::from(base + delta.as_f64().unwrap_or(0.0)),
            };
            (key.clone(), sum)
        })
        .collect();

    if let Some(target) = doc.as_object_mut() {
        target.extend(sums);
        target.extend(fields.clone());
    }
}

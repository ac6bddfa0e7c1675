use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::record::{Activity, CountersRecord};
use super::store::CounterStore;
use crate::error::{IntakeError, Result};

/// Applies submission activity to a user's counters record
#[derive(Clone)]
pub struct CountersService {
    store: Arc<dyn CounterStore>,
}

impl CountersService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Read and normalize a user's counters
    pub async fn load(&self, uid: &str) -> Result<Option<CountersRecord>> {
        Ok(self
            .store
            .get(uid)
            .await?
            .map(|doc| CountersRecord::normalize(&doc)))
    }

    /// Increment in place, or create the record if it does not exist yet.
    ///
    /// The store applies the deltas atomically, so concurrent submissions
    /// for the same user do not lose updates.
    pub async fn record(&self, uid: &str, activity: Activity) -> Result<CountersRecord> {
        let now = Utc::now();
        let deltas = activity.deltas();
        let mut touched = Map::new();
        touched.insert(
            "lastActivityAt".to_string(),
            Value::String(now.to_rfc3339()),
        );

        if let Some(doc) = self.store.increment(uid, &deltas, &touched).await? {
            info!(uid, ?activity, "counters updated");
            return Ok(CountersRecord::normalize(&doc));
        }

        let mut record = CountersRecord::created(now);
        record.apply(activity, now);
        let doc = serde_json::to_value(&record).map_err(|e| IntakeError::Counters(e.to_string()))?;
        if self.store.create(uid, doc).await? {
            info!(uid, ?activity, "counters record created");
            return Ok(record);
        }

        // Another submission created the record first
        let doc = self
            .store
            .increment(uid, &deltas, &touched)
            .await?
            .ok_or_else(|| IntakeError::Counters(format!("counters record for {} vanished", uid)))?;
        info!(uid, ?activity, "counters updated");
        Ok(CountersRecord::normalize(&doc))
    }

    /// Best-effort variant: failures are logged and swallowed
    pub async fn record_best_effort(&self, uid: &str, activity: Activity) -> Option<CountersRecord> {
        match self.record(uid, activity).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(uid, "Failed to update counters: {}", e);
                None
            }
        }
    }
}

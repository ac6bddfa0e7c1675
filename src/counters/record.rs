use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-user usage counters as stored in the hosted document store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountersRecord {
    pub dictation_count: u64,
    pub case_count: u64,
    /// Accumulated merged-dictation duration in seconds
    pub total_dictation_seconds: f64,
    pub total_words: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One completed submission to account for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    Dictation { duration_seconds: f64 },
    Case { words: u64 },
}

impl Activity {
    /// Amounts this activity adds to the stored counters, keyed by field
    pub fn deltas(&self) -> Map<String, Value> {
        let mut deltas = Map::new();
        match *self {
            Activity::Dictation { duration_seconds } => {
                deltas.insert("dictationCount".to_string(), Value::from(1u64));
                deltas.insert(
                    "totalDictationSeconds".to_string(),
                    Value::from(counted_seconds(duration_seconds)),
                );
            }
            Activity::Case { words } => {
                deltas.insert("caseCount".to_string(), Value::from(1u64));
                deltas.insert("totalWords".to_string(), Value::from(words));
            }
        }
        deltas
    }
}

impl CountersRecord {
    /// Validate and normalize a raw document.
    ///
    /// Every document read from the store goes through here. Missing or
    /// mistyped fields default to zero/none, numeric strings are accepted,
    /// negatives clamp to zero and unparsable timestamps are dropped.
    pub fn normalize(doc: &Value) -> Self {
        Self {
            dictation_count: count_field(doc, "dictationCount"),
            case_count: count_field(doc, "caseCount"),
            total_dictation_seconds: non_negative_field(doc, "totalDictationSeconds"),
            total_words: count_field(doc, "totalWords"),
            last_activity_at: timestamp_field(doc, "lastActivityAt"),
            created_at: timestamp_field(doc, "createdAt"),
        }
    }

    /// Fresh record for a user seen for the first time
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(now),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, activity: Activity, now: DateTime<Utc>) {
        match activity {
            Activity::Dictation { duration_seconds } => {
                self.dictation_count += 1;
                self.total_dictation_seconds += counted_seconds(duration_seconds);
            }
            Activity::Case { words } => {
                self.case_count += 1;
                self.total_words += words;
            }
        }
        self.last_activity_at = Some(now);
    }
}

/// Whitespace-separated word count
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

fn number(doc: &Value, key: &str) -> Option<f64> {
    let value = match doc.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn counted_seconds(duration_seconds: f64) -> f64 {
    if duration_seconds.is_finite() && duration_seconds > 0.0 {
        duration_seconds
    } else {
        0.0
    }
}

fn count_field(doc: &Value, key: &str) -> u64 {
    non_negative_field(doc, key) as u64
}

/// Numeric field coerced the same way `normalize` does
pub(crate) fn non_negative_field(doc: &Value, key: &str) -> f64 {
    number(doc, key).map(|v| v.max(0.0)).unwrap_or(0.0)
}

fn timestamp_field(doc: &Value, key: &str) -> Option<DateTime<Utc>> {
    doc.get(key)?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

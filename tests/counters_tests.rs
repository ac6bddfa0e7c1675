// Integration tests for the counters service against both store backends

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dictation_intake::counters::{
    apply_increment, Activity, CounterStore, CountersService, HttpCounterStore, MemoryCounterStore,
};
use dictation_intake::Result;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

type Docs = Arc<Mutex<HashMap<String, Value>>>;

async fn read_doc(State(docs): State<Docs>, Path((_, uid)): Path<(String, String)>) -> impl IntoResponse {
    match docs.lock().await.get(&uid) {
        Some(doc) => (StatusCode::OK, Json(doc.clone())).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_doc(
    State(docs): State<Docs>,
    Path((_, uid)): Path<(String, String)>,
    headers: HeaderMap,
    Json(doc): Json<Value>,
) -> StatusCode {
    let mut docs = docs.lock().await;
    let create_only = headers.get(header::IF_NONE_MATCH).is_some_and(|v| v == "*");
    if create_only && docs.contains_key(&uid) {
        return StatusCode::PRECONDITION_FAILED;
    }
    docs.insert(uid, doc);
    StatusCode::CREATED
}

async fn patch_doc(
    State(docs): State<Docs>,
    Path((_, uid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let deltas = as_map(&body["increment"]);
    let fields = as_map(&body["set"]);
    match docs.lock().await.get_mut(&uid) {
        Some(doc) => {
            apply_increment(doc, &deltas, &fields);
            (StatusCode::OK, Json(doc.clone())).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn as_map(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn start_document_store() -> (String, Docs) {
    let docs: Docs = Arc::default();
    let app = Router::new()
        .route("/:collection/:uid", get(read_doc).put(put_doc).patch(patch_doc))
        .with_state(Arc::clone(&docs));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), docs)
}

/// Memory store that yields before every call, so concurrent callers interleave
#[derive(Clone, Default)]
struct InterleavingStore {
    inner: MemoryCounterStore,
}

#[async_trait::async_trait]
impl CounterStore for InterleavingStore {
    async fn get(&self, uid: &str) -> Result<Option<Value>> {
        tokio::task::yield_now().await;
        self.inner.get(uid).await
    }

    async fn create(&self, uid: &str, doc: Value) -> Result<bool> {
        tokio::task::yield_now().await;
        self.inner.create(uid, doc).await
    }

    async fn increment(
        &self,
        uid: &str,
        deltas: &Map<String, Value>,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>> {
        tokio::task::yield_now().await;
        self.inner.increment(uid, deltas, fields).await
    }
}

#[tokio::test]
async fn test_http_store_create_then_increment() {
    let (base_url, docs) = start_document_store().await;
    let store = HttpCounterStore::new(reqwest::Client::new(), format!("{}/", base_url), "users");
    let service = CountersService::new(Arc::new(store));

    assert!(service.load("u1").await.unwrap().is_none());

    service.record("u1", Activity::Case { words: 4 }).await.unwrap();
    let record = service
        .record("u1", Activity::Dictation { duration_seconds: 12.5 })
        .await
        .unwrap();

    assert_eq!(record.case_count, 1);
    assert_eq!(record.dictation_count, 1);
    assert_eq!(record.total_words, 4);
    assert_eq!(record.total_dictation_seconds, 12.5);

    let stored = docs.lock().await.get("u1").cloned().unwrap();
    assert_eq!(stored["caseCount"], json!(1));
    assert_eq!(stored["dictationCount"], json!(1));
    assert!(stored["createdAt"].is_string());

    let loaded = service.load("u1").await.unwrap().unwrap();
    assert_eq!(loaded, record);
}

#[tokio::test]
async fn test_existing_loose_record_is_normalized_before_increment() {
    let store = MemoryCounterStore::new();
    store
        .create(
            "u1",
            json!({
                "dictationCount": "2",
                "totalDictationSeconds": -5,
                "createdAt": "2025-03-01T09:00:00Z",
                "nickname": "kept",
            }),
        )
        .await
        .unwrap();
    let service = CountersService::new(Arc::new(store.clone()));

    let record = service
        .record("u1", Activity::Dictation { duration_seconds: 30.0 })
        .await
        .unwrap();

    assert_eq!(record.dictation_count, 3);
    assert_eq!(record.total_dictation_seconds, 30.0);

    let doc = store.snapshot("u1").await.unwrap();
    assert_eq!(doc["dictationCount"], json!(3));
    assert_eq!(doc["createdAt"], json!("2025-03-01T09:00:00Z"));
    assert_eq!(doc["nickname"], json!("kept"));
}

#[tokio::test]
async fn test_best_effort_swallows_store_errors() {
    let store = HttpCounterStore::new(reqwest::Client::new(), "http://127.0.0.1:1", "users");
    let service = CountersService::new(Arc::new(store));

    let result = service
        .record_best_effort("u1", Activity::Case { words: 1 })
        .await;

    assert!(result.is_none());
}

#[tokio::test]
async fn test_concurrent_updates_are_not_lost() {
    let store = InterleavingStore::default();
    store.inner.create("u1", json!({"caseCount": 5})).await.unwrap();
    let service = CountersService::new(Arc::new(store.clone()));

    let (a, b) = tokio::join!(
        service.record("u1", Activity::Case { words: 1 }),
        service.record("u1", Activity::Case { words: 1 }),
    );
    a.unwrap();
    b.unwrap();

    let doc = store.inner.snapshot("u1").await.unwrap();
    assert_eq!(doc["caseCount"], json!(7));
    assert_eq!(doc["totalWords"], json!(2));
}

#[tokio::test]
async fn test_concurrent_first_submissions_create_once() {
    let store = InterleavingStore::default();
    let service = CountersService::new(Arc::new(store.clone()));

    let (a, b) = tokio::join!(
        service.record("u1", Activity::Dictation { duration_seconds: 2.0 }),
        service.record("u1", Activity::Dictation { duration_seconds: 3.0 }),
    );
    a.unwrap();
    b.unwrap();

    let record = service.load("u1").await.unwrap().unwrap();
    assert_eq!(record.dictation_count, 2);
    assert_eq!(record.total_dictation_seconds, 5.0);
    assert!(record.created_at.is_some());
}

#[tokio::test]
async fn test_http_store_concurrent_increments() {
    let (base_url, docs) = start_document_store().await;
    let service = CountersService::new(Arc::new(HttpCounterStore::new(
        reqwest::Client::new(),
        base_url,
        "users",
    )));
    service.record("u1", Activity::Case { words: 1 }).await.unwrap();

    let updates = (0..5).map(|_| service.record("u1", Activity::Case { words: 2 }));
    for result in futures::future::join_all(updates).await {
        result.unwrap();
    }

    let stored = docs.lock().await.get("u1").cloned().unwrap();
    assert_eq!(stored["caseCount"], json!(6));
    assert_eq!(stored["totalWords"], json!(11));
}

//! In-memory document store
//!
//! Same semantics as the Postgres backend: versioned documents,
//! insert-if-absent, version-checked updates and all-or-nothing batches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Document, DocumentStore, StoreError, StoreResult, WriteBatch, WriteOp};

type Key = (String, String);

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<Key, Document>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend outage: every call fails with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.docs
            .read()
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

fn key_of(collection: &str, key: &str) -> Key {
    (collection.to_string(), key.to_string())
}

fn new_document(collection: &str, key: &str, body: Value) -> Document {
    let now = Utc::now();
    Document {
        collection: collection.to_string(),
        key: key.to_string(),
        version: 1,
        body,
        created_at: now,
        updated_at: now,
    }
}

/// Check one op against the current map (plus earlier ops in the same batch)
fn check_op(docs: &HashMap<Key, Document>, pending: &HashMap<Key, Option<i64>>, op: &WriteOp) -> StoreResult<()> {
    let (collection, key) = op.target();
    let k = key_of(collection, key);

    // Effective version after earlier ops in this batch; None = absent
    let current = match pending.get(&k) {
        Some(state) => *state,
        None => docs.get(&k).map(|d| d.version),
    };

    match op {
        WriteOp::Insert { .. } => {
            if current.is_some() {
                return Err(StoreError::AlreadyExists {
                    collection: collection.to_string(),
                    key: key.to_string(),
                });
            }
        }
        WriteOp::Update { expected_version, .. } => match current {
            None => {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    key: key.to_string(),
                })
            }
            Some(v) if v != *expected_version => {
                return Err(StoreError::VersionConflict {
                    collection: collection.to_string(),
                    key: key.to_string(),
                    expected: *expected_version,
                })
            }
            Some(_) => {}
        },
        WriteOp::Delete { .. } => {}
    }
    Ok(())
}

fn apply_op(docs: &mut HashMap<Key, Document>, op: WriteOp) {
    match op {
        WriteOp::Insert { collection, key, body } => {
            let doc = new_document(&collection, &key, body);
            docs.insert((collection, key), doc);
        }
        WriteOp::Update { collection, key, body, .. } => {
            if let Some(doc) = docs.get_mut(&(collection, key)) {
                doc.body = body;
                doc.version += 1;
                doc.updated_at = Utc::now();
            }
        }
        WriteOp::Delete { collection, key } => {
            docs.remove(&(collection, key));
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        self.check_online()?;
        Ok(self.docs.read().get(&key_of(collection, key)).cloned())
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> StoreResult<Document> {
        self.check_online()?;
        let mut docs = self.docs.write();
        let doc = docs
            .entry(key_of(collection, key))
            .and_modify(|doc| {
                doc.version += 1;
                doc.updated_at = Utc::now();
            })
            .or_insert_with(|| new_document(collection, key, Value::Null));
        doc.body = body;
        Ok(doc.clone())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected_version: i64,
    ) -> StoreResult<Document> {
        self.check_online()?;
        let mut docs = self.docs.write();
        let doc = docs
            .get_mut(&key_of(collection, key))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;

        if doc.version != expected_version {
            return Err(StoreError::VersionConflict {
                collection: collection.to_string(),
                key: key.to_string(),
                expected: expected_version,
            });
        }

        doc.body = body;
        doc.version += 1;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        self.check_online()?;
        let docs = self.docs.read();
        let mut found: Vec<Document> = docs
            .values()
            .filter(|d| d.collection == collection && d.body.get(field) == Some(value))
            .cloned()
            .collect();

        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)));
        Ok(found)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_online()?;
        let mut docs = self.docs.write();

        // Validate everything first so a failing op leaves the map untouched
        let mut pending: HashMap<Key, Option<i64>> = HashMap::new();
        for op in batch.ops() {
            check_op(&docs, &pending, op)?;
            let (collection, key) = op.target();
            let k = key_of(collection, key);
            let next = match op {
                WriteOp::Insert { .. } => Some(1),
                WriteOp::Update { expected_version, .. } => Some(expected_version + 1),
                WriteOp::Delete { .. } => None,
            };
            pending.insert(k, next);
        }

        for op in batch.ops().iter().cloned() {
            apply_op(&mut docs, op);
        }
        Ok(())
    }
}

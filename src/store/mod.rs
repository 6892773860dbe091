//! Document store
//!
//! Generic keyed-document persistence used by the attempt engine.
//! Documents live in named collections, carry a monotonically increasing
//! `version`, and are mutated either one at a time (`put`/`update`) or
//! through an all-or-nothing [`WriteBatch`] via `commit`.
//!
//! ## Backends
//! - `postgres`: JSONB rows in a single `documents` table (production)
//! - `memory`: process-local map (tests, local development)

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Collection names
pub mod collections {
    pub const ASSESSMENTS: &str = "assessments";
    pub const STUDENTS: &str = "students";
    pub const ATTEMPTS: &str = "attempts";
    pub const SIGNATURES: &str = "signatures";
    pub const FRAUD_REPORTS: &str = "fraud_reports";
    pub const NOTIFICATIONS: &str = "notifications";
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}/{key} not found")]
    NotFound { collection: String, key: String },

    #[error("{collection}/{key} already exists")]
    AlreadyExists { collection: String, key: String },

    #[error("{collection}/{key} version conflict (expected {expected})")]
    VersionConflict { collection: String, key: String, expected: i64 },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// DOCUMENTS
// ============================================================================

/// A stored document
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub collection: String,
    #[sqlx(rename = "doc_key")]
    pub key: String,
    pub version: i64,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// A typed value together with the version it was read at
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

impl<T: DeserializeOwned> Versioned<T> {
    pub fn from_document(doc: &Document) -> StoreResult<Self> {
        Ok(Self {
            value: doc.decode()?,
            version: doc.version,
        })
    }
}

// ============================================================================
// WRITE BATCH
// ============================================================================

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create a document; fails if the key is taken
    Insert { collection: String, key: String, body: Value },
    /// Replace a document read at `expected_version`
    Update { collection: String, key: String, body: Value, expected_version: i64 },
    /// Remove a document if present
    Delete { collection: String, key: String },
}

impl WriteOp {
    pub fn insert<T: Serialize>(collection: &str, key: impl Into<String>, value: &T) -> StoreResult<Self> {
        Ok(WriteOp::Insert {
            collection: collection.to_string(),
            key: key.into(),
            body: serde_json::to_value(value)?,
        })
    }

    pub fn update<T: Serialize>(
        collection: &str,
        key: impl Into<String>,
        value: &T,
        expected_version: i64,
    ) -> StoreResult<Self> {
        Ok(WriteOp::Update {
            collection: collection.to_string(),
            key: key.into(),
            body: serde_json::to_value(value)?,
            expected_version,
        })
    }

    pub fn delete(collection: &str, key: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            key: key.into(),
        }
    }

    pub fn target(&self) -> (&str, &str) {
        match self {
            WriteOp::Insert { collection, key, .. }
            | WriteOp::Update { collection, key, .. }
            | WriteOp::Delete { collection, key } => (collection, key),
        }
    }
}

/// Ordered set of writes applied as one unit
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>>;

    /// Create or overwrite a document unconditionally
    async fn put(&self, collection: &str, key: &str, body: Value) -> StoreResult<Document>;

    /// Replace a document only if it is still at `expected_version`
    async fn update(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected_version: i64,
    ) -> StoreResult<Document>;

    /// Documents whose top-level `field` equals `value`, oldest first
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>>;

    /// Apply every op in the batch, or none of them
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Run a store call under a deadline
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "store call exceeded {}ms",
            limit.as_millis()
        ))),
    }
}

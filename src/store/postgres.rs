//! PostgreSQL document store
//!
//! Documents are JSONB rows in the `documents` table (see `db.rs`).
//! `commit` runs the whole batch inside one transaction; any failing op
//! returns early and the dropped transaction rolls back.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Document, DocumentStore, StoreError, StoreResult, WriteBatch, WriteOp};

const SELECT_COLUMNS: &str = "collection, doc_key, version, body, created_at, updated_at";

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply(tx: &mut Transaction<'_, Postgres>, op: &WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Insert { collection, key, body } => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO documents (collection, doc_key, version, body)
                    VALUES ($1, $2, 1, $3)
                    ON CONFLICT (collection, doc_key) DO NOTHING
                    "#
                )
                .bind(collection)
                .bind(key)
                .bind(body)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::AlreadyExists {
                        collection: collection.clone(),
                        key: key.clone(),
                    });
                }
            }

            WriteOp::Update { collection, key, body, expected_version } => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET body = $3, version = version + 1, updated_at = NOW()
                    WHERE collection = $1 AND doc_key = $2 AND version = $4
                    "#
                )
                .bind(collection)
                .bind(key)
                .bind(body)
                .bind(expected_version)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    let exists = sqlx::query("SELECT 1 FROM documents WHERE collection = $1 AND doc_key = $2")
                        .bind(collection)
                        .bind(key)
                        .fetch_optional(&mut **tx)
                        .await?
                        .is_some();

                    return Err(if exists {
                        StoreError::VersionConflict {
                            collection: collection.clone(),
                            key: key.clone(),
                            expected: *expected_version,
                        }
                    } else {
                        StoreError::NotFound {
                            collection: collection.clone(),
                            key: key.clone(),
                        }
                    });
                }
            }

            WriteOp::Delete { collection, key } => {
                sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_key = $2")
                    .bind(collection)
                    .bind(key)
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE collection = $1 AND doc_key = $2",
            SELECT_COLUMNS
        );
        let doc = sqlx::query_as::<_, Document>(&sql)
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    async fn put(&self, collection: &str, key: &str, body: Value) -> StoreResult<Document> {
        let sql = format!(
            r#"
            INSERT INTO documents (collection, doc_key, version, body)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, doc_key) DO UPDATE SET
                body = EXCLUDED.body,
                version = documents.version + 1,
                updated_at = NOW()
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );
        let doc = sqlx::query_as::<_, Document>(&sql)
            .bind(collection)
            .bind(key)
            .bind(&body)
            .fetch_one(&self.pool)
            .await?;
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        body: Value,
        expected_version: i64,
    ) -> StoreResult<Document> {
        let mut tx = self.pool.begin().await?;
        Self::apply(
            &mut tx,
            &WriteOp::Update {
                collection: collection.to_string(),
                key: key.to_string(),
                body,
                expected_version,
            },
        )
        .await?;

        let sql = format!(
            "SELECT {} FROM documents WHERE collection = $1 AND doc_key = $2",
            SELECT_COLUMNS
        );
        let doc = sqlx::query_as::<_, Document>(&sql)
            .bind(collection)
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(doc)
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let sql = format!(
            r#"
            SELECT {} FROM documents
            WHERE collection = $1 AND body @> jsonb_build_object($2::text, $3::jsonb)
            ORDER BY created_at ASC, doc_key ASC
            "#,
            SELECT_COLUMNS
        );
        let docs = sqlx::query_as::<_, Document>(&sql)
            .bind(collection)
            .bind(field)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for op in batch.ops() {
            Self::apply(&mut tx, op).await?;
        }
        tx.commit().await?;

        tracing::debug!("Committed batch of {} writes", batch.len());
        Ok(())
    }
}

//! Startup seed data
//!
//! Assessments and student profiles are authored outside this service. A
//! seed file lets a fresh store (notably the in-memory one) serve `start`
//! and `submit` without an external writer. Documents already present are
//! left untouched, so a restart against a live database never resets
//! completion fields.
//!
//! ```json
//! {
//!   "assessments": [{"assessment_id": "exam-1", "owner_id": "t-1", "title": "Midterm", "kind": "exam"}],
//!   "students": [{"student_id": "stu-1", "name": "Ana"}]
//! }
//! ```

use serde::Deserialize;

use crate::models::{Assessment, StudentProfile};
use crate::store::{collections, DocumentStore, StoreResult};

#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub students: Vec<StudentProfile>,
}

pub fn parse_seed(text: &str) -> Result<SeedData, serde_json::Error> {
    serde_json::from_str(text)
}

/// Insert every seed document whose key is absent. Returns how many were written.
pub async fn apply_seed(store: &dyn DocumentStore, seed: &SeedData) -> StoreResult<usize> {
    let mut written = 0;

    for assessment in &seed.assessments {
        let body = serde_json::to_value(assessment)?;
        if insert_missing(store, collections::ASSESSMENTS, &assessment.assessment_id, body).await? {
            written += 1;
        }
    }

    for student in &seed.students {
        let body = serde_json::to_value(student)?;
        if insert_missing(store, collections::STUDENTS, &student.student_id, body).await? {
            written += 1;
        }
    }

    Ok(written)
}

async fn insert_missing(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    body: serde_json::Value,
) -> StoreResult<bool> {
    if store.get(collection, key).await?.is_some() {
        tracing::debug!("Seed skipped existing {}/{}", collection, key);
        return Ok(false);
    }
    store.put(collection, key, body).await?;
    Ok(true)
}

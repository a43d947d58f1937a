use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::user::StudentSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "teacherId": 7,
    "name": "Grade 10 - Evening",
    "subject": "Mathematics",
    "description": "Algebra and geometry",
    "createdAt": "2024-01-02T09:00:00Z"
}))]
pub struct Batch {
    pub id: u64,
    pub teacher_id: u64,
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Clone)]
pub struct NewBatch {
    pub teacher_id: u64,
    pub name: String,
    pub subject: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchChanges {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

impl BatchChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.subject.is_none() && self.description.is_none()
    }

    pub fn apply(&self, batch: &mut Batch) {
        if let Some(name) = &self.name {
            batch.name = name.clone();
        }
        if let Some(subject) = &self.subject {
            batch.subject = subject.clone();
        }
        if let Some(description) = &self.description {
            batch.description = Some(description.clone());
        }
    }
}

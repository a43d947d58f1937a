use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

/// Stored account. Never serialized to clients; see [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Parents only: the child whose records this account may read.
    pub student_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub student_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 7,
    "name": "Asha Rao",
    "email": "asha@example.com",
    "role": "teacher"
}))]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<u64>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            student_id: user.student_id,
        }
    }
}

/// Student as listed in a batch roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl From<&User> for StudentSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::model::{role::Role, user::UserProfile};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    #[validate(length(min = 3, max = 64, message = "must be 3 to 64 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    /// Required for parents: the child account to link.
    #[serde(default)]
    pub student_id: Option<u64>,
}

impl RegisterReq {
    /// Drops surrounding whitespace so length checks see what gets stored.
    pub fn trimmed(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginReqDto {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only on parent accounts: the linked child.
    pub student_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

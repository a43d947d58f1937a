use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only on parent accounts: the linked child
    pub student_id: Option<u64>,
}

impl AuthUser {
    /// Access-token claims to a caller identity.
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            student_id: claims.student_id,
        })
    }

    pub fn require_teacher(&self) -> Result<(), AppError> {
        if self.role == Role::Teacher {
            Ok(())
        } else {
            Err(AppError::Forbidden("Teacher only".into()))
        }
    }

    pub fn require_student(&self) -> Result<(), AppError> {
        if self.role == Role::Student {
            Ok(())
        } else {
            Err(AppError::Forbidden("Student only".into()))
        }
    }

    /// The child a parent account may read, if linked.
    pub fn require_parent(&self) -> Result<u64, AppError> {
        if self.role != Role::Parent {
            return Err(AppError::Forbidden("Parent only".into()));
        }
        self.student_id
            .ok_or_else(|| AppError::Forbidden("No student linked to this parent".into()))
    }
}

/// Bearer token from an `Authorization` header value.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(req) {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::Internal("Config missing".into()))),
        };

        let result = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid token".into()))
            .and_then(AuthUser::from_claims);
        ready(result)
    }
}

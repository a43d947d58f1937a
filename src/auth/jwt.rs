use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::model::user::User;
use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn claims_for(user: &User, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: user.id,
        sub: user.username.clone(),
        role: user.role.id(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        student_id: user.student_id,
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(user: &User, secret: &str, ttl: usize) -> Result<String, Error> {
    sign(&claims_for(user, TokenType::Access, ttl), secret)
}

/// The claims come back so the caller can persist the `jti`.
pub fn generate_refresh_token(
    user: &User,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims_for(user, TokenType::Refresh, ttl);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    const SECRET: &str = "unit-test-secret-value";

    fn parent() -> User {
        User {
            id: 42,
            username: "meera".into(),
            name: "Meera".into(),
            email: "meera@example.com".into(),
            password: String::new(),
            role: Role::Parent,
            student_id: Some(7),
        }
    }

    #[test]
    fn access_token_round_trips() {
        let token = generate_access_token(&parent(), SECRET, 60).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "meera");
        assert_eq!(claims.role, Role::Parent.id());
        assert_eq!(claims.student_id, Some(7));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_tokens_get_distinct_ids() {
        let (_, a) = generate_refresh_token(&parent(), SECRET, 60).unwrap();
        let (_, b) = generate_refresh_token(&parent(), SECRET, 60).unwrap();
        assert_eq!(a.token_type, TokenType::Refresh);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&parent(), SECRET, 60).unwrap();
        assert!(verify_token(&token, "another-secret-value").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = claims_for(&parent(), TokenType::Access, 0);
        // past the default 60s leeway
        claims.exp = now() - 120;
        let token = sign(&claims, SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }
}

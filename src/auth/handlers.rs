use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::{debug, error, info, instrument};
use validator::Validate;

use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{
        role::Role,
        user::{NewUser, User, UserProfile},
    },
    models::{LoginReqDto, LoginResponse, RegisterReq, TokenType},
    store::ClassroomStore,
};

/// Signs a fresh access/refresh pair and records the refresh token's `jti`.
async fn issue_tokens(
    user: &User,
    store: &dyn ClassroomStore,
    config: &Config,
) -> AppResult<LoginResponse> {
    let access_token =
        generate_access_token(user, &config.jwt_secret, config.access_token_ttl)
            .map_err(|e| AppError::Internal(format!("sign access token: {e}")))?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(user, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| AppError::Internal(format!("sign refresh token: {e}")))?;

    let expires_at = Utc
        .timestamp_opt(refresh_claims.exp as i64, 0)
        .single()
        .ok_or_else(|| AppError::Internal("refresh token expiry out of range".into()))?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store
        .store_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        user: UserProfile::from(user),
    })
}

/// Register an account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username or email already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(store, payload), fields(username = %payload.username))]
pub async fn register(
    payload: web::Json<RegisterReq>,
    store: web::Data<dyn ClassroomStore>,
) -> AppResult<HttpResponse> {
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    let username = payload.username.as_str();
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(
            "username: must not contain whitespace".into(),
        ));
    }

    let student_id = match payload.role {
        Role::Parent => {
            let child_id = payload.student_id.ok_or_else(|| {
                AppError::BadRequest("studentId: required for parent accounts".into())
            })?;
            match store.get_user(child_id).await? {
                Some(child) if child.role == Role::Student => Some(child_id),
                _ => return Err(AppError::BadRequest("studentId: no such student".into())),
            }
        }
        _ => None,
    };

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("hash password: {e}")))?;

    let user = store
        .create_user(NewUser {
            username: username.to_string(),
            name: payload.name,
            email: payload.email,
            password: hashed,
            role: payload.role,
            student_id,
        })
        .await?;

    info!(user_id = user.id, role = %user.role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "user": UserProfile::from(&user),
    })))
}

/// Log in
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = LoginResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    store: web::Data<dyn ClassroomStore>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::BadRequest("Username or password required".into()));
    }

    // 2️⃣ Fetch user
    let db_user = match store.find_user_by_username(user.username.trim()).await? {
        Some(u) => {
            debug!(user_id = u.id, "User found");
            u
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    // 4️⃣ Tokens
    let response = issue_tokens(&db_user, store.get_ref(), &config).await?;

    // 5️⃣ Update last_login_at (non-fatal)
    if let Err(e) = store.touch_last_login(db_user.id).await {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    Ok(HttpResponse::Ok().json(response))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Refresh token missing, invalid, expired or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    store: web::Data<dyn ClassroomStore>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let token = bearer_token(&req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    // 🔍 find refresh token
    if store.active_refresh_token(&claims.jti).await? != Some(claims.user_id) {
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    // 🔥 revoke old refresh token; losing a race here means someone else rotated it
    if !store.revoke_refresh_token(&claims.jti).await? {
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    // reload so role or link changes since login take effect
    let user = store
        .get_user(claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".into()))?;

    // 🔄 issue new pair
    let response = issue_tokens(&user, store.get_ref(), &config).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    store: web::Data<dyn ClassroomStore>,
    config: web::Data<Config>,
) -> HttpResponse {
    // 1️⃣ extract Authorization header
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    // 2️⃣ verify JWT; only refresh tokens can log out
    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // 3️⃣ revoke (idempotent)
    if let Err(e) = store.revoke_refresh_token(&claims.jti).await {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

/// Current account
#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, description = "Profile of the caller", body = UserProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, store: web::Data<dyn ClassroomStore>) -> AppResult<HttpResponse> {
    let user = store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": UserProfile::from(&user),
    })))
}

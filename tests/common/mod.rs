#![allow(dead_code)]

use std::sync::Arc;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{Method, StatusCode};
use actix_web::web::Data;
use actix_web::{App, test};
use actix_http::Request;
use serde_json::{Value, json};

use classroom::config::Config;
use classroom::routes::{self, RateLimiters};
use classroom::store::{ClassroomStore, MemoryStore};
use classroom::utils::batch_owner_cache::BatchOwnerCache;

pub const SECRET: &str = "integration-test-secret-0123456789";

pub async fn init_app()
-> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    let config = Config::for_tests(SECRET);
    let limiters = RateLimiters::new(&config).expect("limiters");
    let store: Arc<dyn ClassroomStore> = Arc::new(MemoryStore::new());

    test::init_service(
        App::new()
            .app_data(Data::from(store))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(BatchOwnerCache::default()))
            .configure(|cfg| routes::configure(cfg, &config, &limiters)),
    )
    .await
}

/// Sends a JSON request and returns the status with the decoded body
/// (`Value::Null` for empty bodies).
pub async fn send<S>(
    app: &S,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let mut req = test::TestRequest::default()
        .method(method)
        .uri(uri)
        .peer_addr("127.0.0.1:40000".parse().unwrap());
    if let Some(token) = token {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }

    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

pub async fn get<S>(app: &S, uri: &str, token: &str) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post<S>(app: &S, uri: &str, token: &str, body: Value) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put<S>(app: &S, uri: &str, token: &str, body: Value) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete<S>(app: &S, uri: &str, token: &str) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Registers an account and returns its id.
pub async fn register<S>(app: &S, username: &str, role: &str, student_id: Option<u64>) -> u64
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let mut body = json!({
        "username": username,
        "name": format!("{username} name"),
        "email": format!("{username}@example.com"),
        "password": "correct-horse",
        "role": role,
    });
    if let Some(id) = student_id {
        body["studentId"] = json!(id);
    }

    let (status, value) = send(app, Method::POST, "/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {value}");
    value["user"]["id"].as_u64().expect("user id")
}

/// Full login response.
pub async fn login_response<S>(app: &S, username: &str) -> Value
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let body = json!({ "username": username, "password": "correct-horse" });
    let (status, value) = send(app, Method::POST, "/auth/login", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "login {username}: {value}");
    value
}

/// Access token for `username`.
pub async fn login<S>(app: &S, username: &str) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    login_response(app, username).await["access_token"]
        .as_str()
        .expect("access token")
        .to_string()
}

/// Teacher with one batch holding the given students. Returns
/// (teacher token, batch id, student ids).
pub async fn seeded_batch<S>(app: &S, prefix: &str, students: &[&str]) -> (String, u64, Vec<u64>)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let teacher = format!("{prefix}_teacher");
    register(app, &teacher, "teacher", None).await;
    let token = login(app, &teacher).await;

    let (status, value) = post(
        app,
        "/admin/batches",
        &token,
        json!({ "name": format!("{prefix} batch"), "subject": "Mathematics" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    let batch_id = value["batch"]["id"].as_u64().expect("batch id");

    let mut ids = Vec::new();
    for name in students {
        let id = register(app, name, "student", None).await;
        let (status, value) = post(
            app,
            &format!("/admin/batches/{batch_id}/students"),
            &token,
            json!({ "studentId": id }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{value}");
        ids.push(id);
    }

    (token, batch_id, ids)
}

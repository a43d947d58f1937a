use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ClientError, ClientResult, Session, SessionStore};
use crate::model::user::UserProfile;
use crate::models::{LoginReqDto, LoginResponse, RegisterReq};

/// HTTP client bound to one service and one session store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_prefix: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// * `base_url` - e.g. `http://127.0.0.1:8080`
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_prefix: String::new(),
            session,
        }
    }

    /// Prefix the service mounts `/admin` and `/user` under.
    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        self.api_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub(crate) fn current_session(&self) -> ClientResult<Session> {
        self.session.session().ok_or(ClientError::NotAuthenticated)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("/auth") {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}{}", self.base_url, self.api_prefix, path)
        }
    }

    // ---- auth ----

    pub async fn register(&self, request: &RegisterReq) -> ClientResult<UserProfile> {
        let builder = self.http.post(self.url("/auth/register")).json(request);
        let body: Value = self.dispatch(builder, false).await?;
        take_field(body, "user")
    }

    /// Signs in and stores the resulting session.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        let builder = self.http.post(self.url("/auth/login")).json(&LoginReqDto {
            username: username.to_string(),
            password: password.to_string(),
        });
        let login: LoginResponse = self.dispatch(builder, false).await?;
        let session = Session::from_login(login)?;
        self.session.sign_in(session.clone())?;
        Ok(session)
    }

    /// Rotates the token pair using the stored refresh token.
    pub async fn refresh(&self) -> ClientResult<()> {
        let token = self
            .session
            .refresh_token()
            .ok_or(ClientError::NotAuthenticated)?;
        let builder = self.http.post(self.url("/auth/refresh")).bearer_auth(token);
        let login: LoginResponse = self.dispatch(builder, false).await?;
        self.session
            .replace_tokens(login.access_token, login.refresh_token)
    }

    /// Revokes the refresh token and clears the session. The local sign-out
    /// happens even when the service cannot be reached.
    pub async fn logout(&self) -> ClientResult<()> {
        if let Some(token) = self.session.refresh_token() {
            let request = self.http.post(self.url("/auth/logout")).bearer_auth(token);
            if let Err(e) = request.send().await {
                warn!(error = %e, "Logout request failed");
            }
        }
        self.session.sign_out()
    }

    // ---- authenticated calls ----

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.call(Method::GET, path, &[], None::<&()>).await
    }

    pub(crate) async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ClientResult<T> {
        self.call(Method::GET, path, query, None::<&()>).await
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.call(Method::POST, path, &[], Some(body)).await
    }

    pub(crate) async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.call(Method::PUT, path, &[], Some(body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> ClientResult<()> {
        let _: Value = self.call(Method::DELETE, path, &[], None::<&()>).await?;
        Ok(())
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ClientResult<T> {
        let token = self
            .session
            .access_token()
            .ok_or(ClientError::NotAuthenticated)?;

        let mut builder = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, path, "API request");
        self.dispatch(builder, true).await
    }

    /// Sends the request and maps the status. With `authenticated`, a 401
    /// clears the stored session before reporting [`ClientError::Unauthorized`].
    async fn dispatch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        authenticated: bool,
    ) -> ClientResult<T> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED && authenticated {
            warn!("Access token rejected, signing out");
            self.session.sign_out()?;
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        // 204 and empty bodies decode as JSON null
        let bytes = response.bytes().await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?
        };
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// The service's `error` text, or a generic line naming the status.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|msg| !msg.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

/// Pulls `field` out of a `{"success": true, "<field>": ...}` envelope.
pub(crate) fn take_field<T: DeserializeOwned>(mut body: Value, field: &str) -> ClientResult<T> {
    let value = body
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| ClientError::Decode(format!("response has no `{field}` field")))?;
    serde_json::from_value(value).map_err(|e| ClientError::Decode(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_text_wins_over_fallback() {
        let msg = error_message(
            StatusCode::CONFLICT,
            r#"{"success": false, "error": "Attendance for 2024-01-10 is already marked"}"#,
        );
        assert_eq!(msg, "Attendance for 2024-01-10 is already marked");

        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            "Request failed with status 502"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error": ""}"#),
            "Request failed with status 400"
        );
    }

    #[test]
    fn envelope_field_is_extracted() {
        let body = serde_json::json!({"success": true, "ids": [1, 2]});
        let ids: Vec<u64> = take_field(body.clone(), "ids").unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert!(matches!(
            take_field::<Vec<u64>>(body, "other"),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn auth_paths_skip_the_prefix() {
        let client = ApiClient::new("http://localhost:8080/", Arc::new(SessionStore::in_memory()))
            .with_api_prefix("/api/v1/");
        assert_eq!(client.url("/auth/login"), "http://localhost:8080/auth/login");
        assert_eq!(
            client.url("/admin/batches"),
            "http://localhost:8080/api/v1/admin/batches"
        );
    }
}

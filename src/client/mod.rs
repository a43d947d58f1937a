//! Typed client for the classroom service.
//!
//! [`ApiClient`] owns every REST call; it reads the bearer token from a
//! [`SessionStore`] and signs the store out when the service answers 401.

pub mod http;
pub mod navigation;
pub mod resources;
pub mod session;

use crate::model::role::Role;

pub use http::ApiClient;
pub use resources::AttendanceApi;
pub use session::{Profile, Session, SessionStore, Theme};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No session in the store; the caller should send the user to `/login`.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The service rejected the token. The session has already been cleared.
    #[error("Session expired, please sign in again")]
    Unauthorized,

    /// Role-scoped endpoint called with the wrong kind of account.
    #[error("Not available to {0} accounts")]
    WrongRole(Role),

    /// Any other non-2xx answer.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Session state {path}: {message}")]
    State { path: String, message: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e)
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

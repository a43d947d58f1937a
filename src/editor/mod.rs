//! Client-side record editors.

pub mod attendance;

use crate::client::ClientError;

pub use attendance::{AttendanceEditor, Banner, Mode};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Caught before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Records cannot be changed while {0}")]
    NotEditable(Mode),

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] ClientError),
}

pub type EditorResult<T> = Result<T, EditorError>;

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// The two ways a request can fail, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required multipart field was absent, nothing was sent to the model.
    MissingInput,
    /// Anything that went wrong while reading the body or calling the model.
    CapabilityError,
}

impl FailureKind {
    pub fn status(self) -> StatusCode {
        match self {
            FailureKind::MissingInput => StatusCode::BAD_REQUEST,
            FailureKind::CapabilityError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Taken from https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct GatewayError {
    pub kind: FailureKind,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HttpErrorResponse {
    pub(crate) error: String,
}

impl From<String> for HttpErrorResponse {
    fn from(message: String) -> Self {
        HttpErrorResponse { error: message }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(message: &str) -> Self {
        HttpErrorResponse {
            error: message.to_string(),
        }
    }
}

impl GatewayError {
    pub fn new(kind: FailureKind, message: impl Into<HttpErrorResponse>) -> Self {
        GatewayError {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_input(message: impl Into<HttpErrorResponse>) -> Self {
        Self::new(FailureKind::MissingInput, message)
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message.error)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.kind.status();
        res
    }
}

impl<E> From<E> for GatewayError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        GatewayError {
            kind: FailureKind::CapabilityError,
            message: HttpErrorResponse::from(format!("{:#}", err.into())),
        }
    }
}

pub type GatewayResult<T, E = GatewayError> = Result<T, E>;

#[macro_export]
macro_rules! bail_gateway {
    ($kind:expr, $error_message:expr) => {
        return Err($crate::error::GatewayError::new($kind, $error_message))
    };
    ($kind:expr, $fmt:expr $(, $arg:expr)*) => {
        return Err($crate::error::GatewayError::new($kind, format!($fmt $(, $arg)*)))
    };
}

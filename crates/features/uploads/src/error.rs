use stash_storage::StorageError;
use std::borrow::Cow;

/// A specialized [`UploadsError`] enum of this crate.
///
/// The first five variants are the client-visible taxonomy; `Storage` and `Config`
/// always surface as a generic internal error.
#[stash_derive::stash_error]
pub enum UploadsError {
    /// Malformed upload, or an upload into a namespace that is not configured.
    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Missing or incorrect namespace token, or a traversal attempt on retrieval.
    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Payload too large{}: {message}", format_context(.context))]
    PayloadTooLarge { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Invalid startup configuration.
    #[error("Uploads config error{}: {message}", format_context(.context))]
    Config { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    #[error("Uploads storage error{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },
    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal uploads error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl UploadsError {
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unauthorized { message: message.into(), context: None }
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: message.into(), context: None }
    }

    pub fn payload_too_large(message: impl Into<Cow<'static, str>>) -> Self {
        Self::PayloadTooLarge { message: message.into(), context: None }
    }

    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config { message: message.into(), context: None }
    }

    /// HTTP status code of this error kind.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::NotFound { .. } => 404,
            Self::PayloadTooLarge { .. } => 413,
            Self::Config { .. } | Self::Storage { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Text shown to clients. Internal failures never expose their details.
    #[must_use]
    pub fn public_message(&self) -> Cow<'static, str> {
        match self {
            Self::BadRequest { message, .. } => format!("400 Bad Request: {message}").into(),
            Self::Unauthorized { message, .. } => format!("401 Unauthorized: {message}").into(),
            Self::NotFound { message, .. } => format!("404 Not Found: {message}").into(),
            Self::PayloadTooLarge { message, .. } => {
                format!("413 Payload Too Large: {message}").into()
            },
            Self::Config { .. } | Self::Storage { .. } | Self::Internal { .. } => {
                Cow::Borrowed("500 Internal Server Error")
            },
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(feature = "server")]
mod response {
    use super::UploadsError;
    use axum::http::{StatusCode, header};
    use axum::response::{IntoResponse, Response};

    impl IntoResponse for UploadsError {
        fn into_response(self) -> Response {
            if self.is_internal() {
                tracing::error!(error = %self, "Unexpected failure while serving request");
            }

            let status =
                StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = self.public_message();

            (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body.into_owned())
                .into_response()
        }
    }
}

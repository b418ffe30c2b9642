//! Error types.
//!
//! [`Error`] is what handlers and middleware return. It separates errors that
//! are safe to show a client ([`Error::Trusted`]) from everything else
//! ([`Error::Opaque`]) and from integrity failures that must take the process
//! down ([`Error::Shutdown`]).
//!
//! [`ServerError`] surfaces infrastructure failures: binding a port, accepting
//! a connection, or failing to drain in-flight requests on shutdown.

use std::collections::BTreeMap;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error returned from a handler.
#[derive(Debug, Error)]
pub enum Error {
    /// Client-safe error. Rendered verbatim with its own status and fields.
    #[error(transparent)]
    Trusted(#[from] RequestError),

    /// Anything else. The client only ever sees a generic 500.
    #[error(transparent)]
    Opaque(BoxError),

    /// The request scope is corrupt or the process must stop serving.
    #[error("shutdown: {0}")]
    Shutdown(String),
}

impl Error {
    /// Wraps an arbitrary failure as an opaque error.
    ///
    /// Strings work too: `Error::opaque("database unreachable")`.
    pub fn opaque(err: impl Into<BoxError>) -> Self {
        Self::Opaque(err.into())
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown(reason.into())
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown(_))
    }

    /// The client-safe error, if this is one.
    pub fn trusted(&self) -> Option<&RequestError> {
        match self {
            Self::Trusted(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::opaque(e)
    }
}

/// A client-safe error: message, 4xx/5xx status, and optional per-field detail.
///
/// ```rust
/// use http::StatusCode;
/// use keel::RequestError;
///
/// let err = RequestError::new("bad input", StatusCode::BAD_REQUEST)
///     .with_field("name", "required");
/// assert_eq!(err.fields()["name"], "required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    message: String,
    status: StatusCode,
    fields: BTreeMap<String, String>,
}

impl RequestError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self { message: message.into(), status, fields: BTreeMap::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, detail: impl Into<String>) -> Self {
        self.fields.insert(name.into(), detail.into());
        self
    }

    pub fn message(&self) -> &str { &self.message }
    pub fn status(&self) -> StatusCode { self.status }
    pub fn fields(&self) -> &BTreeMap<String, String> { &self.fields }
}

/// Infrastructure failures returned by [`Server`](crate::Server).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// In-flight connections were still open when the grace period ran out.
    /// They have been aborted.
    #[error("could not stop gracefully within {0:?}")]
    GracePeriodElapsed(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_displays_its_message() {
        let err: Error = RequestError::new("not found", StatusCode::NOT_FOUND).into();
        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.trusted().map(RequestError::status), Some(StatusCode::NOT_FOUND));
        assert!(!err.is_shutdown());
    }

    #[test]
    fn opaque_is_not_trusted() {
        let err = Error::opaque("disk on fire");
        assert_eq!(err.to_string(), "disk on fire");
        assert!(err.trusted().is_none());
        assert!(!err.is_shutdown());
    }

    #[test]
    fn shutdown_carries_reason() {
        let err = Error::shutdown("values missing");
        assert!(err.is_shutdown());
        assert_eq!(err.to_string(), "shutdown: values missing");
    }

    #[test]
    fn json_failures_become_opaque() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Opaque(_)));
    }
}

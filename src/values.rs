//! Per-request state.
//!
//! Every request that reaches a handler through the [`App`](crate::App) gets
//! a fresh [`Values`] wrapped in a [`Context`]. The context is passed down the
//! middleware chain explicitly. There is no ambient lookup, so "the values
//! are missing" is a plain `None` check rather than a failed downcast.

use std::time::{Duration, Instant};

use http::StatusCode;
use uuid::Uuid;

use crate::error::Error;

/// State recorded for one request.
///
/// `trace_id` and `started_at` are fixed at creation. `status_code` stays
/// unset until the response encoder emits a response. `failed` is set once a
/// handler failure has been rendered for the client.
#[derive(Debug, Clone)]
pub struct Values {
    trace_id: String,
    started_at: Instant,
    status_code: Option<StatusCode>,
    failed: bool,
}

impl Values {
    /// Fresh values with a random v4 trace id and the current instant.
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            started_at: Instant::now(),
            status_code: None,
            failed: false,
        }
    }

    pub fn trace_id(&self) -> &str { &self.trace_id }
    pub fn started_at(&self) -> Instant { self.started_at }
    pub fn elapsed(&self) -> Duration { self.started_at.elapsed() }

    /// The status recorded by [`respond`](crate::respond), if any.
    pub fn status_code(&self) -> Option<StatusCode> { self.status_code }

    pub(crate) fn record_status(&mut self, status: StatusCode) {
        self.status_code = Some(status);
    }

    /// Whether a failure was handled somewhere in the chain.
    pub fn failed(&self) -> bool { self.failed }

    /// Marks the request as failed even though the chain will return `Ok`.
    ///
    /// The [`errors`](crate::middleware::errors) middleware calls this after
    /// rendering; the [`App`](crate::App) escalates on it under
    /// [`Escalation::AnyFailure`](crate::Escalation::AnyFailure).
    pub fn record_failure(&mut self) {
        self.failed = true;
    }
}

impl Default for Values {
    fn default() -> Self { Self::new() }
}

/// Request scope threaded through every handler and middleware.
#[derive(Debug)]
pub struct Context {
    values: Option<Values>,
}

impl Context {
    /// The context the dispatcher builds for every routed request.
    pub fn new(values: Values) -> Self {
        Self { values: Some(values) }
    }

    /// A context without request values.
    ///
    /// Everything in the chain treats this as an integrity violation and
    /// fails with [`Error::Shutdown`].
    pub fn background() -> Self {
        Self { values: None }
    }

    pub fn values(&self) -> Result<&Values, Error> {
        self.values.as_ref().ok_or_else(missing)
    }

    pub fn values_mut(&mut self) -> Result<&mut Values, Error> {
        self.values.as_mut().ok_or_else(missing)
    }
}

fn missing() -> Error {
    Error::shutdown("web values missing from request context")
}

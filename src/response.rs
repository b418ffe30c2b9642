//! Response sink and JSON encoding.
//!
//! Handlers write into a [`ResponseWriter`]. Most of the time they should not
//! touch it directly: [`respond`] serialises a value as JSON and records the
//! status in the request's [`Values`](crate::Values), and [`respond_error`]
//! turns an [`Error`] into the uniform `{"error": …, "fields": …}` body.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::values::Context;

/// The hyper response type every request ends in.
pub type HttpResponse = http::Response<Full<Bytes>>;

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Mutable response sink handed to every handler.
///
/// The status line can be written once. Later calls to
/// [`write_header`](Self::write_header) are ignored, and the first
/// [`write`](Self::write) without a status implies `200 OK`. A writer that was
/// never touched becomes an empty `200 OK`.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn write_header(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(first) => debug!(%first, ignored = %status, "superfluous write_header"),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }

    /// The status written so far, if any.
    pub fn status(&self) -> Option<StatusCode> { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Discards everything written so far.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn into_response(self) -> HttpResponse {
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Wire shape of every error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl ErrorResponse {
    fn internal() -> Self {
        Self { error: reason(StatusCode::INTERNAL_SERVER_ERROR), fields: BTreeMap::new() }
    }
}

/// Serialises `data` as JSON and writes it with `status`.
///
/// `204 No Content` writes the status line only; `data` is not serialised.
/// A serialisation failure is returned as-is and nothing is written. On
/// success the status is recorded in the request's values so the logger can
/// report it.
///
/// Fails with [`Error::Shutdown`] when the context carries no values.
pub fn respond<T>(
    ctx: &mut Context,
    w: &mut ResponseWriter,
    data: &T,
    status: StatusCode,
) -> Result<(), Error>
where
    T: Serialize + ?Sized,
{
    let values = ctx.values_mut()?;

    if status == StatusCode::NO_CONTENT {
        values.record_status(status);
        w.write_header(status);
        return Ok(());
    }

    let body = serde_json::to_vec(data)?;

    values.record_status(status);
    w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write_header(status);
    w.write(&body);
    Ok(())
}

/// Renders `err` for the client.
///
/// Anything the handler wrote before failing is discarded, so the client gets
/// the error body alone. A [`Error::Trusted`] error is sent with its own status, message and
/// fields. Anything else becomes `500 {"error":"Internal Server Error"}`; the
/// original detail never leaves the process.
pub fn respond_error(ctx: &mut Context, w: &mut ResponseWriter, err: &Error) -> Result<(), Error> {
    w.reset();
    match err.trusted() {
        Some(trusted) => {
            let body = ErrorResponse {
                error: trusted.message().to_owned(),
                fields: trusted.fields().clone(),
            };
            respond(ctx, w, &body, trusted.status())
        }
        None => respond(ctx, w, &ErrorResponse::internal(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// A JSON error body for failures that happen outside any handler chain.
pub(crate) fn status_response(status: StatusCode) -> HttpResponse {
    let body = ErrorResponse { error: reason(status), fields: BTreeMap::new() };
    let mut w = ResponseWriter::new();
    w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write_header(status);
    // Serialising two strings into a Vec cannot fail.
    w.write(&serde_json::to_vec(&body).unwrap_or_default());
    w.into_response()
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_owned()
}

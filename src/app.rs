//! The dispatcher.
//!
//! [`App`] owns the route table, the global middleware, and a handle to the
//! shutdown channel. It is built once during single-threaded startup and is
//! read-only afterwards, so concurrent requests share it without locks.
//!
//! # Fail-fast
//!
//! Any error that escapes a route's full middleware chain triggers a shutdown
//! request. With the standard stack (`logger`, `errors`, `panics`) only
//! [`Error::Shutdown`](crate::Error::Shutdown) escapes: the `errors`
//! middleware renders everything else and marks the request as failed in its
//! [`Values`]. Under the default [`Escalation::AnyFailure`] a failure handled
//! that way escalates too, so a plain `400` still takes the process down.
//! [`Escalation::ShutdownOnly`] restricts escalation to errors that escape
//! the chain.

use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{error, warn};

use crate::handler::{Handler, Middleware, wrap};
use crate::request::Request;
use crate::response::{HttpResponse, ResponseWriter};
use crate::router::{Route, Router};
use crate::shutdown::ShutdownHandle;
use crate::values::{Context, Values};

/// Which request failures make the [`App`] ask for a process shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Escalation {
    /// Every failure, including ones the chain rendered and handled.
    #[default]
    AnyFailure,
    /// Only errors that escape the full chain.
    ShutdownOnly,
}

/// Routes requests through middleware to handlers.
///
/// ```rust
/// use http::{Method, StatusCode};
/// use keel::{App, Context, Error, Request, ResponseWriter, middleware, respond, shutdown};
///
/// fn readiness(ctx: &mut Context, w: &mut ResponseWriter, _: &Request) -> Result<(), Error> {
///     respond(ctx, w, &(), StatusCode::NO_CONTENT)
/// }
///
/// let (handle, _rx) = shutdown::channel(1);
/// let app = App::new(handle, [middleware::logger(), middleware::errors(), middleware::panics()])
///     .on(Method::GET, "/readiness", readiness);
///
/// let res = app.serve(Request::new(Method::GET, "/readiness"));
/// assert_eq!(res.status(), StatusCode::NO_CONTENT);
/// ```
pub struct App {
    router: Router,
    middleware: Vec<Middleware>,
    shutdown: ShutdownHandle,
    escalation: Escalation,
}

impl App {
    /// `middleware` is applied to every route, first entry outermost.
    /// `None` entries are skipped.
    pub fn new<I, M>(shutdown: ShutdownHandle, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Option<Middleware>>,
    {
        Self {
            router: Router::default(),
            middleware: middleware.into_iter().filter_map(Into::into).collect(),
            shutdown,
            escalation: Escalation::default(),
        }
    }

    /// Sets the escalation policy for routes registered after this call.
    pub fn escalation(mut self, escalation: Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the path is malformed or already registered for `method`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.on_with(method, path, handler, Vec::<Middleware>::new())
    }

    /// Like [`on`](Self::on), with route-local middleware that runs inside
    /// the global middleware.
    pub fn on_with<I, M>(mut self, method: Method, path: &str, handler: impl Handler, local: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Option<Middleware>>,
    {
        let handler = wrap(local, handler.into_boxed_handler());
        let handler = wrap(self.middleware.iter().cloned(), handler);

        let shutdown = self.shutdown.clone();
        let escalation = self.escalation;
        let route: Route = Arc::new(move |req: &Request| {
            let mut ctx = Context::new(Values::new());
            let mut w = ResponseWriter::new();

            let res = handler(&mut ctx, &mut w, req);

            // A handler may have replaced the context wholesale.
            let (trace_id, handled) = match ctx.values() {
                Ok(v) => (v.trace_id(), v.failed()),
                Err(_) => ("-", false),
            };

            match res {
                Err(err) => {
                    error!(%trace_id, error = %err, "error escaped the handler chain, requesting shutdown");
                    shutdown.request(err.to_string());
                }
                Ok(()) if handled && escalation == Escalation::AnyFailure => {
                    warn!(%trace_id, "request failed, requesting shutdown");
                    shutdown.request(format!("request {trace_id} failed"));
                }
                Ok(()) => {}
            }

            w.into_response()
        });

        self.router.insert(method, path, route);
        self
    }

    /// Requests a process shutdown. Never blocks.
    pub fn signal_shutdown(&self, reason: impl Into<String>) {
        self.shutdown.request(reason);
    }

    /// Runs one request through the table.
    ///
    /// Unmatched requests get an empty `404 Not Found`. This call runs the
    /// whole middleware chain synchronously; the server invokes it on the
    /// blocking pool.
    pub fn serve(&self, mut req: Request) -> HttpResponse {
        match self.router.lookup(&req.method, &req.path) {
            Some((route, params)) => {
                req.params = params;
                route(&req)
            }
            None => {
                let mut w = ResponseWriter::new();
                w.write_header(StatusCode::NOT_FOUND);
                w.into_response()
            }
        }
    }
}

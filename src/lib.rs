//! # keel
//!
//! A minimal request-processing core for HTTP services.
//!
//! keel routes a request to a handler through a chain of middleware, gives
//! every request its own [`Values`] (trace id, start time, recorded status),
//! turns every failure into a uniform JSON error body, and escalates anything
//! it cannot handle into a coordinated process shutdown.
//!
//! ## The contract
//!
//! - **Handlers** are plain functions:
//!   `fn(&mut Context, &mut ResponseWriter, &Request) -> Result<(), Error>`.
//! - **Middleware** wraps a handler in another handler. The first middleware
//!   given is the outermost.
//! - **Errors** come in three kinds. [`Error::Trusted`] is shown to the client
//!   as-is, [`Error::Opaque`] becomes a generic 500, and [`Error::Shutdown`]
//!   takes the process down.
//! - **Fail-fast**: any failed request makes the [`App`] request a shutdown
//!   (see [`Escalation`]). The supervisor drains in-flight requests and exits;
//!   the orchestrator restarts the pod.
//!
//! What keel intentionally ignores: TLS, rate limiting, authentication. The
//! proxy in front of the service owns those.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{Method, StatusCode};
//! use keel::{App, Context, Error, Request, RequestError, ResponseWriter, Server};
//! use keel::{middleware, respond, server, shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), keel::ServerError> {
//!     let (handle, mut requests) = shutdown::channel(1);
//!
//!     let app = App::new(handle, [middleware::logger(), middleware::errors(), middleware::panics()])
//!         .on(Method::GET, "/users/{id}", get_user);
//!
//!     let stop = async move {
//!         tokio::select! {
//!             () = server::os_signal() => {}
//!             _ = requests.recv() => {}
//!         }
//!     };
//!
//!     Server::bind("0.0.0.0:3000".parse().unwrap()).await?.serve(app, stop).await
//! }
//!
//! fn get_user(ctx: &mut Context, w: &mut ResponseWriter, req: &Request) -> Result<(), Error> {
//!     match req.param("id") {
//!         Some("42") => respond(ctx, w, &serde_json::json!({"id": 42}), StatusCode::OK),
//!         _ => Err(RequestError::new("user not found", StatusCode::NOT_FOUND)
//!             .with_field("id", "unknown")
//!             .into()),
//!     }
//! }
//! ```

mod app;
mod error;
mod request;
mod response;
mod router;
mod values;

pub mod config;
pub mod debug;
pub mod handler;
pub mod health;
pub mod middleware;
pub mod server;
pub mod shutdown;

pub use app::{App, Escalation};
pub use error::{Error, RequestError, ServerError};
pub use handler::{BoxedHandler, Handler, Middleware};
pub use request::Request;
pub use response::{ErrorResponse, HttpResponse, ResponseWriter, respond, respond_error};
pub use server::Server;
pub use shutdown::{ShutdownHandle, ShutdownRequest};
pub use values::{Context, Values};

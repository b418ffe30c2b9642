//! Readiness probe and the service's route assembly.
//!
//! Kubernetes asks whether the pod can serve traffic. The answer here is
//! always yes; replace [`readiness`] with a handler that checks dependencies
//! if the service has any.

use http::{Method, StatusCode};

use crate::app::App;
use crate::error::Error;
use crate::middleware::{errors, logger, panics};
use crate::request::Request;
use crate::response::{ResponseWriter, respond};
use crate::shutdown::ShutdownHandle;
use crate::values::Context;

/// `GET /readiness`: `204 No Content`.
pub fn readiness(ctx: &mut Context, w: &mut ResponseWriter, _req: &Request) -> Result<(), Error> {
    respond(ctx, w, &(), StatusCode::NO_CONTENT)
}

/// The API with the standard middleware stack and every route registered.
pub fn api(shutdown: ShutdownHandle) -> App {
    App::new(shutdown, [logger(), errors(), panics()])
        .on(Method::GET, "/readiness", readiness)
}

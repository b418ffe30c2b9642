//! Debug listener routes.
//!
//! Served on a separate address for operators; never exposed through the
//! public API listener.
//!
//! The debug [`App`] shares the process's shutdown handle but runs under
//! [`Escalation::ShutdownOnly`]: a failing debug request is rendered and
//! logged without taking the API down. Only an integrity violation
//! ([`Error::Shutdown`]) still escalates.

use http::{Method, StatusCode};
use serde::Serialize;

use crate::app::{App, Escalation};
use crate::error::Error;
use crate::middleware::{errors, logger, panics};
use crate::request::Request;
use crate::response::{ResponseWriter, respond};
use crate::shutdown::ShutdownHandle;
use crate::values::Context;

/// Body of `GET /debug/vars`.
#[derive(Debug, Clone, Serialize)]
pub struct Vars {
    pub build: &'static str,
    pub cmdline: Vec<String>,
}

/// `GET /debug/vars`: build version and the process command line.
pub fn routes(shutdown: ShutdownHandle, build: &'static str) -> App {
    let vars = move |ctx: &mut Context, w: &mut ResponseWriter, _: &Request| -> Result<(), Error> {
        let vars = Vars { build, cmdline: std::env::args().collect() };
        respond(ctx, w, &vars, StatusCode::OK)
    };

    App::new(shutdown, [logger(), errors(), panics()])
        .escalation(Escalation::ShutdownOnly)
        .on(Method::GET, "/debug/vars", vars)
}

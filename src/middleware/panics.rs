use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use tracing::error;

use crate::error::Error;
use crate::handler::{Middleware, from_fn};

thread_local! {
    // Written by the panic hook on the panicking thread, taken by the recovery
    // boundary on the same thread right after unwinding.
    static LAST_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Crash recovery.
///
/// A panic anywhere below this middleware is caught, logged with the trace id
/// and the backtrace of the panic site, and returned as an opaque
/// `panic: <message>` error. Place it inside [`errors`](super::errors) so the
/// client gets a JSON 500 instead of a dropped connection.
pub fn panics() -> Middleware {
    install_backtrace_hook();

    Middleware::new(|next| {
        from_fn(move |ctx, w, req| {
            let trace_id = ctx.values()?.trace_id().to_owned();

            match panic::catch_unwind(AssertUnwindSafe(|| next(ctx, w, req))) {
                Ok(res) => res,
                Err(payload) => {
                    let backtrace = LAST_BACKTRACE
                        .with(|slot| slot.borrow_mut().take())
                        .unwrap_or_else(Backtrace::force_capture);
                    let message = panic_message(payload.as_ref());

                    error!(%trace_id, panic = %message, "PANIC\n{backtrace}");

                    Err(Error::opaque(format!("panic: {message}")))
                }
            }
        })
    })
}

/// Chains a hook in front of the current one that stashes the backtrace.
fn install_backtrace_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::handler::wrap;
    use crate::middleware::errors;
    use crate::middleware::testing::Capture;
    use crate::request::Request;
    use crate::response::ResponseWriter;
    use crate::values::{Context, Values};

    fn req() -> Request {
        Request::new(Method::GET, "/crash")
    }

    #[test]
    fn panic_becomes_an_opaque_error() {
        let capture = Capture::default();
        let chain = wrap([panics()], from_fn(|_, _, _| panic!("index out of bounds")));
        let mut ctx = Context::new(Values::new());
        let trace_id = ctx.values().unwrap().trace_id().to_owned();

        let err = capture
            .run(|| chain(&mut ctx, &mut ResponseWriter::new(), &req()))
            .unwrap_err();

        assert!(matches!(err, Error::Opaque(_)));
        assert_eq!(err.to_string(), "panic: index out of bounds");

        let out = capture.output();
        assert!(out.contains("PANIC"));
        assert!(out.contains(&trace_id));
    }

    #[test]
    fn formatted_panic_payloads_are_kept() {
        let chain = wrap([panics()], from_fn(|_, _, req| panic!("bad path {}", req.path())));

        let err = chain(&mut Context::new(Values::new()), &mut ResponseWriter::new(), &req()).unwrap_err();

        assert_eq!(err.to_string(), "panic: bad path /crash");
    }

    #[test]
    fn normal_returns_are_untouched() {
        let chain = wrap([panics()], from_fn(|_, _, _| Ok(())));
        assert!(chain(&mut Context::new(Values::new()), &mut ResponseWriter::new(), &req()).is_ok());

        let chain = wrap([panics()], from_fn(|_, _, _| Err(Error::shutdown("stop"))));
        let err = chain(&mut Context::new(Values::new()), &mut ResponseWriter::new(), &req()).unwrap_err();
        assert!(err.is_shutdown());
    }

    #[test]
    fn recovered_panic_reaches_the_errors_middleware() {
        let chain = wrap([errors(), panics()], from_fn(|_, _, _| panic!("boom")));
        let mut w = ResponseWriter::new();

        let res = chain(&mut Context::new(Values::new()), &mut w, &req());

        assert!(res.is_ok());
        assert_eq!(w.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(w.body()).unwrap(),
            json!({"error": "Internal Server Error"})
        );
    }

    #[test]
    fn missing_values_is_a_shutdown() {
        let chain = wrap([panics()], from_fn(|_, _, _| Ok(())));
        let err = chain(&mut Context::background(), &mut ResponseWriter::new(), &req()).unwrap_err();
        assert!(err.is_shutdown());
    }
}

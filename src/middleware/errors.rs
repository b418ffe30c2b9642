use tracing::error;

use crate::handler::{Middleware, from_fn};
use crate::response::respond_error;

/// Error-to-response translation.
///
/// A failure coming out of the inner chain is logged with the trace id,
/// rendered through [`respond_error`], and recorded in the request's
/// [`Values`](crate::Values). After that it is handled: the chain returns
/// `Ok(())`. Shutdown errors are the exception. They are rendered and then
/// returned unchanged so the [`App`](crate::App) escalates on them under any
/// policy.
pub fn errors() -> Middleware {
    Middleware::new(|next| {
        from_fn(move |ctx, w, req| {
            let trace_id = ctx.values()?.trace_id().to_owned();

            let Err(err) = next(ctx, w, req) else {
                return Ok(());
            };

            error!(%trace_id, error = %err, "request failed");

            respond_error(ctx, w, &err)?;
            ctx.values_mut()?.record_failure();

            if err.is_shutdown() {
                return Err(err);
            }
            Ok(())
        })
    })
}

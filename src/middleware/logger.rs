use tracing::info;

use crate::handler::{Middleware, from_fn};

/// Access logging.
///
/// Logs `request started` before the handler runs and `request completed`
/// after it returns, whatever it returned. The completion line carries the
/// status recorded by [`respond`](crate::respond) (`0` if nothing was
/// encoded) and the time since the request's values were created.
pub fn logger() -> Middleware {
    Middleware::new(|next| {
        from_fn(move |ctx, w, req| {
            let values = ctx.values()?;
            let trace_id = values.trace_id().to_owned();
            let started_at = values.started_at();

            info!(
                %trace_id,
                method = %req.method(),
                path = req.path(),
                remote = %req.remote_addr(),
                "request started"
            );

            let res = next(ctx, w, req);

            let status = ctx.values().ok().and_then(|v| v.status_code());
            info!(
                %trace_id,
                method = %req.method(),
                path = req.path(),
                remote = %req.remote_addr(),
                status = status.map_or(0, |s| s.as_u16()),
                elapsed = ?started_at.elapsed(),
                "request completed"
            );

            res
        })
    })
}

//! Handlers, middleware, and how they compose.
//!
//! # Handlers
//!
//! A handler is any function with the signature
//!
//! ```text
//! fn(&mut Context, &mut ResponseWriter, &Request) -> Result<(), Error>
//! ```
//!
//! The router stores handlers of many concrete types side by side, so each
//! one is type-erased into a [`BoxedHandler`] (`Arc<dyn Fn …>`) at
//! registration time. Cloning a `BoxedHandler` is one atomic increment.
//!
//! # Middleware
//!
//! A [`Middleware`] turns one handler into another. It runs code before and
//! after the handler it wraps and decides what to do with its result.
//! [`wrap`] composes a list of them around a handler:
//!
//! ```text
//! wrap([m0, m1, m2], h)  ==  m0(m1(m2(h)))
//!
//! m0 pre → m1 pre → m2 pre → h → m2 post → m1 post → m0 post
//! ```

use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::values::Context;

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler =
    Arc<dyn Fn(&mut Context, &mut ResponseWriter, &Request) -> Result<(), Error> + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// function or closure with the handler signature. The trait is sealed: only
/// the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F> private::Sealed for F where
    F: Fn(&mut Context, &mut ResponseWriter, &Request) -> Result<(), Error> + Send + Sync + 'static
{
}

impl<F> Handler for F
where
    F: Fn(&mut Context, &mut ResponseWriter, &Request) -> Result<(), Error> + Send + Sync + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

/// Boxes a closure as a handler.
///
/// Closure parameter types are inferred from this signature, which saves
/// spelling them out inside middleware.
pub fn from_fn<F>(f: F) -> BoxedHandler
where
    F: Fn(&mut Context, &mut ResponseWriter, &Request) -> Result<(), Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// A handler-to-handler transformation.
///
/// ```rust
/// use keel::{Middleware, handler};
///
/// let noop = Middleware::new(|next| {
///     handler::from_fn(move |ctx, w, req| next(ctx, w, req))
/// });
/// # let _ = noop;
/// ```
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static>);

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wraps `handler` in this middleware.
    pub fn apply(&self, handler: BoxedHandler) -> BoxedHandler {
        (self.0)(handler)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Middleware")
    }
}

/// Wraps `middleware` around `handler`; the first entry ends up outermost.
///
/// Entries may be `Option<Middleware>`; `None` is skipped.
pub fn wrap<I, M>(middleware: I, handler: BoxedHandler) -> BoxedHandler
where
    I: IntoIterator<Item = M>,
    M: Into<Option<Middleware>>,
{
    let chain: Vec<Middleware> = middleware.into_iter().filter_map(Into::into).collect();

    // Walk backwards so the first middleware is the last applied, i.e. outermost.
    chain.iter().rev().fold(handler, |h, mw| mw.apply(h))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::Method;

    use super::*;
    use crate::values::Values;

    type Trail = Arc<Mutex<Vec<String>>>;

    fn tracer(name: &'static str, trail: &Trail) -> Middleware {
        let trail = Arc::clone(trail);
        Middleware::new(move |next| {
            let trail = Arc::clone(&trail);
            from_fn(move |ctx, w, req| {
                trail.lock().unwrap().push(format!("{name} pre"));
                let res = next(ctx, w, req);
                trail.lock().unwrap().push(format!("{name} post"));
                res
            })
        })
    }

    fn target(trail: &Trail) -> BoxedHandler {
        let trail = Arc::clone(trail);
        from_fn(move |_, _, _| {
            trail.lock().unwrap().push("handler".into());
            Ok(())
        })
    }

    fn run(h: &BoxedHandler) -> Result<(), Error> {
        let mut ctx = Context::new(Values::new());
        let mut w = ResponseWriter::new();
        h(&mut ctx, &mut w, &Request::new(Method::GET, "/"))
    }

    fn take(trail: &Trail) -> Vec<String> {
        std::mem::take(&mut *trail.lock().unwrap())
    }

    #[test]
    fn nests_lifo() {
        let trail = Trail::default();
        let chain = [tracer("a", &trail), tracer("b", &trail), tracer("c", &trail)];

        run(&wrap(chain, target(&trail))).unwrap();

        assert_eq!(
            take(&trail),
            ["a pre", "b pre", "c pre", "handler", "c post", "b post", "a post"]
        );
    }

    #[test]
    fn empty_list_is_the_handler_itself() {
        let trail = Trail::default();

        run(&wrap(Vec::<Middleware>::new(), target(&trail))).unwrap();

        assert_eq!(take(&trail), ["handler"]);
    }

    #[test]
    fn absent_entries_are_skipped() {
        let trail = Trail::default();
        let chain = [None, Some(tracer("a", &trail)), None, Some(tracer("b", &trail)), None];

        run(&wrap(chain, target(&trail))).unwrap();

        assert_eq!(take(&trail), ["a pre", "b pre", "handler", "b post", "a post"]);
    }

    #[test]
    fn local_then_global_equals_concatenation() {
        let trail = Trail::default();
        let global = [tracer("g0", &trail), tracer("g1", &trail)];
        let local = [tracer("l0", &trail), tracer("l1", &trail)];

        let staged = wrap(global.clone(), wrap(local.clone(), target(&trail)));
        run(&staged).unwrap();
        let staged_trail = take(&trail);

        let flat = wrap(global.into_iter().chain(local), target(&trail));
        run(&flat).unwrap();

        assert_eq!(staged_trail, take(&trail));
    }

    #[test]
    fn result_flows_back_out() {
        let trail = Trail::default();
        let failing = from_fn(|_, _, _| Err(Error::opaque("boom")));

        let err = run(&wrap([tracer("a", &trail)], failing)).unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(take(&trail), ["a pre", "a post"]);
    }
}

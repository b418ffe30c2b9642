//! Radix-tree route table.
//!
//! One tree per HTTP method. O(path-length) lookup. The table knows nothing
//! about middleware or request values: it maps a method and a path to
//! whatever the [`App`](crate::App) installed there.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::request::Request;
use crate::response::HttpResponse;

/// What the table stores: a fully prepared per-request entry point.
pub(crate) type Route = Arc<dyn Fn(&Request) -> HttpResponse + Send + Sync + 'static>;

#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
}

impl Router {
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with an existing route.
    /// Routes are registered once at startup; a bad one is a programming error.
    pub(crate) fn insert(&mut self, method: Method, path: &str, route: Route) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Route, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let route = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }
}

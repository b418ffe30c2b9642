//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//! An [`App`] can also ask for a shutdown itself when a request trips an
//! integrity check.
//!
//! Either way the server reacts by:
//! 1. Immediately stopping `listener.accept()`. No new connections are made.
//! 2. Asking every open connection to finish its in-flight request and close.
//! 3. Waiting up to the grace period, then aborting whatever is left.
//!
//! Keep the grace period below `terminationGracePeriodSeconds`.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::ServerError;
use crate::request::Request;
use crate::response::{HttpResponse, status_response};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    read_timeout: Duration,
    write_timeout: Duration,
    grace_period: Duration,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until
    /// [`serve`](Server::serve) is called.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_TIMEOUT,
        })
    }

    /// The bound address. Useful after binding port `0`.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Time allowed for a client to send request headers (HTTP/1).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Time allowed to read the body and run the handler chain. Past it the
    /// connection is dropped.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Time in-flight requests get to finish once `shutdown` resolves.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Accepts connections and dispatches them through `app` until
    /// `shutdown` resolves, then drains.
    ///
    /// Returns [`ServerError::GracePeriodElapsed`] if connections were still
    /// open when the grace period ran out; they are aborted.
    pub async fn serve<F>(self, app: App, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Self { listener, read_timeout, write_timeout, grace_period } = self;
        let addr = listener.local_addr()?;

        // Wrap the app in Arc so it can be shared across concurrent connection
        // tasks without copying the routing table.
        let app = Arc::new(app);

        // Flipped once on shutdown; every connection task watches it.
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(%addr, "keel listening");

        let mut tasks = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a stop request immediately ends the
                // accept loop, even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let mut stop = stop_rx.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            dispatch(app, req, remote_addr, write_timeout)
                        });

                        let mut builder = ConnBuilder::new(TokioExecutor::new());
                        builder.http1().timer(TokioTimer::new()).header_read_timeout(read_timeout);

                        // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let res = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = stop.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };

                        if let Err(e) = res {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        let _ = stop_tx.send(true);

        let drained = tokio::time::timeout(grace_period, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = tasks.len(), ?grace_period, "grace period elapsed, aborting connections");
            tasks.shutdown().await;
            return Err(ServerError::GracePeriodElapsed(grace_period));
        }

        info!("keel stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers one request and runs it through the app on the blocking pool.
///
/// Returning `Err` makes hyper drop the connection; that only happens when
/// the write timeout elapses.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    write_timeout: Duration,
) -> Result<HttpResponse, io::Error> {
    let work = async move {
        let (parts, body) = req.into_parts();

        let body: Bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(peer = %remote_addr, "failed to read request body: {e}");
                return status_response(StatusCode::BAD_REQUEST);
            }
        };

        let request = Request::from_parts(parts, body, remote_addr);

        // The handler chain is synchronous and may block.
        match tokio::task::spawn_blocking(move || app.serve(request)).await {
            Ok(res) => res,
            Err(e) => {
                error!(peer = %remote_addr, "request task failed: {e}");
                status_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    };

    tokio::time::timeout(write_timeout, work).await.map_err(|_| {
        warn!(peer = %remote_addr, ?write_timeout, "write timeout elapsed, dropping connection");
        io::Error::new(io::ErrorKind::TimedOut, "write timeout elapsed")
    })
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// Drives `main` to completion on a fresh multi-threaded runtime.
///
/// Handler chains run on the blocking pool and cannot be cancelled. Once
/// `main` returns the runtime is shut down without waiting for them, so a
/// handler that outlives the grace period cannot keep the process alive.
pub fn run<F: Future>(main: F) -> io::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let out = rt.block_on(main);
    rt.shutdown_background();
    Ok(out)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first termination signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
pub async fn os_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves, so on non-Unix platforms the SIGTERM arm
    // is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

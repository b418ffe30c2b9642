//! keel-api: the API service binary.
//!
//! Parses configuration, starts the debug listener, serves the API, and
//! supervises shutdown: a SIGINT/SIGTERM or the first internal shutdown
//! request, whichever comes first, starts a graceful drain.

use anyhow::Context as _;
use clap::Parser;
use keel::config::{BUILD, Config};
use keel::{Server, debug, health, server, shutdown};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // A handler still stuck on the blocking pool must not hold up the exit.
    if let Err(e) = server::run(run()).context("building the runtime")? {
        error!(error = ?e, "keel-api failed");
        return Err(e);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // `--help` and `--version` print and exit 0 from here.
    let config = Config::parse();

    info!(build = BUILD, "application initializing");
    info!(?config, "configuration");

    // One slot is enough: a pending request already means we are stopping.
    let (handle, mut requests) = shutdown::channel(1);

    // The debug listener lives as long as the process; it is not drained.
    let debug_server = Server::bind(config.web.debug_host)
        .await
        .context("binding debug listener")?;
    let debug_app = debug::routes(handle.clone(), BUILD);
    tokio::spawn(async move {
        if let Err(e) = debug_server.serve(debug_app, std::future::pending()).await {
            error!("debug listener closed: {e}");
        }
    });

    let api = Server::bind(config.web.api_host)
        .await
        .context("binding API listener")?
        .read_timeout(config.web.read_timeout)
        .write_timeout(config.web.write_timeout)
        .grace_period(config.web.shutdown_timeout);

    let stop = async move {
        tokio::select! {
            () = server::os_signal() => info!("termination signal received"),
            Some(req) = requests.recv() => info!(reason = %req.reason, "shutdown requested by the application"),
        }
    };

    api.serve(health::api(handle), stop)
        .await
        .context("could not stop the API server gracefully")?;

    info!("completed");
    Ok(())
}

//! Shutdown requests raised from inside the request path.
//!
//! The supervisor owns the receiving half and reads it once. Any request task
//! can raise a request through a cloned [`ShutdownHandle`] without blocking:
//! the channel is bounded, and a full channel already means a shutdown is
//! pending.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Why the process was asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownRequest {
    pub reason: String,
}

/// Receiving half, owned by the supervisor.
pub type ShutdownReceiver = mpsc::Receiver<ShutdownRequest>;

/// Sending half, cloned into every route adapter.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<ShutdownRequest>,
}

/// Creates a shutdown channel that holds up to `capacity` pending requests.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn channel(capacity: usize) -> (ShutdownHandle, ShutdownReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (ShutdownHandle { tx }, rx)
}

impl ShutdownHandle {
    /// Enqueues a shutdown request. Never blocks.
    pub fn request(&self, reason: impl Into<String>) {
        let req = ShutdownRequest { reason: reason.into() };
        match self.tx.try_send(req) {
            Ok(()) => {}
            Err(TrySendError::Full(req)) => {
                debug!(reason = %req.reason, "shutdown already pending");
            }
            Err(TrySendError::Closed(req)) => {
                warn!(reason = %req.reason, "shutdown requested but nobody is listening");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_does_not_block() {
        let (handle, mut rx) = channel(1);

        handle.request("first");
        handle.request("second");

        assert_eq!(rx.try_recv().unwrap().reason, "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_tolerated() {
        let (handle, rx) = channel(1);
        drop(rx);

        handle.request("nobody home");
    }
}

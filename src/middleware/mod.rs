//! Built-in middleware.
//!
//! The standard stack, outermost first:
//!
//! ```text
//! logger → errors → panics → handler
//! ```
//!
//! - [`logger`]: access log line on entry and on exit (status, latency).
//! - [`errors`]: renders failures as JSON, lets only shutdown errors through.
//! - [`panics`]: turns a panic in the handler into an ordinary error.
//!
//! Each of them fails with [`Error::Shutdown`](crate::Error::Shutdown) when
//! the request context has no values.

mod errors;
mod logger;
mod panics;

pub use errors::errors;
pub use logger::logger;
pub use panics::panics;

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub(crate) fn output(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Runs `f` with a subscriber that writes into this capture.
        pub(crate) fn run<T>(&self, f: impl FnOnce() -> T) -> T {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::TRACE)
                .finish();
            tracing::subscriber::with_default(subscriber, f)
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}

use std::future::Future;

#[cfg(feature = "tracing")]
use tracing::{Instrument, Level};

use crate::capture::config::StreamSource;

pub trait MaybeInstrument: Future + Sized {
    #[cfg(feature = "tracing")]
    fn maybe_instrument(self, name: &'static str) -> impl Future<Output = Self::Output> {
        let span = tracing::span!(Level::DEBUG, "capture_async", name = name);
        self.instrument(span)
    }

    #[cfg(not(feature = "tracing"))]
    fn maybe_instrument(self, _name: &'static str) -> Self {
        self
    }
}

impl<F: Future> MaybeInstrument for F {}

/// Keeps the current thread inside a span until dropped.
#[cfg(feature = "tracing")]
pub(crate) type ThreadSpanGuard = tracing::span::EnteredSpan;
#[cfg(not(feature = "tracing"))]
pub(crate) type ThreadSpanGuard = ();

/// Enters a span for a worker thread, tagged with the stream it serves.
#[cfg(feature = "tracing")]
pub(crate) fn enter_thread_span(role: &'static str, stream: Option<StreamSource>) -> ThreadSpanGuard {
    tracing::span!(Level::DEBUG, "worker", role = role, stream = stream.map(|s| s.as_str()))
        .entered()
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn enter_thread_span(_role: &'static str, _stream: Option<StreamSource>) -> ThreadSpanGuard {}

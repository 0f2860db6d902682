//! One-directional byte relay from a source to a sink on a dedicated thread.

use std::{
    io,
    sync::{Arc, mpsc},
    thread,
};

use crate::{
    capture::{
        config::{DEFAULT_BUFFER_SIZE, StreamSource},
        error::{CaptureError, RelayFault},
        event::{CaptureEvent, RelayStopReason, emit},
        flush::{FlushContext, FlushPolicy, NeverFlush},
        io::{ByteSink, ByteSource},
        state::RelayState,
    },
    helper::tracing::enter_thread_span,
};

pub(crate) mod context;
pub mod handle;
pub mod monitor;

use context::RelayContext;
pub use handle::{JoinOutcome, RelayHandle};
pub use monitor::{RelayMonitor, RelayReport};

/// Copies bytes from one source to one sink until end-of-stream or a fault
///
/// The relay owns both ends exclusively. It runs exactly once: [`run`](Self::run)
/// and [`spawn`](Self::spawn) consume it. On every exit path it closes the
/// source and then the sink, and close failures are logged, never returned.
///
/// Read, write and flush faults end the copy loop without retrying. They are
/// recorded as [`RelayStopReason::Fault`] and are never propagated to the owner.
///
/// # Examples
///
/// ```rust
/// use tcrm_capture::capture::{
///     config::StreamSource,
///     event::RelayStopReason,
///     flush::AlwaysFlush,
///     io::MemorySink,
///     relay::StreamRelay,
/// };
/// use std::sync::Arc;
///
/// let relay = StreamRelay::new(StreamSource::Stdout, &b"hello\n"[..], MemorySink::new())
///     .flush_policy(Arc::new(AlwaysFlush))
///     .buffer_size(4);
/// let monitor = relay.monitor();
///
/// let sink = relay.spawn().unwrap().join().unwrap();
///
/// assert_eq!(sink.bytes(), b"hello\n");
/// assert_eq!(sink.flush_count(), 2);
/// assert_eq!(monitor.report().stop_reason, Some(RelayStopReason::EndOfStream));
/// ```
#[derive(Debug)]
pub struct StreamRelay<R, W> {
    source: R,
    sink: W,
    flush_policy: Arc<dyn FlushPolicy>,
    buffer_size: usize,
    context: Arc<RelayContext>,
    event_tx: Option<mpsc::Sender<CaptureEvent>>,
}

impl<R: ByteSource, W: ByteSink> StreamRelay<R, W> {
    pub fn new(src: StreamSource, source: R, sink: W) -> Self {
        Self {
            source,
            sink,
            flush_policy: Arc::new(NeverFlush),
            buffer_size: DEFAULT_BUFFER_SIZE,
            context: Arc::new(RelayContext::new(src)),
            event_tx: None,
        }
    }

    pub fn flush_policy(mut self, policy: Arc<dyn FlushPolicy>) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Sets the transfer buffer size; values below 1 are raised to 1.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn event_sender(mut self, tx: mpsc::Sender<CaptureEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn src(&self) -> StreamSource {
        self.context.src
    }

    /// A monitor that stays valid after the relay is consumed.
    pub fn monitor(&self) -> RelayMonitor {
        RelayMonitor::new(self.context.clone())
    }

    /// Runs the relay on the current thread and returns the closed sink.
    pub fn run(self) -> W {
        let StreamRelay {
            mut source,
            mut sink,
            flush_policy,
            buffer_size,
            context,
            event_tx,
        } = self;
        let src = context.src;

        context.set_state(RelayState::Running);
        #[cfg(feature = "tracing")]
        tracing::debug!(stream = %src, buffer_size, "Relay started");
        emit(&event_tx, CaptureEvent::RelayStarted { src });

        let reason = Self::pump(
            &mut source,
            &mut sink,
            flush_policy.as_ref(),
            buffer_size,
            &context,
        );

        context.set_state(RelayState::Draining);
        #[cfg(feature = "tracing")]
        match &reason {
            RelayStopReason::EndOfStream => tracing::debug!(stream = %src, "Relay reached end of stream"),
            RelayStopReason::Fault(fault) => tracing::debug!(stream = %src, %fault, "Relay stopped on fault"),
        }

        if let Err(_e) = source.close() {
            #[cfg(feature = "tracing")]
            tracing::warn!(stream = %src, error = %_e, "Failed to close relay source");
        }
        drop(source);
        if let Err(_e) = sink.close() {
            #[cfg(feature = "tracing")]
            tracing::warn!(stream = %src, error = %_e, "Failed to close relay sink");
        }

        context.set_stop_reason(reason.clone());
        context.set_state(RelayState::Closed);
        emit(
            &event_tx,
            CaptureEvent::RelayClosed {
                src,
                bytes: context.get_bytes(),
                iterations: context.get_iterations(),
                reason,
            },
        );
        sink
    }

    /// Copy loop; returns why it stopped.
    fn pump(
        source: &mut R,
        sink: &mut W,
        policy: &dyn FlushPolicy,
        buffer_size: usize,
        context: &RelayContext,
    ) -> RelayStopReason {
        let mut buffer = vec![0u8; buffer_size];
        let mut bytes_since_flush: u64 = 0;
        loop {
            let n = match source.read(&mut buffer) {
                Ok(0) => return RelayStopReason::EndOfStream,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return RelayStopReason::Fault(RelayFault::Read(e.to_string())),
            };

            if let Err(e) = sink.write_all(&buffer[..n]) {
                return RelayStopReason::Fault(RelayFault::Write(e.to_string()));
            }
            let (total_bytes, iterations) = context.record_chunk(n);
            bytes_since_flush += n as u64;
            #[cfg(feature = "tracing")]
            tracing::trace!(stream = %context.src, chunk = n, total_bytes, "Relayed chunk");

            let flush_ctx = FlushContext {
                chunk_len: n,
                total_bytes,
                iterations,
                bytes_since_flush,
            };
            if policy.should_flush(&flush_ctx) {
                if let Err(e) = sink.flush() {
                    return RelayStopReason::Fault(RelayFault::Flush(e.to_string()));
                }
                bytes_since_flush = 0;
            }
        }
    }
}

impl<R, W> StreamRelay<R, W>
where
    R: ByteSource + 'static,
    W: ByteSink + 'static,
{
    /// Starts the relay on its own named thread.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Thread`] if the OS refuses to create the thread.
    pub fn spawn(self) -> Result<RelayHandle<W>, CaptureError> {
        let src = self.src();
        let monitor = self.monitor();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("tcrm-relay-{}", src))
            .spawn(move || {
                let _span = enter_thread_span("relay", Some(src));
                let sink = self.run();
                // Nobody may be waiting on a bounded join
                let _ = done_tx.send(());
                sink
            })
            .map_err(|e| {
                #[cfg(feature = "tracing")]
                tracing::error!(stream = %src, error = %e, "Failed to spawn relay thread");
                CaptureError::Thread(format!("Failed to spawn {} relay thread: {}", src, e))
            })?;

        Ok(RelayHandle {
            handle,
            done_rx,
            monitor,
        })
    }
}

use std::{
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    capture::{
        error::CaptureError,
        event::{CaptureEvent, emit},
        relay::RelayMonitor,
    },
    helper::tracing::enter_thread_span,
};

/// Periodically samples relay counters on a background thread
///
/// Observability only: the sampler reads the relays' atomic counters and never
/// influences their control flow. It exits on [`stop`](Self::stop), when the
/// sampler is dropped, or once every monitored relay is closed.
///
/// # Examples
///
/// ```rust
/// use std::{sync::mpsc, time::Duration};
/// use tcrm_capture::capture::{
///     config::StreamSource, io::MemorySink, relay::StreamRelay, sampler::ThroughputSampler,
/// };
///
/// let relay = StreamRelay::new(StreamSource::Stdout, &b"data"[..], MemorySink::new());
/// let (tx, rx) = mpsc::channel();
/// let sampler =
///     ThroughputSampler::start(vec![relay.monitor()], Duration::from_millis(5), Some(tx)).unwrap();
///
/// relay.run();
/// sampler.stop().unwrap();
/// drop(rx);
/// ```
#[derive(Debug)]
pub struct ThroughputSampler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ThroughputSampler {
    /// Spawns the sampler thread.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Thread`] if the thread cannot be created.
    pub fn start(
        monitors: Vec<RelayMonitor>,
        interval: Duration,
        event_tx: Option<Sender<CaptureEvent>>,
    ) -> Result<Self, CaptureError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("tcrm-relay-sampler".to_string())
            .spawn(move || {
                let _span = enter_thread_span("sampler", None);
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    for monitor in &monitors {
                        emit(&event_tx, Self::sample(monitor));
                    }
                    if monitors.iter().all(RelayMonitor::is_closed) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("All sampled relays closed, sampler exiting");
                        break;
                    }
                }
            })
            .map_err(|e| CaptureError::Thread(format!("Failed to spawn sampler thread: {}", e)))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Reads one sample from `monitor` and logs it.
    pub fn sample(monitor: &RelayMonitor) -> CaptureEvent {
        let src = monitor.src();
        let bytes = monitor.bytes();
        let iterations = monitor.iterations();
        let average_chunk = if iterations == 0 { 0 } else { bytes / iterations };
        #[cfg(feature = "tracing")]
        tracing::debug!(stream = %src, bytes, iterations, average_chunk, "Relay throughput");
        CaptureEvent::Sample {
            src,
            bytes,
            iterations,
            average_chunk,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signals the sampler thread to exit and joins it.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Thread`] if the sampler thread panicked.
    pub fn stop(mut self) -> Result<(), CaptureError> {
        if let Some(tx) = self.stop_tx.take() {
            // Already gone if the sampler exited on its own
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| CaptureError::Thread("sampler thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for ThroughputSampler {
    fn drop(&mut self) {
        // Disconnecting the stop channel wakes the thread; it is not joined here
        self.stop_tx.take();
    }
}

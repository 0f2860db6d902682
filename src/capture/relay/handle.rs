use std::{
    any::Any,
    sync::mpsc::{Receiver, RecvTimeoutError},
    thread::JoinHandle,
    time::Duration,
};

use crate::capture::{config::StreamSource, error::CaptureError, relay::monitor::RelayMonitor};

/// Owner of a spawned relay thread
///
/// Dropping the handle without joining detaches the thread; it still closes
/// its source and sink when it reaches end-of-stream.
#[derive(Debug)]
pub struct RelayHandle<W> {
    pub(crate) handle: JoinHandle<W>,
    pub(crate) done_rx: Receiver<()>,
    pub(crate) monitor: RelayMonitor,
}

/// Result of a bounded join
#[derive(Debug)]
pub enum JoinOutcome<W> {
    /// The relay finished and handed its sink back
    Joined(W),
    /// The relay is still running; the handle can be joined again or dropped
    TimedOut(RelayHandle<W>),
}

impl<W> RelayHandle<W> {
    pub fn src(&self) -> StreamSource {
        self.monitor.src()
    }

    pub fn monitor(&self) -> &RelayMonitor {
        &self.monitor
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the relay thread exits and returns its closed sink.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Thread`] if the relay thread panicked.
    pub fn join(self) -> Result<W, CaptureError> {
        let src = self.src();
        self.handle
            .join()
            .map_err(|payload| relay_panicked(src, payload))
    }

    /// Waits at most `timeout` for the relay to finish.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Thread`] if the relay thread panicked.
    pub fn join_timeout(self, timeout: Duration) -> Result<JoinOutcome<W>, CaptureError> {
        match self.done_rx.recv_timeout(timeout) {
            // Disconnected means the thread unwound before signalling
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.join().map(JoinOutcome::Joined),
            Err(RecvTimeoutError::Timeout) => Ok(JoinOutcome::TimedOut(self)),
        }
    }
}

fn relay_panicked(src: StreamSource, payload: Box<dyn Any + Send>) -> CaptureError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    CaptureError::Thread(format!("{} relay thread panicked: {}", src, detail))
}

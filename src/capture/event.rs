use std::sync::mpsc::Sender;

use crate::capture::{config::StreamSource, error::RelayFault, process::ProcessExit};

/// Events emitted while a capture runs
///
/// Events are delivered on an optional `std::sync::mpsc::Sender`. They are
/// purely informational: a dropped receiver never affects the capture.
///
/// # Event Flow
///
/// 1. `RelayStarted` - once per stream, before the process is waited on
/// 2. `Sample` - periodically, only when a sample interval is configured
/// 3. `ProcessExited` - the process has terminated
/// 4. `RelayClosed` - once per stream, after source and sink are closed
///
/// `RelayClosed` may arrive before `ProcessExited` when a stream hits EOF early.
///
/// # Examples
///
/// ```rust
/// use std::sync::mpsc;
/// use tcrm_capture::capture::{
///     config::StreamSource,
///     event::{CaptureEvent, RelayStopReason},
///     io::MemorySink,
///     relay::StreamRelay,
/// };
///
/// let (tx, rx) = mpsc::channel();
/// let relay = StreamRelay::new(StreamSource::Stdout, &b"hi"[..], MemorySink::new())
///     .event_sender(tx);
/// relay.run();
///
/// let events: Vec<CaptureEvent> = rx.try_iter().collect();
/// assert!(matches!(
///     events.last(),
///     Some(CaptureEvent::RelayClosed { bytes: 2, reason: RelayStopReason::EndOfStream, .. })
/// ));
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A relay thread started reading its source
    RelayStarted { src: StreamSource },

    /// A relay reached its terminal state
    RelayClosed {
        src: StreamSource,
        /// Total bytes written to the sink
        bytes: u64,
        /// Number of successful read/write iterations
        iterations: u64,
        reason: RelayStopReason,
    },

    /// The process reported termination
    ProcessExited { exit: ProcessExit },

    /// Periodic throughput sample from the sampler thread
    Sample {
        src: StreamSource,
        bytes: u64,
        iterations: u64,
        /// Average bytes per iteration, 0 before the first chunk
        average_chunk: u64,
    },
}

/// Why a relay stopped copying
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum RelayStopReason {
    /// The source reported a clean end-of-stream
    EndOfStream,

    /// A read, write or flush failed
    Fault(RelayFault),
}

impl RelayStopReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, RelayStopReason::Fault(_))
    }
}

/// Sends `event` if a channel is attached; a gone receiver is not an error.
pub(crate) fn emit(event_tx: &Option<Sender<CaptureEvent>>, event: CaptureEvent) {
    let Some(tx) = event_tx else {
        return;
    };
    if tx.send(event).is_err() {
        #[cfg(feature = "tracing")]
        tracing::warn!("Event channel closed while sending CaptureEvent");
    }
}

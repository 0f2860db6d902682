use std::io;

use thiserror::Error;

use crate::capture::config::StreamSource;

/// Errors surfaced to callers of a capture
///
/// Low-level stream faults never show up here; they are absorbed by the relay
/// and recorded as a [`RelayFault`] in its report.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    IO(String),

    #[error("Thread error: {0}")]
    Thread(String),

    #[error("Process {0} is not piped or was already taken")]
    MissingStream(StreamSource),

    #[error("Failed to wait for process: {0}")]
    Wait(String),

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Capture timed out")]
    Timeout,

    #[error("{cause} ({detached} relay thread(s) detached)")]
    Detached {
        detached: usize,
        cause: Box<CaptureError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<io::Error> for CaptureError {
    fn from(err: io::Error) -> Self {
        CaptureError::IO(err.to_string())
    }
}

/// An I/O fault recorded by a relay
///
/// The relay stops on the first fault and closes its resources; the fault is
/// only visible through the relay's report and `RelayClosed` event.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayFault {
    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("flush failed: {0}")]
    Flush(String),
}

use std::{sync::Arc, time::SystemTime};

use crate::capture::{
    config::StreamSource, event::RelayStopReason, relay::context::RelayContext, state::RelayState,
};

/// Read-only, thread-safe view of a running relay
///
/// Cheap to clone; every accessor is an atomic load, so a monitor can be polled
/// from any thread while the relay is copying.
#[derive(Debug, Clone)]
pub struct RelayMonitor {
    pub(crate) context: Arc<RelayContext>,
}

impl RelayMonitor {
    pub(crate) fn new(context: Arc<RelayContext>) -> Self {
        Self { context }
    }

    pub fn src(&self) -> StreamSource {
        self.context.src
    }

    pub fn state(&self) -> RelayState {
        self.context.get_state()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    pub fn bytes(&self) -> u64 {
        self.context.get_bytes()
    }

    pub fn iterations(&self) -> u64 {
        self.context.get_iterations()
    }

    /// Average bytes moved per read iteration, 0 before the first chunk.
    pub fn average_chunk(&self) -> u64 {
        let iterations = self.iterations();
        if iterations == 0 {
            0
        } else {
            self.bytes() / iterations
        }
    }

    /// Set when the relay reaches [`RelayState::Closed`].
    pub fn stop_reason(&self) -> Option<RelayStopReason> {
        self.context.get_stop_reason()
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.context.get_started_at()
    }

    pub fn finished_at(&self) -> Option<SystemTime> {
        self.context.get_finished_at()
    }

    pub fn report(&self) -> RelayReport {
        RelayReport {
            src: self.src(),
            state: self.state(),
            bytes: self.bytes(),
            iterations: self.iterations(),
            stop_reason: self.stop_reason(),
            started_at: self.started_at(),
            finished_at: self.finished_at(),
        }
    }
}

/// Snapshot of a relay's counters and outcome
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReport {
    pub src: StreamSource,
    pub state: RelayState,
    pub bytes: u64,
    pub iterations: u64,
    pub stop_reason: Option<RelayStopReason>,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
}

impl RelayReport {
    /// True when the relay stopped on a read, write or flush failure.
    pub fn is_fault(&self) -> bool {
        self.stop_reason
            .as_ref()
            .is_some_and(RelayStopReason::is_fault)
    }
}

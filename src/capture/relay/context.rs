use std::{
    sync::{
        Mutex,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use crate::capture::{config::StreamSource, event::RelayStopReason, state::RelayState};

/// State shared between a relay thread and its monitors
///
/// Only the relay thread writes; monitors and the sampler read. Counters and
/// timestamps are atomics so a reader never blocks the relay.
#[derive(Debug)]
pub(crate) struct RelayContext {
    pub(crate) src: StreamSource,
    state: AtomicU8,
    bytes: AtomicU64,
    iterations: AtomicU64,
    started_at: AtomicU64,
    finished_at: AtomicU64,
    stop_reason: Mutex<Option<RelayStopReason>>,
}

impl RelayContext {
    pub(crate) fn new(src: StreamSource) -> Self {
        Self {
            src,
            state: AtomicU8::new(RelayState::Created as u8),
            bytes: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            started_at: AtomicU64::new(0),
            finished_at: AtomicU64::new(0),
            stop_reason: Mutex::new(None),
        }
    }

    pub(crate) fn get_state(&self) -> RelayState {
        self.state.load(Ordering::SeqCst).into()
    }

    /// Moves the relay to `new_state` and stamps the matching timestamp.
    pub(crate) fn set_state(&self, new_state: RelayState) {
        self.state.store(new_state as u8, Ordering::SeqCst);
        match new_state {
            RelayState::Running => Self::set_time(&self.started_at),
            RelayState::Closed => Self::set_time(&self.finished_at),
            _ => {}
        }
    }

    /// Adds one chunk to the counters and returns the new `(bytes, iterations)`.
    pub(crate) fn record_chunk(&self, len: usize) -> (u64, u64) {
        let len = len as u64;
        let bytes = self.bytes.fetch_add(len, Ordering::SeqCst) + len;
        let iterations = self.iterations.fetch_add(1, Ordering::SeqCst) + 1;
        (bytes, iterations)
    }

    pub(crate) fn get_bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    pub(crate) fn get_iterations(&self) -> u64 {
        self.iterations.load(Ordering::SeqCst)
    }

    pub(crate) fn get_stop_reason(&self) -> Option<RelayStopReason> {
        self.stop_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_stop_reason(&self, reason: RelayStopReason) {
        let mut guard = self
            .stop_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(reason);
    }

    pub(crate) fn get_started_at(&self) -> Option<SystemTime> {
        Self::get_time(&self.started_at)
    }

    pub(crate) fn get_finished_at(&self) -> Option<SystemTime> {
        Self::get_time(&self.finished_at)
    }

    fn get_time(store: &AtomicU64) -> Option<SystemTime> {
        let nanos = store.load(Ordering::SeqCst);
        if nanos == 0 {
            None
        } else {
            Some(UNIX_EPOCH + std::time::Duration::from_nanos(nanos))
        }
    }

    fn set_time(store: &AtomicU64) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        store.store(nanos, Ordering::SeqCst);
    }
}

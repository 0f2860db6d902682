/// Lifecycle of a stream relay
///
/// Transitions only move forward:
/// `Created` → `Running` → `Draining` → `Closed`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Constructed, thread not started yet
    Created = 0,
    /// Copying bytes from source to sink
    Running = 1,
    /// Hit end-of-stream or a fault, closing source and sink
    Draining = 2,
    /// Both resources closed, counters frozen
    Closed = 3,
}

impl RelayState {
    pub fn is_closed(&self) -> bool {
        matches!(self, RelayState::Closed)
    }
}

impl From<u8> for RelayState {
    fn from(value: u8) -> Self {
        match value {
            0 => RelayState::Created,
            1 => RelayState::Running,
            2 => RelayState::Draining,
            _ => RelayState::Closed,
        }
    }
}

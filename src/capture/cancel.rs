use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag that cancels a capture's wait for process termination
///
/// Clones share the same flag. Once cancelled, a token stays cancelled.
///
/// # Examples
///
/// ```rust
/// use tcrm_capture::capture::cancel::CancelToken;
///
/// let token = CancelToken::new();
/// let remote = token.clone();
/// remote.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

use std::fmt::Debug;

/// Write statistics handed to a [`FlushPolicy`] after each successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushContext {
    /// Length of the chunk that was just written
    pub chunk_len: usize,
    /// Total bytes written by the relay, including this chunk
    pub total_bytes: u64,
    /// Total write iterations, including this one
    pub iterations: u64,
    /// Bytes written since the sink was last flushed, including this chunk
    pub bytes_since_flush: u64,
}

/// Decides whether a relay flushes its sink after a write
///
/// Called once per successful write, after the write and before the next read,
/// on the relay's own thread. Implementations must not block or panic.
///
/// A policy may be shared by several relays through an `Arc`, so it must be
/// `Sync`; any internal counters need their own synchronization. The built-in
/// policies are stateless because [`FlushContext`] already carries the
/// per-relay counts.
///
/// # Examples
///
/// ```rust
/// use tcrm_capture::capture::flush::{FlushContext, FlushPolicy};
///
/// /// Flushes after short chunks, which are usually interactive output.
/// #[derive(Debug)]
/// struct SmallChunks;
///
/// impl FlushPolicy for SmallChunks {
///     fn should_flush(&self, ctx: &FlushContext) -> bool {
///         ctx.chunk_len < 64
///     }
/// }
///
/// let ctx = FlushContext { chunk_len: 6, ..Default::default() };
/// assert!(SmallChunks.should_flush(&ctx));
/// ```
pub trait FlushPolicy: Send + Sync + Debug {
    fn should_flush(&self, ctx: &FlushContext) -> bool;
}

/// Never flushes; visibility is governed by the sink's own buffering and close
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFlush;

impl FlushPolicy for NeverFlush {
    fn should_flush(&self, _ctx: &FlushContext) -> bool {
        false
    }
}

/// Flushes after every chunk
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFlush;

impl FlushPolicy for AlwaysFlush {
    fn should_flush(&self, _ctx: &FlushContext) -> bool {
        true
    }
}

/// Flushes once at least `threshold` bytes accumulated since the last flush
#[derive(Debug, Clone, Copy)]
pub struct FlushEveryBytes {
    threshold: u64,
}

impl FlushEveryBytes {
    /// A threshold of 0 behaves like [`AlwaysFlush`].
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

impl FlushPolicy for FlushEveryBytes {
    fn should_flush(&self, ctx: &FlushContext) -> bool {
        ctx.bytes_since_flush >= self.threshold
    }
}

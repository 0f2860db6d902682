use std::{fmt, sync::Arc, time::Duration};

use crate::capture::{
    error::CaptureError,
    flush::{AlwaysFlush, FlushEveryBytes, FlushPolicy, NeverFlush},
};

/// Default relay chunk size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
/// Default period between `try_wait` polls when a cancel token is attached.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
/// Default budget for joining relays after a cancelled or failed wait.
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1000;

/// Configuration for a single capture call
///
/// All fields are optional; unset fields fall back to the `DEFAULT_*` constants
/// of this module. Use the builder methods and call [`CaptureConfig::validate`]
/// before handing the config to a [`ProcessOutputCapture`](crate::capture::coordinator::ProcessOutputCapture).
///
/// # Examples
///
/// ```rust
/// use tcrm_capture::capture::config::{CaptureConfig, FlushMode};
///
/// let config = CaptureConfig::new()
///     .buffer_size(4096)
///     .stdout_flush(FlushMode::Always)
///     .join_timeout_ms(500);
///
/// assert!(config.validate().is_ok());
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Size of each relay's transfer buffer
    pub buffer_size: Option<usize>,

    /// Flush policy for the stdout sink
    pub stdout_flush: Option<FlushMode>,

    /// Flush policy for the stderr sink
    pub stderr_flush: Option<FlushMode>,

    /// Period between `try_wait` polls while a cancel token is attached
    pub poll_interval_ms: Option<u64>,

    /// Total time allowed to join both relays after a cancelled or failed wait
    pub join_timeout_ms: Option<u64>,

    /// Enables the throughput sampler with this period
    pub sample_interval_ms: Option<u64>,

    /// Maximum wait used by the async front-end
    pub timeout_ms: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            buffer_size: Some(DEFAULT_BUFFER_SIZE),
            stdout_flush: Some(FlushMode::Never),
            stderr_flush: Some(FlushMode::Never),
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
            join_timeout_ms: Some(DEFAULT_JOIN_TIMEOUT_MS),
            sample_interval_ms: None,
            timeout_ms: None,
        }
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn stdout_flush(mut self, mode: FlushMode) -> Self {
        self.stdout_flush = Some(mode);
        self
    }

    pub fn stderr_flush(mut self, mode: FlushMode) -> Self {
        self.stderr_flush = Some(mode);
        self
    }

    /// Sets the same flush policy for both streams.
    pub fn flush(self, mode: FlushMode) -> Self {
        self.stdout_flush(mode).stderr_flush(mode)
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = Some(ms);
        self
    }

    pub fn join_timeout_ms(mut self, ms: u64) -> Self {
        self.join_timeout_ms = Some(ms);
        self
    }

    pub fn sample_interval_ms(mut self, ms: u64) -> Self {
        self.sample_interval_ms = Some(ms);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub(crate) fn effective_buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    pub(crate) fn effective_poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    pub(crate) fn effective_join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms.unwrap_or(DEFAULT_JOIN_TIMEOUT_MS))
    }

    pub(crate) fn flush_policy(&self, src: StreamSource) -> Arc<dyn FlushPolicy> {
        let mode = match src {
            StreamSource::Stdout => self.stdout_flush,
            StreamSource::Stderr => self.stderr_flush,
        };
        mode.unwrap_or_default().into_policy()
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidConfiguration`] if any configured size,
    /// interval or timeout is zero.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.buffer_size == Some(0) {
            return Err(CaptureError::InvalidConfiguration(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        for (name, mode) in [("stdout", self.stdout_flush), ("stderr", self.stderr_flush)] {
            if mode == Some(FlushMode::EveryBytes(0)) {
                return Err(CaptureError::InvalidConfiguration(format!(
                    "Flush threshold for {} must be greater than 0",
                    name
                )));
            }
        }

        let intervals = [
            ("Poll interval", self.poll_interval_ms),
            ("Join timeout", self.join_timeout_ms),
            ("Sample interval", self.sample_interval_ms),
            ("Timeout", self.timeout_ms),
        ];
        for (name, value) in intervals {
            if value == Some(0) {
                return Err(CaptureError::InvalidConfiguration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Serializable choice of flush policy
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Leave flushing to the sink's own buffering and close
    #[default]
    Never,
    /// Flush after every chunk
    Always,
    /// Flush once at least this many bytes were written since the last flush
    EveryBytes(u64),
}

impl FlushMode {
    pub fn into_policy(self) -> Arc<dyn FlushPolicy> {
        match self {
            FlushMode::Never => Arc::new(NeverFlush),
            FlushMode::Always => Arc::new(AlwaysFlush),
            FlushMode::EveryBytes(threshold) => Arc::new(FlushEveryBytes::new(threshold)),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamSource {
    #[default]
    Stdout = 0,
    Stderr = 1,
}

impl StreamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamSource::Stdout => "stdout",
            StreamSource::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

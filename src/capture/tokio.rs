use std::time::Duration;

use futures::future::pending;
use tokio::{
    sync::oneshot,
    task::{JoinError, spawn_blocking},
};

use crate::{
    capture::{
        coordinator::{CaptureOutput, ProcessOutputCapture},
        error::CaptureError,
        io::ByteSink,
        process::ProcessHandle,
    },
    helper::tracing::MaybeInstrument,
};

/// Result of [`ProcessOutputCapture::capture_async`]
///
/// The process handle is handed back so the caller can still act on it, for
/// example to kill a process whose capture timed out. It is `None` only if the
/// blocking capture task itself was lost.
#[derive(Debug)]
pub struct AsyncCapture<P, O, E> {
    pub process: Option<P>,
    pub result: Result<CaptureOutput<O, E>, CaptureError>,
}

impl ProcessOutputCapture {
    /// Runs [`capture`](ProcessOutputCapture::capture) on tokio's blocking pool
    /// and bounds it with `timeout_ms` and an optional cancel signal.
    ///
    /// When the timeout elapses or `cancel_rx` fires, the capture's cancel
    /// token is triggered and the blocking capture performs its bounded join
    /// before the result is reported as [`CaptureError::Timeout`] or
    /// [`CaptureError::Cancelled`]. If a token was attached with
    /// [`cancel_token`](ProcessOutputCapture::cancel_token) it is reused and
    /// cancelled as well.
    ///
    /// A dropped `cancel_rx` sender is not a cancellation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::process::{Command, Stdio};
    /// use tcrm_capture::capture::{
    ///     config::CaptureConfig, coordinator::ProcessOutputCapture, io::MemorySink,
    /// };
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     #[cfg(unix)]
    ///     let child = Command::new("sh").args(["-c", "echo hello"])
    ///         .stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    ///     #[cfg(windows)]
    ///     let child = Command::new("cmd").args(["/C", "echo hello"])
    ///         .stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    ///
    ///     let capture = ProcessOutputCapture::new(CaptureConfig::new().timeout_ms(5000));
    ///     let outcome = capture
    ///         .capture_async(child, MemorySink::new(), MemorySink::new(), None)
    ///         .await;
    ///
    ///     let output = outcome.result?;
    ///     assert!(output.success());
    ///     Ok(())
    /// }
    /// ```
    pub async fn capture_async<P, O, E>(
        &self,
        process: P,
        stdout_sink: O,
        stderr_sink: E,
        cancel_rx: Option<oneshot::Receiver<()>>,
    ) -> AsyncCapture<P, O, E>
    where
        P: ProcessHandle + Send + 'static,
        O: ByteSink + 'static,
        E: ByteSink + 'static,
    {
        let token = self.cancel.clone().unwrap_or_default();
        let capture = self.clone().cancel_token(token.clone());
        let timeout_ms = self.config.timeout_ms;

        async move {
            let mut task = spawn_blocking(move || {
                let mut process = process;
                let result = capture.capture(&mut process, stdout_sink, stderr_sink);
                (process, result)
            });

            let interrupt = tokio::select! {
                joined = &mut task => return Self::finish(joined, None),
                _ = Self::timeout_from_config(timeout_ms) => CaptureError::Timeout,
                _ = Self::cancel_signal(cancel_rx) => CaptureError::Cancelled,
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(reason = %interrupt, "Interrupting blocking capture");
            token.cancel();
            Self::finish(task.await, Some(interrupt))
        }
        .maybe_instrument("capture_async")
        .await
    }

    /// Sleeps for the configured timeout, or never completes without one.
    async fn timeout_from_config(timeout_ms: Option<u64>) {
        match timeout_ms {
            Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            None => pending::<()>().await,
        }
    }

    async fn cancel_signal(cancel_rx: Option<oneshot::Receiver<()>>) {
        match cancel_rx {
            Some(rx) => {
                if rx.await.is_err() {
                    pending::<()>().await;
                }
            }
            None => pending::<()>().await,
        }
    }

    fn finish<P, O, E>(
        joined: Result<(P, Result<CaptureOutput<O, E>, CaptureError>), JoinError>,
        interrupt: Option<CaptureError>,
    ) -> AsyncCapture<P, O, E> {
        match joined {
            Ok((process, result)) => AsyncCapture {
                process: Some(process),
                result: Self::attribute_interrupt(result, interrupt),
            },
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "Blocking capture task failed");
                AsyncCapture {
                    process: None,
                    result: Err(CaptureError::Thread(format!("Capture task failed: {}", e))),
                }
            }
        }
    }

    /// Replaces the token-level `Cancelled` with what actually interrupted the wait.
    fn attribute_interrupt<O, E>(
        result: Result<CaptureOutput<O, E>, CaptureError>,
        interrupt: Option<CaptureError>,
    ) -> Result<CaptureOutput<O, E>, CaptureError> {
        let Some(interrupt) = interrupt else {
            return result;
        };
        match result {
            Err(CaptureError::Cancelled) => Err(interrupt),
            Err(CaptureError::Detached { detached, cause }) if *cause == CaptureError::Cancelled => {
                Err(CaptureError::Detached {
                    detached,
                    cause: Box::new(interrupt),
                })
            }
            other => other,
        }
    }
}

use std::{
    process::Child,
    sync::mpsc::Sender,
    thread,
    time::{Duration, Instant},
};

use crate::capture::{
    cancel::CancelToken,
    config::{CaptureConfig, StreamSource},
    error::CaptureError,
    event::{CaptureEvent, emit},
    io::{ByteSink, ByteSource},
    process::{ProcessExit, ProcessHandle},
    relay::{JoinOutcome, RelayHandle, RelayReport, StreamRelay},
    sampler::ThroughputSampler,
};

/// Everything a finished capture hands back
///
/// Only produced after both relay threads were joined, so the sinks hold the
/// process's entire output, or as much as the relays could move before a fault.
#[derive(Debug)]
pub struct CaptureOutput<O, E> {
    pub exit: ProcessExit,
    pub stdout: O,
    pub stderr: E,
    pub stdout_report: RelayReport,
    pub stderr_report: RelayReport,
}

impl<O, E> CaptureOutput<O, E> {
    pub fn success(&self) -> bool {
        self.exit.success()
    }

    /// True when neither relay stopped on a fault.
    pub fn is_complete(&self) -> bool {
        !self.stdout_report.is_fault() && !self.stderr_report.is_fault()
    }
}

/// Captures a process's stdout and stderr without risking a pipe deadlock
///
/// Both output channels are drained by their own [`StreamRelay`] thread, which is
/// started before the process is waited on. The exit status is returned only
/// after both relay threads have been joined.
///
/// # Examples
///
/// ```rust
/// use std::process::{Command, Stdio};
/// use tcrm_capture::capture::{config::CaptureConfig, coordinator::ProcessOutputCapture};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #[cfg(unix)]
/// let mut cmd = Command::new("sh");
/// #[cfg(unix)]
/// cmd.args(["-c", "echo hello"]);
/// #[cfg(windows)]
/// let mut cmd = Command::new("cmd");
/// #[cfg(windows)]
/// cmd.args(["/C", "echo hello"]);
///
/// let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
///
/// let capture = ProcessOutputCapture::new(CaptureConfig::default());
/// let output = capture.capture_child(&mut child)?;
///
/// assert!(output.success());
/// assert!(String::from_utf8_lossy(&output.stdout).starts_with("hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProcessOutputCapture {
    pub(crate) config: CaptureConfig,
    pub(crate) cancel: Option<CancelToken>,
    pub(crate) event_tx: Option<Sender<CaptureEvent>>,
}

impl ProcessOutputCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            cancel: None,
            event_tx: None,
        }
    }

    /// Makes the wait for termination cancellable through `token`.
    ///
    /// With a token attached the process is polled with `try_wait` every
    /// `poll_interval_ms` instead of blocking in `wait`.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn event_sender(mut self, tx: Sender<CaptureEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Captures both output channels of `process` into the given sinks.
    ///
    /// Relay faults (read, write or flush failures) are not errors here: the
    /// partially filled sink is returned with the real exit status and the fault
    /// is recorded in the matching [`RelayReport`].
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidConfiguration`] if the config fails validation
    /// - [`CaptureError::MissingStream`] if stdout or stderr is not piped; no
    ///   thread is started in that case
    /// - [`CaptureError::Thread`] if a relay thread cannot be spawned or panicked
    /// - [`CaptureError::Wait`] or [`CaptureError::Cancelled`] if waiting for the
    ///   process failed or was cancelled, after a bounded join of both relays;
    ///   wrapped in [`CaptureError::Detached`] when a relay had to be abandoned.
    ///   A relay panic found during that join is returned instead of the cause
    ///   when nothing was detached.
    /// - [`CaptureError::Cancelled`] (or `Detached`) if the token fires after the
    ///   process exited while a relay is still blocked, for example because a
    ///   grandchild inherited the pipe. Without a token that join is unbounded.
    pub fn capture<P, O, E>(
        &self,
        process: &mut P,
        stdout_sink: O,
        stderr_sink: E,
    ) -> Result<CaptureOutput<O, E>, CaptureError>
    where
        P: ProcessHandle + ?Sized,
        O: ByteSink + 'static,
        E: ByteSink + 'static,
    {
        self.config.validate()?;

        let stdout = process
            .take_stdout()
            .ok_or(CaptureError::MissingStream(StreamSource::Stdout))?;
        let Some(stderr) = process.take_stderr() else {
            process.restore_stdout(stdout);
            return Err(CaptureError::MissingStream(StreamSource::Stderr));
        };

        // Both relays must be draining before the wait, or a chatty child fills
        // its pipe and never exits.
        let stdout_relay = self.spawn_relay(StreamSource::Stdout, stdout, stdout_sink)?;
        let stderr_relay = match self.spawn_relay(StreamSource::Stderr, stderr, stderr_sink) {
            Ok(relay) => relay,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Detaching stdout relay after stderr relay failed to spawn");
                drop(stdout_relay);
                return Err(e);
            }
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(pid = ?process.id(), "Relays started, waiting for process");

        let sampler = self.start_sampler(&stdout_relay, &stderr_relay);

        let exit = match self.wait_for_exit(process) {
            Ok(exit) => exit,
            Err(cause) => {
                let err = self.abandon(process, cause, Some(stdout_relay), Some(stderr_relay), None);
                Self::stop_sampler(sampler);
                return Err(err);
            }
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(code = ?exit.code, signal = ?exit.signal, "Process exited");
        emit(&self.event_tx, CaptureEvent::ProcessExited { exit });

        // An exited process may have left its pipes to a child that is still alive
        let stdout_monitor = stdout_relay.monitor().clone();
        let stderr_monitor = stderr_relay.monitor().clone();
        let stdout = match self.join_after_exit(stdout_relay) {
            Ok(JoinOutcome::Joined(sink)) => Ok(sink),
            Ok(JoinOutcome::TimedOut(relay)) => {
                let err = self.abandon(
                    process,
                    CaptureError::Cancelled,
                    Some(relay),
                    Some(stderr_relay),
                    None,
                );
                Self::stop_sampler(sampler);
                return Err(err);
            }
            Err(e) => Err(e),
        };
        let stderr = match self.join_after_exit(stderr_relay) {
            Ok(JoinOutcome::Joined(sink)) => Ok(sink),
            Ok(JoinOutcome::TimedOut(relay)) => {
                let err = self.abandon(
                    process,
                    CaptureError::Cancelled,
                    None::<RelayHandle<O>>,
                    Some(relay),
                    stdout.err(),
                );
                Self::stop_sampler(sampler);
                return Err(err);
            }
            Err(e) => Err(e),
        };
        Self::stop_sampler(sampler);

        Ok(CaptureOutput {
            exit,
            stdout: stdout?,
            stderr: stderr?,
            stdout_report: stdout_monitor.report(),
            stderr_report: stderr_monitor.report(),
        })
    }

    /// Captures a [`Child`] into two in-memory buffers.
    ///
    /// # Errors
    ///
    /// Same as [`capture`](Self::capture).
    pub fn capture_child(
        &self,
        child: &mut Child,
    ) -> Result<CaptureOutput<Vec<u8>, Vec<u8>>, CaptureError> {
        self.capture(child, Vec::new(), Vec::new())
    }

    fn spawn_relay<R, W>(
        &self,
        src: StreamSource,
        source: R,
        sink: W,
    ) -> Result<RelayHandle<W>, CaptureError>
    where
        R: ByteSource + 'static,
        W: ByteSink + 'static,
    {
        let mut relay = StreamRelay::new(src, source, sink)
            .flush_policy(self.config.flush_policy(src))
            .buffer_size(self.config.effective_buffer_size());
        if let Some(tx) = &self.event_tx {
            relay = relay.event_sender(tx.clone());
        }
        relay.spawn()
    }

    fn start_sampler<O, E>(
        &self,
        stdout_relay: &RelayHandle<O>,
        stderr_relay: &RelayHandle<E>,
    ) -> Option<ThroughputSampler> {
        let interval = self.config.sample_interval_ms?;
        let monitors = vec![stdout_relay.monitor().clone(), stderr_relay.monitor().clone()];
        match ThroughputSampler::start(
            monitors,
            Duration::from_millis(interval),
            self.event_tx.clone(),
        ) {
            Ok(sampler) => Some(sampler),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "Sampler unavailable, continuing without it");
                None
            }
        }
    }

    fn stop_sampler(sampler: Option<ThroughputSampler>) {
        if let Some(sampler) = sampler
            && let Err(_e) = sampler.stop()
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "Sampler did not stop cleanly");
        }
    }

    fn wait_for_exit<P>(&self, process: &mut P) -> Result<ProcessExit, CaptureError>
    where
        P: ProcessHandle + ?Sized,
    {
        let Some(token) = &self.cancel else {
            return process.wait().map_err(|e| {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, "Waiting for process failed");
                CaptureError::Wait(e.to_string())
            });
        };

        let interval = self.config.effective_poll_interval();
        loop {
            match process.try_wait() {
                Ok(Some(exit)) => return Ok(exit),
                Ok(None) => {}
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %e, "Polling process status failed");
                    return Err(CaptureError::Wait(e.to_string()));
                }
            }
            if token.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Wait for process cancelled");
                return Err(CaptureError::Cancelled);
            }
            thread::sleep(interval);
        }
    }

    /// Joins a relay after the process exited.
    ///
    /// Without a cancel token this blocks until the relay finishes. With one,
    /// the join is retried every `poll_interval_ms` and the still running relay
    /// is handed back as `TimedOut` once the token fires.
    fn join_after_exit<W>(&self, mut relay: RelayHandle<W>) -> Result<JoinOutcome<W>, CaptureError> {
        let Some(token) = &self.cancel else {
            return relay.join().map(JoinOutcome::Joined);
        };

        let interval = self.config.effective_poll_interval();
        loop {
            match relay.join_timeout(interval)? {
                JoinOutcome::TimedOut(pending) => {
                    if token.is_cancelled() {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(stream = %pending.src(), "Join after exit cancelled");
                        return Ok(JoinOutcome::TimedOut(pending));
                    }
                    relay = pending;
                }
                joined => return Ok(joined),
            }
        }
    }

    /// Runs the cancel hook and joins the remaining relays within one
    /// `join_timeout_ms` budget.
    ///
    /// The returned error is `Detached` wrapping `cause` when any relay had to be
    /// abandoned, otherwise the first relay panic (`panicked` or one found while
    /// joining), otherwise `cause`.
    fn abandon<P, O, E>(
        &self,
        process: &mut P,
        cause: CaptureError,
        stdout_relay: Option<RelayHandle<O>>,
        stderr_relay: Option<RelayHandle<E>>,
        mut panicked: Option<CaptureError>,
    ) -> CaptureError
    where
        P: ProcessHandle + ?Sized,
    {
        if let Err(_e) = process.on_cancel() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "Cancel hook failed");
        }

        let deadline = Instant::now() + self.config.effective_join_timeout();
        let outcomes = [
            stdout_relay.map(|relay| Self::join_until(relay, deadline)),
            stderr_relay.map(|relay| Self::join_until(relay, deadline)),
        ];
        let mut detached = 0;
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(true) => detached += 1,
                Ok(false) => {}
                Err(e) => {
                    panicked.get_or_insert(e);
                }
            }
        }

        if detached > 0 {
            return CaptureError::Detached {
                detached,
                cause: Box::new(cause),
            };
        }
        panicked.unwrap_or(cause)
    }

    /// Joins `relay` unless `deadline` passes first; `Ok(true)` means it was detached.
    fn join_until<W>(relay: RelayHandle<W>, deadline: Instant) -> Result<bool, CaptureError> {
        let _src = relay.src();
        let remaining = deadline.saturating_duration_since(Instant::now());
        match relay.join_timeout(remaining) {
            Ok(JoinOutcome::Joined(_)) => Ok(false),
            Ok(JoinOutcome::TimedOut(_handle)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(stream = %_src, "Relay did not finish in time, detaching");
                Ok(true)
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(stream = %_src, error = %e, "Relay thread failed during cancel");
                Err(e)
            }
        }
    }
}

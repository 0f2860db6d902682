use std::{
    io,
    process::{Child, ChildStderr, ChildStdout, ExitStatus},
};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

use crate::capture::io::ByteSource;

/// How a process terminated
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessExit {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// Terminating signal on unix, always `None` elsewhere
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = status.signal();
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

/// A running process whose two output channels can be captured
///
/// Implemented for [`std::process::Child`]; spawning and configuring the
/// process stays with the caller. The capture takes each channel exactly once
/// and hands it to a dedicated relay, so nothing else may read them.
pub trait ProcessHandle {
    type Stdout: ByteSource + 'static;
    type Stderr: ByteSource + 'static;

    fn take_stdout(&mut self) -> Option<Self::Stdout>;
    fn take_stderr(&mut self) -> Option<Self::Stderr>;

    /// Puts back a stdout taken by a capture that could not start.
    fn restore_stdout(&mut self, stdout: Self::Stdout);

    /// Blocks until the process terminates.
    fn wait(&mut self) -> io::Result<ProcessExit>;

    /// Returns the exit status if the process has already terminated.
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    fn id(&self) -> Option<u32> {
        None
    }

    /// Called when the wait is cancelled or fails, before relays are joined.
    ///
    /// Implementations that can close their output channels out-of-band should
    /// do so here so blocked relays reach cleanup. The default does nothing.
    fn on_cancel(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ProcessHandle for Child {
    type Stdout = ChildStdout;
    type Stderr = ChildStderr;

    fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    fn restore_stdout(&mut self, stdout: ChildStdout) {
        self.stdout = Some(stdout);
    }

    fn wait(&mut self) -> io::Result<ProcessExit> {
        Child::wait(self).map(ProcessExit::from)
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Child::try_wait(self).map(|status| status.map(ProcessExit::from))
    }

    fn id(&self) -> Option<u32> {
        Some(Child::id(self))
    }
}

//! # tcrm-capture
//!
//! Deadlock-free capture of a child process's stdout and stderr.
//! Built for the TCRM project, where tasks produce arbitrary amounts of output
//! on both streams and the caller needs the complete output together with the
//! exit status.
//!
//! A child that writes more than its OS pipe buffer can hold blocks until
//! somebody reads. If the parent waits for the exit before reading, neither
//! side makes progress. This crate drains both streams on dedicated threads,
//! started before the wait, and joins them before returning.
//!
//! ## Features
//!
//! - **Stream relays**: One thread per output stream, copying bytes into any sink
//! - **Flush policies**: Never, always, or every N bytes, or your own [`FlushPolicy`](capture::flush::FlushPolicy)
//! - **Join guarantee**: Sinks are handed back only after both relay threads exited
//! - **Fault isolation**: A broken sink stops its own relay, never the capture
//! - **Cancellation**: Cancel the wait with a token; relays are joined within a budget
//! - **Throughput sampling**: Optional background sampler over the relays' counters
//!
//! ## Quick Start
//!
//! ```rust
//! use std::process::{Command, Stdio};
//! use tcrm_capture::capture::{config::CaptureConfig, coordinator::ProcessOutputCapture};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(windows)]
//!     let mut cmd = Command::new("cmd");
//!     #[cfg(windows)]
//!     cmd.args(["/C", "echo", "Hello, World!"]);
//!     #[cfg(unix)]
//!     let mut cmd = Command::new("echo");
//!     #[cfg(unix)]
//!     cmd.args(["Hello, World!"]);
//!
//!     let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
//!
//!     let config = CaptureConfig::new();
//!     config.validate()?;
//!
//!     let output = ProcessOutputCapture::new(config).capture_child(&mut child)?;
//!     println!("exit: {:?}", output.exit.code);
//!     println!("stdout: {}", String::from_utf8_lossy(&output.stdout));
//!     Ok(())
//! }
//! ```
//!
//! ## Capturing Into Custom Sinks
//!
//! ```rust
//! use std::process::{Command, Stdio};
//! use tcrm_capture::capture::{
//!     config::{CaptureConfig, FlushMode},
//!     coordinator::ProcessOutputCapture,
//!     io::MemorySink,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(windows)]
//!     let mut child = Command::new("cmd").args(["/C", "echo out & echo err 1>&2"])
//!         .stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
//!     #[cfg(unix)]
//!     let mut child = Command::new("sh").args(["-c", "echo out; echo err >&2"])
//!         .stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
//!
//!     let config = CaptureConfig::new()
//!         .stdout_flush(FlushMode::Always)
//!         .stderr_flush(FlushMode::EveryBytes(4096));
//!
//!     let output = ProcessOutputCapture::new(config)
//!         .capture(&mut child, MemorySink::new(), MemorySink::new())?;
//!
//!     assert!(output.is_complete());
//!     assert!(!output.stderr.bytes().is_empty());
//!     Ok(())
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `tokio` (default): async front-end with timeout and cancel signal
//! - `serde`: Enable serialization support for config, events and reports
//! - `tracing`: Enable structured logging integration

pub mod capture;
pub mod helper;

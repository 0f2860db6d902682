//! Basic example: Capture stdout and stderr of a short command
use std::process::{Command, Stdio};

use tcrm_capture::capture::{
    config::{CaptureConfig, FlushMode},
    coordinator::ProcessOutputCapture,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(windows)]
    let mut cmd = Command::new("cmd.exe");
    #[cfg(windows)]
    cmd.args(["/C", "echo Hello! && echo Oops! 1>&2"]);
    #[cfg(unix)]
    let mut cmd = Command::new("bash");
    #[cfg(unix)]
    cmd.args(["-c", "echo Hello!; echo Oops! >&2; exit 3"]);

    let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

    let config = CaptureConfig::new()
        .buffer_size(4096)
        .stdout_flush(FlushMode::Always);
    let output = ProcessOutputCapture::new(config).capture_child(&mut child)?;

    println!("Exit: {:?}", output.exit);
    println!("Stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
    println!("Stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
    println!(
        "Relayed {} + {} bytes",
        output.stdout_report.bytes, output.stderr_report.bytes
    );
    Ok(())
}

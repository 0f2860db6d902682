//! Example: Bound a capture with a timeout on the tokio runtime
use std::process::{Command, Stdio};

use tcrm_capture::capture::{
    config::CaptureConfig, coordinator::ProcessOutputCapture, error::CaptureError,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(windows)]
    let mut cmd = Command::new("powershell");
    #[cfg(windows)]
    cmd.args(["-Command", "echo Start; Start-Sleep -Seconds 10"]);
    #[cfg(unix)]
    let mut cmd = Command::new("bash");
    #[cfg(unix)]
    cmd.args(["-c", "echo Start; sleep 10"]);

    let child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

    let config = CaptureConfig::new().timeout_ms(500).join_timeout_ms(200);
    let outcome = ProcessOutputCapture::new(config)
        .capture_async(child, Vec::new(), Vec::new(), None)
        .await;

    match outcome.result {
        Ok(output) => println!("Finished: {:?}", output.exit),
        Err(CaptureError::Timeout) => println!("Timed out, relays joined"),
        Err(CaptureError::Detached { detached, cause }) => {
            println!("{}: {} relay(s) still blocked on open pipes", cause, detached)
        }
        Err(e) => println!("Capture failed: {}", e),
    }

    // The capture never kills; that is left to the owner of the process
    if let Some(mut child) = outcome.process {
        child.kill()?;
        child.wait()?;
    }
    Ok(())
}

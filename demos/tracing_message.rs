//! Example: Print tracing messages and capture events
use std::{
    process::{Command, Stdio},
    sync::mpsc,
    thread,
};

use tcrm_capture::capture::{
    config::CaptureConfig, coordinator::ProcessOutputCapture, event::CaptureEvent, io::MemorySink,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_thread_names(true)
        .init();

    #[cfg(windows)]
    let mut cmd = Command::new("cmd.exe");
    #[cfg(windows)]
    cmd.args(["/C", "echo Hello!"]);
    #[cfg(unix)]
    let mut cmd = Command::new("bash");
    #[cfg(unix)]
    cmd.args(["-c", "echo Hello!; sleep 0.2; echo Bye! >&2"]);

    let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

    let (event_tx, event_rx) = mpsc::channel::<CaptureEvent>();
    let printer = thread::spawn(move || {
        for event in event_rx {
            match event {
                CaptureEvent::RelayClosed {
                    src, bytes, reason, ..
                } => println!("Closed: {} after {} bytes, reason: {:?}", src, bytes, reason),
                CaptureEvent::ProcessExited { exit } => println!("Exited: {:?}", exit),
                other => println!("Event: {:?}", other),
            }
        }
    });

    let capture = ProcessOutputCapture::new(CaptureConfig::new().sample_interval_ms(50))
        .event_sender(event_tx);
    let output = capture.capture(&mut child, MemorySink::new(), MemorySink::new())?;
    drop(capture);
    let _ = printer.join();

    println!("Stdout: {}", String::from_utf8_lossy(output.stdout.bytes()).trim_end());
    Ok(())
}

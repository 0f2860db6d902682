use std::{sync::mpsc, thread, time::Duration};

use crate::capture::{
    config::{CaptureConfig, StreamSource},
    coordinator::ProcessOutputCapture,
    event::{CaptureEvent, RelayStopReason},
    integration_tests::helper::FakeProcessSpec,
};

fn position(events: &[CaptureEvent], pred: impl Fn(&CaptureEvent) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .expect("event not found in sequence")
}

#[test]
fn event_sequence_for_a_clean_capture() {
    let (tx, rx) = mpsc::channel();
    let mut process = FakeProcessSpec::new()
        .stdout("hello")
        .stderr("world!")
        .exit_code(0)
        .spawn();

    let capture = ProcessOutputCapture::default().event_sender(tx);
    capture
        .capture(&mut process, Vec::new(), Vec::new())
        .unwrap();
    drop(capture);

    let events: Vec<CaptureEvent> = rx.iter().collect();
    assert_eq!(events.len(), 5);

    for src in [StreamSource::Stdout, StreamSource::Stderr] {
        let started = position(&events, |e| {
            matches!(e, CaptureEvent::RelayStarted { src: s } if *s == src)
        });
        let closed = position(&events, |e| {
            matches!(e, CaptureEvent::RelayClosed { src: s, .. } if *s == src)
        });
        assert!(started < closed, "{} closed before it started", src);
    }

    let exited: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, CaptureEvent::ProcessExited { .. }))
        .collect();
    assert_eq!(exited.len(), 1);
    assert!(matches!(
        exited[0],
        CaptureEvent::ProcessExited { exit } if exit.code == Some(0)
    ));

    assert!(events.contains(&CaptureEvent::RelayClosed {
        src: StreamSource::Stderr,
        bytes: 6,
        iterations: 1,
        reason: RelayStopReason::EndOfStream,
    }));
}

#[test]
fn sampler_reports_while_process_runs() {
    let (tx, rx) = mpsc::channel();
    let mut process = FakeProcessSpec::new().stdout("tick").hold_open().spawn();
    let release = process.take_release();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        drop(release);
    });

    let capture =
        ProcessOutputCapture::new(CaptureConfig::new().sample_interval_ms(10)).event_sender(tx);
    let output = capture
        .capture(&mut process, Vec::new(), Vec::new())
        .unwrap();
    releaser.join().unwrap();
    drop(capture);

    assert_eq!(output.stdout, b"tick");
    let samples: Vec<CaptureEvent> = rx
        .iter()
        .filter(|e| matches!(e, CaptureEvent::Sample { .. }))
        .collect();
    assert!(samples.len() >= 2, "expected periodic samples, got {:?}", samples);
    assert!(samples.iter().any(|e| matches!(
        e,
        CaptureEvent::Sample { src: StreamSource::Stdout, bytes: 4, average_chunk: 4, .. }
    )));
}

#[test]
fn dropped_receiver_does_not_disturb_capture() {
    let (tx, rx) = mpsc::channel();
    drop(rx);
    let mut process = FakeProcessSpec::new().stdout("still here").spawn();

    let output = ProcessOutputCapture::new(CaptureConfig::new().sample_interval_ms(1))
        .event_sender(tx)
        .capture(&mut process, Vec::new(), Vec::new())
        .unwrap();

    assert_eq!(output.stdout, b"still here");
    assert!(output.is_complete());
}

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use crate::capture::{
    config::StreamSource,
    error::RelayFault,
    event::RelayStopReason,
    flush::{AlwaysFlush, FlushEveryBytes, NeverFlush},
    integration_tests::helper::{PIPE_CAPACITY, pipe},
    io::{ByteSink, ByteSource, MemorySink},
    relay::{JoinOutcome, StreamRelay},
    state::RelayState,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Source that replays scripted reads and records its close calls.
#[derive(Debug)]
struct ScriptedSource {
    steps: VecDeque<io::Result<Vec<u8>>>,
    log: Log,
    fail_close: bool,
}

impl ScriptedSource {
    fn new(steps: Vec<io::Result<Vec<u8>>>, log: &Log) -> Self {
        Self {
            steps: steps.into(),
            log: log.clone(),
            fail_close: false,
        }
    }
}

impl Read for ScriptedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
        }
    }
}

impl ByteSource for ScriptedSource {
    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().push("source closed");
        if self.fail_close {
            return Err(io::Error::other("close failed"));
        }
        Ok(())
    }
}

/// Sink that records close calls in the shared log.
#[derive(Debug)]
struct LoggingSink {
    inner: MemorySink,
    log: Log,
}

impl Write for LoggingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ByteSink for LoggingSink {
    fn close(&mut self) -> io::Result<()> {
        self.log.lock().unwrap().push("sink closed");
        self.inner.close()
    }
}

#[derive(Debug, Default)]
struct FailingFlush(Vec<u8>);

impl Write for FailingFlush {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("flush refused"))
    }
}

impl ByteSink for FailingFlush {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn copies_every_byte_in_order() {
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let relay = StreamRelay::new(StreamSource::Stdout, &data[..], MemorySink::new()).buffer_size(7);
    let monitor = relay.monitor();

    let sink = relay.run();

    assert_eq!(sink.bytes(), &data[..]);
    assert!(sink.is_closed());
    assert_eq!(monitor.bytes(), 10_000);
    assert_eq!(monitor.iterations(), 10_000_u64.div_ceil(7));
    assert_eq!(monitor.stop_reason(), Some(RelayStopReason::EndOfStream));
}

#[test]
fn empty_source_closes_without_iterations() {
    let sink = StreamRelay::new(StreamSource::Stderr, io::empty(), MemorySink::new()).run();
    assert!(sink.bytes().is_empty());
    assert!(sink.is_closed());
}

#[test]
fn always_flush_flushes_once_per_chunk() {
    let relay = StreamRelay::new(StreamSource::Stdout, &b"0123456789"[..], MemorySink::new())
        .flush_policy(Arc::new(AlwaysFlush))
        .buffer_size(3);

    let sink = relay.run();

    assert_eq!(sink.bytes(), b"0123456789");
    assert_eq!(sink.flush_count(), 4);
}

#[test]
fn never_flush_leaves_flushing_to_close() {
    let relay = StreamRelay::new(StreamSource::Stdout, &b"0123456789"[..], MemorySink::new())
        .flush_policy(Arc::new(NeverFlush))
        .buffer_size(3);

    assert_eq!(relay.run().flush_count(), 0);
}

#[test]
fn every_bytes_counts_since_last_flush() {
    let relay = StreamRelay::new(StreamSource::Stdout, &b"0123456789"[..], MemorySink::new())
        .flush_policy(Arc::new(FlushEveryBytes::new(4)))
        .buffer_size(2);

    // 2, 4 flush, 2, 4 flush, 2
    assert_eq!(relay.run().flush_count(), 2);
}

#[test]
fn buffer_size_is_at_least_one() {
    let relay =
        StreamRelay::new(StreamSource::Stdout, &b"abc"[..], MemorySink::new()).buffer_size(0);
    let monitor = relay.monitor();

    assert_eq!(relay.run().bytes(), b"abc");
    assert_eq!(monitor.iterations(), 3);
}

#[test]
fn read_fault_keeps_partial_data() {
    let log = Log::default();
    let source = ScriptedSource::new(
        vec![
            Ok(b"partial ".to_vec()),
            Ok(b"data".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"never read".to_vec()),
        ],
        &log,
    );
    let relay = StreamRelay::new(StreamSource::Stdout, source, MemorySink::new());
    let monitor = relay.monitor();

    let sink = relay.run();

    assert_eq!(sink.bytes(), b"partial data");
    assert!(sink.is_closed());
    assert_eq!(
        monitor.stop_reason(),
        Some(RelayStopReason::Fault(RelayFault::Read("reset".to_string())))
    );
    assert_eq!(monitor.iterations(), 2);
    assert_eq!(*log.lock().unwrap(), vec!["source closed"]);
}

#[test]
fn interrupted_reads_are_retried() {
    let log = Log::default();
    let source = ScriptedSource::new(
        vec![
            Err(io::Error::new(io::ErrorKind::Interrupted, "EINTR")),
            Ok(b"after".to_vec()),
            Err(io::Error::new(io::ErrorKind::Interrupted, "EINTR")),
        ],
        &log,
    );
    let relay = StreamRelay::new(StreamSource::Stdout, source, MemorySink::new());
    let monitor = relay.monitor();

    assert_eq!(relay.run().bytes(), b"after");
    assert_eq!(monitor.stop_reason(), Some(RelayStopReason::EndOfStream));
}

#[test]
fn write_fault_on_closed_sink() {
    let relay = StreamRelay::new(StreamSource::Stderr, &b"lost"[..], MemorySink::closed());
    let monitor = relay.monitor();

    let sink = relay.run();

    assert!(sink.bytes().is_empty());
    assert_eq!(monitor.bytes(), 0);
    assert_eq!(
        monitor.stop_reason(),
        Some(RelayStopReason::Fault(RelayFault::Write(
            "sink is closed".to_string()
        )))
    );
    assert!(monitor.report().is_fault());
}

#[test]
fn flush_fault_stops_the_relay() {
    let relay = StreamRelay::new(StreamSource::Stdout, &b"abcdef"[..], FailingFlush::default())
        .flush_policy(Arc::new(AlwaysFlush))
        .buffer_size(2);
    let monitor = relay.monitor();

    let sink = relay.run();

    assert_eq!(sink.0, b"ab");
    assert_eq!(monitor.iterations(), 1);
    assert_eq!(
        monitor.stop_reason(),
        Some(RelayStopReason::Fault(RelayFault::Flush(
            "flush refused".to_string()
        )))
    );
}

#[test]
fn closes_source_before_sink() {
    let log = Log::default();
    let source = ScriptedSource::new(vec![Ok(b"x".to_vec())], &log);
    let sink = LoggingSink {
        inner: MemorySink::new(),
        log: log.clone(),
    };

    StreamRelay::new(StreamSource::Stdout, source, sink).run();

    assert_eq!(*log.lock().unwrap(), vec!["source closed", "sink closed"]);
}

#[test]
fn close_error_is_not_a_fault() {
    let log = Log::default();
    let mut source = ScriptedSource::new(vec![Ok(b"ok".to_vec())], &log);
    source.fail_close = true;
    let relay = StreamRelay::new(StreamSource::Stdout, source, MemorySink::new());
    let monitor = relay.monitor();

    let sink = relay.run();

    assert_eq!(sink.bytes(), b"ok");
    assert!(sink.is_closed());
    assert_eq!(monitor.state(), RelayState::Closed);
    assert_eq!(monitor.stop_reason(), Some(RelayStopReason::EndOfStream));
}

#[test]
fn lifecycle_is_visible_through_monitor() {
    let relay = StreamRelay::new(StreamSource::Stderr, &b"abc"[..], MemorySink::new());
    let monitor = relay.monitor();

    assert_eq!(monitor.src(), StreamSource::Stderr);
    assert_eq!(monitor.state(), RelayState::Created);
    assert_eq!(monitor.started_at(), None);
    assert_eq!(monitor.stop_reason(), None);

    relay.run();

    let report = monitor.report();
    assert_eq!(report.state, RelayState::Closed);
    assert_eq!(report.bytes, 3);
    assert!(report.started_at.unwrap() <= report.finished_at.unwrap());
    assert_eq!(monitor.average_chunk(), 3);
}

#[test]
fn spawned_relay_hands_back_sink() {
    let handle = StreamRelay::new(StreamSource::Stdout, &b"threaded"[..], MemorySink::new())
        .spawn()
        .unwrap();
    assert_eq!(handle.src(), StreamSource::Stdout);

    let sink = handle.join().unwrap();
    assert_eq!(sink.bytes(), b"threaded");
}

#[test]
fn bounded_join_times_out_then_joins() {
    let (mut writer, reader) = pipe(PIPE_CAPACITY);
    let handle = StreamRelay::new(StreamSource::Stdout, reader, MemorySink::new())
        .spawn()
        .unwrap();
    writer.write_all(b"first").unwrap();

    let handle = match handle.join_timeout(Duration::from_millis(20)).unwrap() {
        JoinOutcome::TimedOut(handle) => handle,
        JoinOutcome::Joined(_) => panic!("relay finished while its writer was open"),
    };
    assert!(!handle.is_finished());
    assert_eq!(handle.monitor().state(), RelayState::Running);

    drop(writer);
    match handle.join_timeout(Duration::from_secs(5)).unwrap() {
        JoinOutcome::Joined(sink) => assert_eq!(sink.bytes(), b"first"),
        JoinOutcome::TimedOut(_) => panic!("relay did not see end of stream"),
    }
}

#[test]
fn out_of_band_close_unblocks_read() {
    let (writer, reader) = pipe(PIPE_CAPACITY);
    let closer = reader.closer();
    let handle = StreamRelay::new(StreamSource::Stderr, reader, MemorySink::new())
        .spawn()
        .unwrap();
    let monitor = handle.monitor().clone();

    thread::sleep(Duration::from_millis(20));
    closer.close();
    let sink = handle.join().unwrap();

    assert!(sink.is_closed());
    assert!(matches!(
        monitor.stop_reason(),
        Some(RelayStopReason::Fault(RelayFault::Read(_)))
    ));
    drop(writer);
}

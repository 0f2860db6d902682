use std::io::{self, BufWriter, Cursor, Read, Write};

use crate::capture::io::{ByteSink, ByteSource, MemorySink};

#[test]
fn memory_sink_records_writes_and_flushes() {
    let mut sink = MemorySink::new();
    sink.write_all(b"abc").unwrap();
    sink.flush().unwrap();
    sink.write_all(b"def").unwrap();

    assert_eq!(sink.bytes(), b"abcdef");
    assert_eq!(sink.flush_count(), 1);
    assert!(!sink.is_closed());
}

#[test]
fn memory_sink_close_is_idempotent_and_does_not_flush() {
    let mut sink = MemorySink::new();
    sink.write_all(b"x").unwrap();
    sink.close().unwrap();
    sink.close().unwrap();

    assert!(sink.is_closed());
    assert_eq!(sink.flush_count(), 0);
    assert_eq!(sink.flush().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    assert_eq!(
        sink.write(b"y").unwrap_err().kind(),
        io::ErrorKind::BrokenPipe
    );
    assert_eq!(sink.into_inner(), b"x".to_vec());
}

#[test]
fn pre_closed_memory_sink_rejects_writes() {
    let mut sink = MemorySink::closed();
    assert!(sink.is_closed());
    assert!(sink.write_all(b"data").is_err());
    assert!(sink.bytes().is_empty());
}

#[test]
fn buf_writer_close_flushes_then_closes_inner() {
    let mut sink = BufWriter::with_capacity(64, MemorySink::new());
    sink.write_all(b"buffered").unwrap();
    assert!(sink.get_ref().bytes().is_empty());

    ByteSink::close(&mut sink).unwrap();

    let inner = sink.get_ref();
    assert_eq!(inner.bytes(), b"buffered");
    assert!(inner.is_closed());
}

#[test]
fn boxed_sink_delegates_close() {
    let mut sink: Box<MemorySink> = Box::new(MemorySink::new());
    ByteSink::close(&mut sink).unwrap();
    assert!(sink.is_closed());
}

#[test]
fn default_sink_close_flushes() {
    let mut sink: Vec<u8> = Vec::new();
    sink.write_all(b"v").unwrap();
    ByteSink::close(&mut sink).unwrap();
    ByteSink::close(&mut sink).unwrap();
    assert_eq!(sink, b"v");
}

#[test]
fn sources_read_to_end_and_close() {
    let mut cursor = Cursor::new(b"cursor".to_vec());
    let mut out = String::new();
    cursor.read_to_string(&mut out).unwrap();
    assert_eq!(out, "cursor");
    ByteSource::close(&mut cursor).unwrap();

    let mut boxed: Box<dyn ByteSource> = Box::new(&b"boxed"[..]);
    let mut buf = Vec::new();
    boxed.read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"boxed");
    boxed.close().unwrap();
    boxed.close().unwrap();
}

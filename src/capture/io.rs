use std::{
    fs::File,
    io::{self, BufWriter, Cursor, Empty, Read, Write},
    process::{ChildStderr, ChildStdout},
};

/// Readable end of a relay
///
/// `read` returning `Ok(0)` signals a clean end-of-stream. `close` releases
/// whatever the source holds and must tolerate being called more than once.
/// Sources that release their resource on drop can keep the default no-op.
pub trait ByteSource: Read + Send {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writable end of a relay
///
/// `close` must tolerate being called more than once. The default flushes,
/// which is enough for sinks that release their resource on drop.
pub trait ByteSink: Write + Send {
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl ByteSource for ChildStdout {}
impl ByteSource for ChildStderr {}
impl ByteSource for File {}
impl ByteSource for Empty {}
impl ByteSource for &[u8] {}
impl<T> ByteSource for Cursor<T> where T: AsRef<[u8]> + Send {}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl ByteSink for Vec<u8> {}
impl ByteSink for File {}
impl ByteSink for io::Sink {}
impl ByteSink for io::Stdout {}
impl ByteSink for io::Stderr {}

impl<W: ByteSink> ByteSink for BufWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_mut().close()
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// In-memory sink that records its bytes and how it was used
///
/// Writes and flushes after [`ByteSink::close`] fail with
/// [`io::ErrorKind::BrokenPipe`], mirroring a downstream pipe that went away.
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use tcrm_capture::capture::io::{ByteSink, MemorySink};
///
/// let mut sink = MemorySink::new();
/// sink.write_all(b"hello").unwrap();
/// sink.close().unwrap();
/// sink.close().unwrap();
///
/// assert_eq!(sink.bytes(), b"hello");
/// assert!(sink.write_all(b"late").is_err());
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    data: Vec<u8>,
    flushes: usize,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that is already closed, so every write fails.
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Number of successful `flush` calls
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "sink is closed",
            ));
        }
        Ok(())
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.flushes += 1;
        Ok(())
    }
}

impl ByteSink for MemorySink {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

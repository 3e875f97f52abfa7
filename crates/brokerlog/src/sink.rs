//! Log output sinks

use parking_lot::{Mutex, MutexGuard};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Destination for formatted records.
///
/// Cloning a sink shares the underlying writer. Each record is written under
/// the sink's lock, so lines from concurrent handlers never interleave.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
    name: &'static str,
}

impl LogSink {
    pub fn stdout() -> Self {
        Self::named(Box::new(io::stdout()), "stdout")
    }

    pub fn stderr() -> Self {
        Self::named(Box::new(io::stderr()), "stderr")
    }

    /// Wrap any writer, e.g. a file or an in-memory buffer
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self::named(Box::new(writer), "writer")
    }

    fn named(writer: Box<dyn Write + Send>, name: &'static str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
            name,
        }
    }

    /// Write one complete line
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.inner.lock();
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LogSink").field(&self.name).finish()
    }
}

/// Locked handle handed to `tracing_subscriber::fmt`
pub struct SinkWriter<'a> {
    guard: MutexGuard<'a, Box<dyn Write + Send>>,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            guard: self.inner.lock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SharedBuf;

    #[test]
    fn test_write_line_appends_newline() {
        let buf = SharedBuf::default();
        let sink = LogSink::from_writer(buf.clone());

        sink.write_line(b"{\"msg\":\"a\"}").unwrap();
        sink.clone().write_line(b"{\"msg\":\"b\"}").unwrap();

        assert_eq!(buf.text(), "{\"msg\":\"a\"}\n{\"msg\":\"b\"}\n");
    }

    #[test]
    fn test_make_writer_shares_buffer() {
        let buf = SharedBuf::default();
        let sink = LogSink::from_writer(buf.clone());

        sink.make_writer().write_all(b"hello").unwrap();
        assert_eq!(buf.text(), "hello");
        assert_eq!(format!("{:?}", sink), "LogSink(\"writer\")");
    }
}

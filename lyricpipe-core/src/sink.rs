//! Destination for rendered lyric blocks.

use crate::error::{CoreError, Result};
use std::io::Write;

/// Receives rendered blocks, one per emission.
pub trait OutputSink: Send {
    /// Write one block followed by a newline.
    ///
    /// Fails with [`CoreError::SinkClosed`] when the destination is gone,
    /// e.g. the downstream end of a pipe was closed.
    fn emit(&mut self, block: &str) -> Result<()>;
}

/// Sink over any writer, flushed after every block so pipes see lines immediately
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<std::io::Stdout> {
    /// Sink writing to the process stdout
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> OutputSink for WriterSink<W> {
    fn emit(&mut self, block: &str) -> Result<()> {
        writeln!(self.writer, "{block}").map_err(CoreError::SinkClosed)?;
        self.writer.flush().map_err(CoreError::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_blocks_are_newline_terminated() {
        let mut sink = WriterSink::new(Vec::new());
        sink.emit("first").unwrap();
        sink.emit("second\n").unwrap();

        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "first\nsecond\n\n");
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let mut sink = WriterSink::new(BrokenPipe);
        let err = sink.emit("line").unwrap_err();

        assert!(matches!(err, CoreError::SinkClosed(_)));
        assert!(err.is_fatal());
    }
}

//! Unbuffered standard output for log events.
//!
//! Every formatted event is written and flushed as one unit, so log lines
//! reach the container runtime the moment they are emitted.

use std::io::{self, Write};

use tracing_subscriber::fmt::MakeWriter;

/// Writer that flushes its inner sink after every write.
#[derive(Debug)]
pub struct FlushingWriter<W: Write> {
    inner: W,
}

impl<W: Write> FlushingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for FlushingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        self.inner.flush()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// [`MakeWriter`] handing out flushing handles to the process stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnbufferedStdout;

impl<'a> MakeWriter<'a> for UnbufferedStdout {
    type Writer = FlushingWriter<io::StdoutLock<'static>>;

    fn make_writer(&'a self) -> Self::Writer {
        FlushingWriter::new(io::stdout().lock())
    }
}

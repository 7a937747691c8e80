use std::cell::RefCell;
use std::io::{self, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed writer for capturing what the interpreter prints.
#[derive(Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return inner Rc so caller can read collected bytes after command execution.
    pub fn into_inner(self) -> Rc<RefCell<Vec<u8>>> {
        self.buf
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Destination of the interpreter's own output or error stream.
///
/// Builtins write into it directly. Spawned processes either get a handle to it,
/// when it is one of the process's standard streams, or a pipe whose contents the
/// executor copies into it.
pub enum OutputSink {
    Stdout,
    Stderr,
    Memory(MemWriter),
}

impl OutputSink {
    /// Handle a child process can write to directly, or `None` when its output has
    /// to be piped and copied.
    pub fn child_stdio(&self) -> Option<Stdio> {
        match self {
            OutputSink::Stdout => Some(Stdio::from(io::stdout())),
            OutputSink::Stderr => Some(Stdio::from(io::stderr())),
            OutputSink::Memory(_) => None,
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        match self {
            OutputSink::Stdout => io::stdout().write(data),
            OutputSink::Stderr => io::stderr().write(data),
            OutputSink::Memory(mw) => mw.write(data),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            OutputSink::Stdout => io::stdout().flush(),
            OutputSink::Stderr => io::stderr().flush(),
            OutputSink::Memory(mw) => mw.flush(),
        }
    }
}

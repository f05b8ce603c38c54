use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed reader feeding the output of one pipeline stage into the next.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

/// Shared byte buffer filled by a [`MemWriter`].
pub type Captured = Rc<RefCell<Vec<u8>>>;

/// Memory-backed writer for capturing output of commands and consoles.
///
/// The buffer is shared, so a handle obtained from [`MemWriter::with_handle`]
/// can be read after the writer itself has been boxed and moved away.
#[derive(Default)]
pub struct MemWriter {
    buf: Captured,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Captured) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }

    /// Writer appending to an existing shared buffer.
    pub fn from_handle(buf: Captured) -> Self {
        Self { buf }
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

/// Decode a captured buffer.
pub fn captured_text(handle: &Captured) -> String {
    String::from_utf8_lossy(&handle.borrow()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_handle_sees_writes_after_move() {
        let (mw, handle) = MemWriter::with_handle();
        let mut boxed: Box<dyn Write> = Box::new(mw);
        write!(boxed, "hello").unwrap();
        writeln!(boxed, " world").unwrap();
        assert_eq!(captured_text(&handle), "hello world\n");
    }

    #[test]
    fn test_reader_drains_buffer() {
        let mut reader = MemReader::new(b"abc".to_vec());
        let mut s = String::new();
        reader.read_to_string(&mut s).unwrap();
        assert_eq!(s, "abc");
    }
}

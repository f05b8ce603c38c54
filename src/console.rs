//! User-facing output: tagged info lines and the error channel.

use crate::io_adapters::{Captured, MemWriter};
use std::fmt::Display;
use std::io::{self, Write};

const TAG: &str = "[husk]";

/// The console every component reports through.
///
/// Info goes to `out`, errors to `err`. Write failures on either stream are
/// logged and otherwise ignored: a broken console must not abort a compile.
pub struct Console {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Console {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self { out, err }
    }

    /// Console bound to the process stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Console writing into memory. Returns the stdout and stderr handles.
    pub fn captured() -> (Self, Captured, Captured) {
        let (out, out_handle) = MemWriter::with_handle();
        let (err, err_handle) = MemWriter::with_handle();
        (Self::new(Box::new(out), Box::new(err)), out_handle, err_handle)
    }

    /// Print a tagged informational line.
    pub fn info(&mut self, msg: impl Display) {
        if let Err(e) = writeln!(self.out, "{TAG} {msg}").and_then(|_| self.out.flush()) {
            tracing::warn!("failed to write to console: {}", e);
        }
    }

    /// Report one failure on the error channel.
    pub fn error(&mut self, msg: impl Display) {
        tracing::debug!(%msg, "reported error");
        if let Err(e) = writeln!(self.err, "{TAG} Error: {msg}").and_then(|_| self.err.flush()) {
            tracing::warn!("failed to write to console: {}", e);
        }
    }
}

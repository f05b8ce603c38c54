//! The read-translate loop behind the interactive prompt.

use crate::console::Console;
use crate::translate::{Mode, Translator};
use anyhow::Context;
use rustyline::DefaultEditor;
use std::cell::Cell;
use std::io::{self, BufRead};
use std::rc::Rc;

/// Source of interactive input lines.
///
/// Returning an error (including end of input) ends the prompt; the caller
/// decides whether that is fatal.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<String>;
}

/// Terminal line editor with history.
pub struct Editor {
    inner: DefaultEditor,
}

impl Editor {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            inner: DefaultEditor::new().context("failed to create line editor")?,
        })
    }
}

impl LineReader for Editor {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<String> {
        let line = self.inner.readline(prompt)?;
        if !line.trim().is_empty() {
            if let Err(e) = self.inner.add_history_entry(line.as_str()) {
                tracing::warn!("failed to add history entry: {}", e);
            }
        }
        Ok(line)
    }
}

/// Lines taken from any buffered reader; prompts are discarded.
pub struct BufferedInput<R> {
    reader: R,
}

impl<R: BufRead> BufferedInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineReader for BufferedInput<R> {
    fn read_line(&mut self, _prompt: &str) -> anyhow::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input").into());
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

/// Whether the prompt loop should keep going.
///
/// Clones share the same flag, so a copy bound into the executor as the
/// `exit` capability stops the loop that owns the original.
#[derive(Clone, Debug, Default)]
pub struct RunFlag(Rc<Cell<bool>>);

impl RunFlag {
    pub fn start(&self) {
        self.0.set(true);
    }

    pub fn stop(&self) {
        self.0.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.0.get()
    }
}

/// Prompt state and the continuation protocol for one input cycle.
pub struct InteractiveSession {
    prompt: String,
    more_prompt: String,
    running: RunFlag,
}

impl Default for InteractiveSession {
    fn default() -> Self {
        Self::new(">>> ", "    ")
    }
}

impl InteractiveSession {
    pub fn new(prompt: impl Into<String>, more_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            more_prompt: more_prompt.into(),
            running: RunFlag::default(),
        }
    }

    /// Handle on the running flag, for binding as the exit capability.
    pub fn run_flag(&self) -> RunFlag {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn start(&self) {
        self.running.start();
    }

    /// Read and translate one statement.
    ///
    /// Incomplete input is continued at the secondary prompt until it parses
    /// or an empty line forces a final attempt. Returns `Ok(None)` after a
    /// reported failure; `Err` only for failures of `reader` itself.
    pub fn handle(
        &self,
        reader: &mut dyn LineReader,
        translator: &dyn Translator,
        console: &mut Console,
    ) -> anyhow::Result<Option<String>> {
        let mut buffer = reader.read_line(&self.prompt)?;
        loop {
            match translator.translate(&buffer, Mode::Single) {
                Ok(compiled) => return Ok(Some(compiled)),
                Err(err) if err.is_incomplete() => {
                    tracing::trace!(lines = buffer.lines().count(), "awaiting more input");
                    let line = reader.read_line(&self.more_prompt)?;
                    if line.is_empty() {
                        return Ok(Self::final_attempt(&buffer, translator, console));
                    }
                    buffer.push('\n');
                    buffer.push_str(&line);
                }
                Err(err) => {
                    console.error(err);
                    return Ok(None);
                }
            }
        }
    }

    fn final_attempt(
        buffer: &str,
        translator: &dyn Translator,
        console: &mut Console,
    ) -> Option<String> {
        match translator.translate(buffer, Mode::Single) {
            Ok(compiled) => Some(compiled),
            Err(err) => {
                console.error(err);
                None
            }
        }
    }
}

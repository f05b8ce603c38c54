//! The translator boundary: source text in, target code out.

mod passthrough;
mod process;

pub use passthrough::PassthroughTranslator;
pub use process::{ExternalFormatter, Formatted, ProcessTranslator};

use thiserror::Error;

/// Extension of source files picked up by the orchestrator.
pub const SOURCE_EXT: &str = "hsk";

/// Extension of compiled output files.
pub const COMPILED_EXT: &str = "sh";

/// Runtime support file written into every compiled module directory.
pub const BOOTSTRAP_FILE: &str = "__bootstrap__";

/// What kind of unit is being translated; decides the header wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One interactive statement or inline `-c` snippet.
    Single,
    /// A standalone file.
    File,
    /// A file inside a module directory.
    Module,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Single => "single",
            Mode::File => "file",
            Mode::Module => "module",
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    /// Syntactically unfinished; more lines may complete it.
    #[error("incomplete input: {0}")]
    Incomplete(String),
    /// Syntactically wrong no matter what follows.
    #[error("invalid input: {0}")]
    Invalid(String),
    /// Any other translation failure.
    #[error("translation failed: {0}")]
    Failed(String),
}

impl TranslateError {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, TranslateError::Incomplete(_))
    }
}

/// A source-to-target translator.
pub trait Translator {
    fn translate(&self, text: &str, mode: Mode) -> Result<String, TranslateError>;

    /// Shared runtime header: run once when a session starts and written
    /// verbatim as the bootstrap file of module directories.
    fn header(&self) -> Result<String, TranslateError>;
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn translate(&self, text: &str, mode: Mode) -> Result<String, TranslateError> {
        (**self).translate(text, mode)
    }

    fn header(&self) -> Result<String, TranslateError> {
        (**self).header()
    }
}

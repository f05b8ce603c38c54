use crate::shell::{self, SyntaxError};
use crate::translate::{Mode, TranslateError, Translator};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Translator for sources already written in husk shell.
///
/// Translation checks the syntax, distinguishing input that could still be
/// completed from input that never will, and wraps files in a header.
#[derive(Debug, Default, Clone)]
pub struct PassthroughTranslator {
    strict: bool,
}

impl PassthroughTranslator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    fn check_style(&self, text: &str) -> Result<(), TranslateError> {
        for (i, line) in text.lines().enumerate() {
            if line.starts_with('\t') {
                return Err(TranslateError::Invalid(format!(
                    "line {}: tab indentation (strict mode)",
                    i + 1
                )));
            }
            if line.ends_with([' ', '\t']) {
                return Err(TranslateError::Invalid(format!(
                    "line {}: trailing whitespace (strict mode)",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

impl From<SyntaxError> for TranslateError {
    fn from(err: SyntaxError) -> Self {
        if err.is_incomplete() {
            TranslateError::Incomplete(err.to_string())
        } else {
            TranslateError::Invalid(err.to_string())
        }
    }
}

impl Translator for PassthroughTranslator {
    fn translate(&self, text: &str, mode: Mode) -> Result<String, TranslateError> {
        shell::parse(text)?;
        if self.strict {
            self.check_style(text)?;
        }

        let mut body = String::new();
        for line in text.lines() {
            body.push_str(line.trim_end());
            body.push('\n');
        }

        Ok(match mode {
            Mode::Single => body.trim_end_matches('\n').to_string(),
            Mode::File => format!("#!/bin/sh\n# Compiled with husk {VERSION}\n\n{}\n{body}", self.header()?),
            Mode::Module => format!("# Compiled with husk {VERSION}\n\n{body}"),
        })
    }

    fn header(&self) -> Result<String, TranslateError> {
        Ok(format!("HUSK_VERSION={VERSION}\n"))
    }
}

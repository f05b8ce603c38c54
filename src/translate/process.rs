use crate::external::{self, pipe_through};
use crate::translate::{Mode, TranslateError, Translator};
use std::path::PathBuf;
use std::process::{Command, Output};

/// Exit status an external translator uses for "need more input".
const EXIT_INCOMPLETE: i32 = 2;
/// Exit status an external translator uses for a syntax error.
const EXIT_INVALID: i32 = 1;

/// A program and its leading arguments, parsed from a command line such as
/// `"shfmt -i 2"`. The program is looked up on `PATH`.
#[derive(Debug, Clone)]
struct Invocation {
    program: PathBuf,
    args: Vec<String>,
}

impl Invocation {
    fn parse(command_line: &str, what: &str) -> anyhow::Result<Self> {
        let mut words = command_line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty {} command", what))?;
        let program = external::which(name)
            .ok_or_else(|| anyhow::anyhow!("{} not found: {}", what, name))?;
        Ok(Self {
            program,
            args: words.map(str::to_string).collect(),
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Translator implemented by an external program.
///
/// The program is called as `<program> --mode <mode> [--strict]` with the
/// source on stdin and prints the compiled code; `<program> --header` prints
/// the bootstrap header.
#[derive(Debug, Clone)]
pub struct ProcessTranslator {
    invocation: Invocation,
    strict: bool,
}

impl ProcessTranslator {
    pub fn new(command_line: &str, strict: bool) -> anyhow::Result<Self> {
        Ok(Self {
            invocation: Invocation::parse(command_line, "translator")?,
            strict,
        })
    }

    fn call(&self, args: &[&str], input: Option<&str>) -> Result<Output, TranslateError> {
        let mut cmd = self.invocation.command();
        cmd.args(args);
        pipe_through(&mut cmd, input.map(str::as_bytes))
            .map_err(|e| TranslateError::Failed(format!("{e:#}")))
    }
}

fn stderr_message(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

impl Translator for ProcessTranslator {
    fn translate(&self, text: &str, mode: Mode) -> Result<String, TranslateError> {
        let mut args = vec!["--mode", mode.as_str()];
        if self.strict {
            args.push("--strict");
        }
        let output = self.call(&args, Some(text))?;
        match external::exit_code(output.status) {
            0 => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            EXIT_INCOMPLETE => Err(TranslateError::Incomplete(stderr_message(&output))),
            EXIT_INVALID => Err(TranslateError::Invalid(stderr_message(&output))),
            code => Err(TranslateError::Failed(format!(
                "{} exited with status {}: {}",
                self.invocation.program.display(),
                code,
                stderr_message(&output)
            ))),
        }
    }

    fn header(&self) -> Result<String, TranslateError> {
        let output = self.call(&["--header"], Some(""))?;
        if !output.status.success() {
            return Err(TranslateError::Failed(format!(
                "{} --header failed: {}",
                self.invocation.program.display(),
                stderr_message(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// An external code formatter: compiled code goes in on stdin, formatted
/// code comes out on stdout.
#[derive(Debug, Clone)]
pub struct ExternalFormatter {
    invocation: Invocation,
}

impl ExternalFormatter {
    pub fn new(command_line: &str) -> anyhow::Result<Self> {
        Ok(Self {
            invocation: Invocation::parse(command_line, "formatter")?,
        })
    }

    pub fn format(&self, code: &str) -> Result<String, TranslateError> {
        let mut cmd = self.invocation.command();
        let output = pipe_through(&mut cmd, Some(code.as_bytes()))
            .map_err(|e| TranslateError::Failed(format!("{e:#}")))?;
        if !output.status.success() {
            return Err(TranslateError::Failed(format!(
                "formatter {} failed: {}",
                self.invocation.program.display(),
                stderr_message(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A translator whose output is passed through a formatter.
pub struct Formatted<T> {
    inner: T,
    formatter: ExternalFormatter,
}

impl<T: Translator> Formatted<T> {
    pub fn new(inner: T, formatter: ExternalFormatter) -> Self {
        Self { inner, formatter }
    }
}

impl<T: Translator> Translator for Formatted<T> {
    fn translate(&self, text: &str, mode: Mode) -> Result<String, TranslateError> {
        let compiled = self.inner.translate(text, mode)?;
        self.formatter.format(&compiled)
    }

    fn header(&self) -> Result<String, TranslateError> {
        self.inner.header()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    /// Write a script into `dir` and return the command line running it.
    fn script(dir: &std::path::Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }

    const FAKE_TRANSLATOR: &str = r##"
if [ "$1" = "--header" ]; then echo "RUNTIME=1"; exit 0; fi
src=$(cat)
case "$src" in
  *:) echo "expected an indented block" >&2; exit 2 ;;
  *!*) echo "bad token" >&2; exit 1 ;;
  *panic*) exit 70 ;;
esac
echo "# $2 $3"
echo "$src""##;

    #[test]
    fn test_exit_status_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let command_line = script(dir.path(), "fake-translator", FAKE_TRANSLATOR);
        let t = ProcessTranslator::new(&command_line, true).unwrap();

        assert_eq!(t.translate("x=1", Mode::Module).unwrap(), "# module --strict\nx=1\n");
        assert_eq!(t.header().unwrap(), "RUNTIME=1\n");

        let err = t.translate("if x:", Mode::Single).unwrap_err();
        assert!(err.is_incomplete());
        assert_eq!(err.to_string(), "incomplete input: expected an indented block");

        assert!(matches!(
            t.translate("a!", Mode::Single),
            Err(TranslateError::Invalid(msg)) if msg == "bad token"
        ));
        assert!(matches!(
            t.translate("panic", Mode::File),
            Err(TranslateError::Failed(_))
        ));
    }

    #[test]
    fn test_missing_translator_is_reported() {
        let err = ProcessTranslator::new("no-such-translator-4242", false).unwrap_err();
        assert!(err.to_string().contains("translator not found"));
    }

    #[test]
    fn test_formatter_rewrites_output() {
        let dir = tempfile::tempdir().unwrap();
        let command_line = script(dir.path(), "upper", "tr a-z A-Z");
        let formatter = ExternalFormatter::new(&command_line).unwrap();
        let t = Formatted::new(crate::translate::PassthroughTranslator::default(), formatter);

        assert_eq!(t.translate("echo hi", Mode::Single).unwrap(), "ECHO HI");
        assert_eq!(
            t.header().unwrap(),
            crate::translate::PassthroughTranslator::default().header().unwrap()
        );
    }
}

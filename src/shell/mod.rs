//! husk shell: the target language compiled fragments are written in, and
//! the [`ShellContext`] that evaluates them.
//!
//! The language is a small subset of POSIX sh: `NAME=value` assignments,
//! `local` and `unset`, quoting, `$NAME`/`${NAME}`/`$?`/`$(...)` expansion and
//! `|` pipelines separated by `;` or newlines. Commands resolve to a bound
//! capability first, then a builtin, then an external program on `PATH`.

mod builtin;
pub mod env;
pub mod lexer;
pub mod parser;

use crate::executor::{ExecutionContext, Namespace};
use crate::external::{self, find_command_path};
use crate::io_adapters::{MemReader, MemWriter};
use crate::session::RunFlag;
use anyhow::{Context, bail};
use env::Environment;
use lexer::{LexingError, WordPart};
use parser::{AstNode, ParsingError, Word};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::Command;
use std::rc::Rc;
use thiserror::Error;

/// Conventional process exit code: 0 is success.
pub type ExitCode = i32;

type NativeFn = dyn Fn(&[String], &mut dyn Write) -> anyhow::Result<ExitCode>;

/// A host function callable from shell code by the name it is bound to.
#[derive(Clone)]
pub struct Native(Rc<NativeFn>);

impl Native {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[String], &mut dyn Write) -> anyhow::Result<ExitCode> + 'static,
    {
        Native(Rc::new(f))
    }

    pub fn call(&self, args: &[String], out: &mut dyn Write) -> anyhow::Result<ExitCode> {
        (self.0)(args, out)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native>")
    }
}

/// What a shell name can be bound to.
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Native(Native),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Native(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Native(n) => write!(f, "{n:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// The `exit` capability: calling it stops the prompt loop.
impl From<RunFlag> for Value {
    fn from(flag: RunFlag) -> Self {
        Value::Native(Native::new(move |_args, _out| {
            flag.stop();
            Ok(0)
        }))
    }
}

/// Why a piece of husk shell does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexingError),
    #[error(transparent)]
    Parse(#[from] ParsingError),
}

impl SyntaxError {
    /// True when more input could still make the program valid.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            SyntaxError::Lex(_) | SyntaxError::Parse(ParsingError::UnexpectedEnd)
        )
    }
}

/// Parse a husk shell program into its statements.
pub fn parse(code: &str) -> Result<Vec<AstNode>, SyntaxError> {
    let tokens = lexer::split_into_tokens(code)?;
    Ok(parser::construct_ast(tokens)?)
}

/// Evaluates husk shell against an [`Environment`].
pub struct ShellContext {
    env: Environment,
    stdout: Box<dyn Write>,
}

impl ShellContext {
    /// Context whose globals are the process environment variables.
    pub fn new() -> Self {
        Self::with_env(Environment::new())
    }

    pub fn with_env(env: Environment) -> Self {
        Self {
            env,
            stdout: Box::new(io::stdout()),
        }
    }

    /// Send command output somewhere other than the process stdout.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.stdout = out;
        self
    }

    fn execute_program(&mut self, statements: &[AstNode]) -> anyhow::Result<()> {
        for statement in statements {
            let code = match statement {
                AstNode::Pipeline(stages) => self.execute_pipeline(stages)?,
                command => self.execute_pipeline(std::slice::from_ref(command))?,
            };
            self.env.set_status(code);
        }
        Ok(())
    }

    fn execute_pipeline(&mut self, stages: &[AstNode]) -> anyhow::Result<ExitCode> {
        let mut input: Option<Vec<u8>> = None;
        let mut last_exit = 0;

        for (i, stage) in stages.iter().enumerate() {
            let AstNode::Command { argv, assignments } = stage else {
                bail!("pipeline contains non-command node");
            };

            let mut prefix = Vec::with_capacity(assignments.len());
            for assignment in assignments {
                if let AstNode::Assignment { name, value } = assignment {
                    let value = match value {
                        Some(word) => self.expand(word)?,
                        None => String::new(),
                    };
                    prefix.push((name.clone(), value));
                }
            }

            if argv.is_empty() {
                // Bare assignments only take effect outside of a pipeline.
                if stages.len() == 1 {
                    for (name, value) in prefix {
                        self.env.set_var(name, value);
                    }
                }
                last_exit = 0;
                input = None;
                continue;
            }

            let words = argv
                .iter()
                .map(|word| self.expand(word))
                .collect::<anyhow::Result<Vec<String>>>()?;

            if i + 1 == stages.len() {
                let mut out = std::mem::replace(&mut self.stdout, Box::new(io::sink()));
                let result = self.invoke(&words, &prefix, input.take(), &mut *out);
                let flushed = out.flush();
                self.stdout = out;
                last_exit = result?;
                flushed?;
            } else {
                let (mut mw, buf) = MemWriter::with_handle();
                last_exit = self.invoke(&words, &prefix, input.take(), &mut mw)?;
                input = Some(buf.borrow().clone());
            }
        }

        Ok(last_exit)
    }

    /// Run one command: bound capability, builtin, or external program.
    fn invoke(
        &mut self,
        words: &[String],
        prefix: &[(String, String)],
        input: Option<Vec<u8>>,
        out: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let (name, args) = words.split_first().context("empty command")?;

        if let Some(Value::Native(native)) = self.env.lookup(name) {
            let native = native.clone();
            return native.call(args, out);
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut stdin: Box<dyn Read> = match &input {
            Some(buf) => Box::new(MemReader::new(buf.clone())),
            None => Box::new(io::stdin()),
        };
        if let Some(result) = builtin::dispatch(name, &arg_refs, &mut *stdin, out, &mut self.env) {
            return result;
        }

        let search_paths = self.env.get_var("PATH").unwrap_or_default();
        let Some(program) = find_command_path(OsStr::new(&search_paths), Path::new(name))
            .map(Cow::into_owned)
        else {
            bail!("command not found: {}", name);
        };
        tracing::debug!(program = %program.display(), "running external command");

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .env_clear()
            .envs(self.env.exported())
            .envs(prefix.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.env.current_dir);
        let output = external::pipe_through(&mut cmd, input.as_deref())?;
        out.write_all(&output.stdout)?;
        io::stderr().write_all(&output.stderr)?;
        Ok(external::exit_code(output.status))
    }

    /// Concatenate the expanded parts of a word.
    fn expand(&mut self, word: &Word) -> anyhow::Result<String> {
        let mut result = String::new();
        for part in &word.0 {
            match part {
                WordPart::Literal(text) => result.push_str(text),
                WordPart::ParamSubst(name) => {
                    // Unset variables expand to nothing, like in sh.
                    if let Some(value) = self.env.get_var(name) {
                        result.push_str(&value);
                    }
                }
                WordPart::CmdSubst(code) => {
                    let captured = self.capture(code)?;
                    result.push_str(captured.trim_end_matches('\n'));
                }
            }
        }
        Ok(result)
    }

    /// Evaluate `code` with its output collected instead of printed.
    fn capture(&mut self, code: &str) -> anyhow::Result<String> {
        let statements = parse(code).with_context(|| format!("in $({code})"))?;
        let (mw, buf) = MemWriter::with_handle();
        let saved = std::mem::replace(&mut self.stdout, Box::new(mw));
        let result = self.execute_program(&statements);
        self.stdout = saved;
        result?;
        let text = String::from_utf8_lossy(&buf.borrow()).into_owned();
        Ok(text)
    }
}

impl Default for ShellContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for ShellContext {
    type Value = Value;

    fn globals(&self) -> &Namespace<Value> {
        &self.env.globals
    }

    fn globals_mut(&mut self) -> &mut Namespace<Value> {
        &mut self.env.globals
    }

    fn locals(&self) -> &Namespace<Value> {
        &self.env.locals
    }

    fn evaluate(&mut self, code: &str) -> anyhow::Result<()> {
        self.env.reset_frame();
        let statements = parse(code)?;
        self.execute_program(&statements)
    }
}

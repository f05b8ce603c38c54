use crate::shell::ExitCode;
use crate::shell::env::Environment;
use crate::shell::lexer::is_identifier;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};

/// Streams a builtin reads from and writes to.
pub(crate) struct Streams<'a> {
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
}

impl Streams<'_> {
    /// Contents of the named files, or of stdin when there are none.
    /// Names are resolved against the working directory of `env`.
    fn inputs(&mut self, files: &[String], env: &Environment) -> Result<Vec<(Option<String>, String)>> {
        if files.is_empty() {
            let mut text = String::new();
            self.stdin.read_to_string(&mut text)?;
            return Ok(vec![(None, text)]);
        }
        files
            .iter()
            .map(|name| -> Result<(Option<String>, String)> {
                let text = fs::read_to_string(env.current_dir.join(name))
                    .with_context(|| name.clone())?;
                Ok((Some(name.clone()), text))
            })
            .collect()
    }
}

/// Commands run in-process, parsed with [`argh`] like any other command line.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    const NAME: &'static str;

    /// Returns the shell exit code. An `Err` is printed and turned into 1.
    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode>;
}

/// Run the builtin called `name`, or `None` if there is no such builtin.
pub(crate) fn dispatch(
    name: &str,
    args: &[&str],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Option<Result<ExitCode>> {
    let mut io = Streams { stdin, stdout };
    let result = match name {
        "echo" => invoke::<Echo>(args, &mut io, env),
        "cat" => invoke::<Cat>(args, &mut io, env),
        "wc" => invoke::<Wc>(args, &mut io, env),
        "local" => invoke::<Local>(args, &mut io, env),
        "unset" => invoke::<Unset>(args, &mut io, env),
        _ => return None,
    };
    Some(result)
}

/// Only a broken output stream is an error for the caller.
fn invoke<T: BuiltinCommand>(args: &[&str], io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
    let cmd = match T::from_args(&[T::NAME], args) {
        Ok(cmd) => cmd,
        Err(EarlyExit { output, status }) => {
            io.stdout.write_all(output.as_bytes())?;
            return Ok(if status.is_ok() { 0 } else { 1 });
        }
    };
    match cmd.execute(io, env) {
        Ok(code) => Ok(code),
        Err(e) => {
            writeln!(io.stdout, "{}: {e:#}", T::NAME)?;
            Ok(1)
        }
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not print the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// words to print.
    pub words: Vec<String>,
}

impl BuiltinCommand for Echo {
    const NAME: &'static str = "echo";

    fn execute(self, io: &mut Streams<'_>, _env: &mut Environment) -> Result<ExitCode> {
        let end = if self.no_newline { "" } else { "\n" };
        write!(io.stdout, "{}{end}", self.words.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// concatenate files, or stdin, to standard output.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print; stdin when omitted.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    const NAME: &'static str = "cat";

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        for (_, text) in io.inputs(&self.files, env)? {
            io.stdout.write_all(text.as_bytes())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print line, word and byte counts.
pub struct Wc {
    #[argh(positional, greedy)]
    /// files to count; stdin when omitted.
    pub files: Vec<String>,
}

impl BuiltinCommand for Wc {
    const NAME: &'static str = "wc";

    fn execute(self, io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        for (name, text) in io.inputs(&self.files, env)? {
            let lines = text.lines().count();
            let words = text.split_whitespace().count();
            match name {
                Some(name) => writeln!(io.stdout, "{lines} {words} {} {name}", text.len())?,
                None => writeln!(io.stdout, "{lines} {words} {}", text.len())?,
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// define variables in the local frame of the running fragment.
pub struct Local {
    #[argh(positional, greedy)]
    /// assignments of the form NAME=VALUE; a bare NAME is set to the empty string.
    pub assignments: Vec<String>,
}

impl BuiltinCommand for Local {
    const NAME: &'static str = "local";

    fn execute(self, _io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        for assignment in &self.assignments {
            let (name, value) = assignment.split_once('=').unwrap_or((assignment.as_str(), ""));
            if !is_identifier(name) {
                anyhow::bail!("not a valid identifier: '{}'", name);
            }
            env.set_local(name, value);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// remove variables from the running fragment.
pub struct Unset {
    #[argh(positional, greedy)]
    /// names to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unset {
    const NAME: &'static str = "unset";

    fn execute(self, _io: &mut Streams<'_>, env: &mut Environment) -> Result<ExitCode> {
        for name in &self.names {
            env.unset(name);
        }
        Ok(0)
    }
}

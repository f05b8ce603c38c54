//! Command line arguments and the driver that dispatches them.

use crate::console::Console;
use crate::executor::{ExecutionContext, SessionExecutor};
use crate::orchestrator::{Backend, Orchestrator};
use crate::session::{InteractiveSession, LineReader, RunFlag};
use crate::translate::{
    ExternalFormatter, Formatted, Mode, PassthroughTranslator, ProcessTranslator, TranslateError,
    Translator,
};
use argh::FromArgs;
use rustyline::error::ReadlineError;
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming an external translator program.
pub const TRANSLATOR_VAR: &str = "HUSK_TRANSLATOR";

/// Name the exit capability is bound to in the session.
pub const EXIT_BINDING: &str = "exit";

#[derive(FromArgs, Debug, Default)]
/// Compile husk sources, run them, or start an interactive prompt.
pub struct Args {
    #[argh(positional)]
    /// source files or module directories to compile.
    pub paths: Vec<PathBuf>,

    #[argh(switch, short = 'v')]
    /// print the version.
    pub version: bool,

    #[argh(switch, short = 's')]
    /// reject sloppy whitespace while translating.
    pub strict: bool,

    #[argh(switch, short = 'r')]
    /// run compiled files after compiling them.
    pub run: bool,

    #[argh(switch, short = 'n')]
    /// do not write compiled files.
    pub nowrite: bool,

    #[argh(switch, short = 'i')]
    /// start the interactive prompt after everything else.
    pub interact: bool,

    #[argh(switch, short = 'd')]
    /// print compiled code before executing it.
    pub debug: bool,

    #[argh(option, short = 'c')]
    /// code to compile and run; may be repeated.
    pub code: Vec<String>,

    #[argh(option)]
    /// formatter command every compiled fragment is piped through.
    pub formatter: Option<String>,

    #[argh(option)]
    /// external translator program (default: $HUSK_TRANSLATOR, else built in).
    pub translator: Option<String>,
}

impl Args {
    /// True when the prompt should start once other work is done.
    pub fn wants_prompt(&self) -> bool {
        self.interact || (self.paths.is_empty() && self.code.is_empty() && !self.version)
    }
}

/// Pick the translator the arguments ask for.
pub fn build_translator(args: &Args) -> anyhow::Result<Box<dyn Translator>> {
    let external = args
        .translator
        .clone()
        .or_else(|| std::env::var(TRANSLATOR_VAR).ok().filter(|s| !s.trim().is_empty()));

    let base: Box<dyn Translator> = match external {
        Some(command_line) => {
            tracing::debug!(%command_line, "using external translator");
            Box::new(ProcessTranslator::new(&command_line, args.strict)?)
        }
        None => Box::new(PassthroughTranslator::new(args.strict)),
    };

    Ok(match &args.formatter {
        Some(command_line) => Box::new(Formatted::new(base, ExternalFormatter::new(command_line)?)),
        None => base,
    })
}

/// Exit status for how the prompt ended.
///
/// Ctrl-D ends the prompt cleanly and Ctrl-C exits with 130; any other
/// input error is passed on.
pub fn prompt_status(ended: anyhow::Result<()>) -> anyhow::Result<u8> {
    let Err(e) = ended else {
        return Ok(0);
    };
    match e.downcast_ref::<ReadlineError>() {
        Some(ReadlineError::Eof) => Ok(0),
        Some(ReadlineError::Interrupted) => Ok(130),
        _ => Err(e),
    }
}

/// Owns everything one invocation of the program shares: the translator,
/// the console, the prompt state and the lazily started executor.
pub struct Driver<T, C: ExecutionContext> {
    translator: T,
    console: Console,
    session: InteractiveSession,
    runner: Option<SessionExecutor<C>>,
    make_context: Box<dyn Fn() -> C>,
    debug: bool,
}

impl<T, C> Driver<T, C>
where
    T: Translator,
    C: ExecutionContext,
    C::Value: From<RunFlag>,
{
    pub fn new(translator: T, console: Console, make_context: impl Fn() -> C + 'static) -> Self {
        Self {
            translator,
            console,
            session: InteractiveSession::default(),
            runner: None,
            make_context: Box::new(make_context),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn session(&self) -> &InteractiveSession {
        &self.session
    }

    /// The executor, once something has been run.
    pub fn runner(&self) -> Option<&SessionExecutor<C>> {
        self.runner.as_ref()
    }

    /// Handle everything except the prompt: version, inline code, then paths.
    pub fn parse(&mut self, args: &Args) {
        if args.version {
            self.console.info(format!("Version {VERSION}"));
        }
        for code in &args.code {
            self.run_inline(code);
        }
        let orchestrator = Orchestrator::new(!args.nowrite, args.run);
        for path in &args.paths {
            orchestrator.compile_path(self, path);
        }
    }

    fn run_inline(&mut self, code: &str) {
        match self.translator.translate(code, Mode::Single) {
            Ok(compiled) => self.execute(&compiled),
            Err(err) => self.console.error(err),
        }
    }

    /// Run the prompt until the exit capability is called.
    ///
    /// Errors from `reader`, end of input included, end the loop and are
    /// returned.
    pub fn start_prompt(&mut self, reader: &mut dyn LineReader) -> anyhow::Result<()> {
        self.console.info("Interpreter:");
        self.session.start();
        while self.session.is_running() {
            let compiled = self
                .session
                .handle(reader, &self.translator, &mut self.console)?;
            if let Some(code) = compiled {
                self.execute(&code);
            }
        }
        Ok(())
    }

    /// Execute compiled code, starting the executor on first use.
    pub fn execute(&mut self, compiled: &str) {
        if self.debug {
            self.console.info(format!("Executing {compiled:?}"));
        }
        let runner = match self.runner.take() {
            Some(runner) => runner,
            None => self.start_runner(),
        };
        self.runner.insert(runner).run(compiled, &mut self.console);
    }

    fn start_runner(&mut self) -> SessionExecutor<C> {
        let exit = C::Value::from(self.session.run_flag());
        let mut runner =
            SessionExecutor::with_bindings((self.make_context)(), [(EXIT_BINDING.to_string(), exit)]);
        tracing::debug!("session executor started");
        match self.translator.header() {
            Ok(header) => runner.run(&header, &mut self.console),
            Err(err) => self.console.error(err),
        }
        runner
    }
}

impl<T, C> Backend for Driver<T, C>
where
    T: Translator,
    C: ExecutionContext,
    C::Value: From<RunFlag>,
{
    fn translate(&mut self, code: &str, mode: Mode) -> Result<String, TranslateError> {
        self.translator.translate(code, mode)
    }

    fn header(&mut self) -> Result<String, TranslateError> {
        self.translator.header()
    }

    fn execute(&mut self, compiled: &str) {
        Driver::execute(self, compiled);
    }

    fn console(&mut self) -> &mut Console {
        &mut self.console
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::{Captured, MemWriter, captured_text};
    use crate::session::BufferedInput;
    use crate::shell::ShellContext;
    use crate::shell::env::Environment;
    use std::fs;
    use std::io::Cursor;

    struct Harness {
        driver: Driver<PassthroughTranslator, ShellContext>,
        shell_out: Captured,
        out: Captured,
        err: Captured,
    }

    fn harness() -> Harness {
        let (console, out, err) = Console::captured();
        let (_, shell_out) = MemWriter::with_handle();
        let handle = shell_out.clone();
        let driver = Driver::new(PassthroughTranslator::default(), console, move || {
            ShellContext::with_env(Environment::empty())
                .with_output(Box::new(MemWriter::from_handle(handle.clone())))
        });
        Harness {
            driver,
            shell_out,
            out,
            err,
        }
    }

    fn lines(text: &str) -> BufferedInput<Cursor<Vec<u8>>> {
        BufferedInput::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn test_prompt_keeps_bindings_between_lines() {
        let mut h = harness();

        let result = h.driver.start_prompt(&mut lines("x=5\necho $x\nexit\n"));

        assert!(result.is_ok());
        assert_eq!(captured_text(&h.shell_out), "5\n");
        assert_eq!(captured_text(&h.out), "[husk] Interpreter:\n");
        assert!(captured_text(&h.err).is_empty());
        assert!(!h.driver.session().is_running());
    }

    #[test]
    fn test_prompt_continues_incomplete_lines() {
        let mut h = harness();

        h.driver
            .start_prompt(&mut lines("echo a |\nwc\nexit\n"))
            .unwrap();

        assert_eq!(captured_text(&h.shell_out), "1 1 2\n");
    }

    #[test]
    fn test_prompt_ends_with_reader_error() {
        let mut h = harness();

        let err = h.driver.start_prompt(&mut lines("y=1\n")).unwrap_err();

        assert!(err.downcast_ref::<std::io::Error>().is_some());
        let runner = h.driver.runner().unwrap();
        assert_eq!(runner.binding("y").and_then(|v| v.as_text()), Some("1"));
    }

    #[test]
    fn test_runner_starts_with_exit_and_header() {
        let mut h = harness();
        assert!(h.driver.runner().is_none());

        h.driver.execute("true_value=1");

        let runner = h.driver.runner().unwrap();
        assert!(runner.binding(EXIT_BINDING).is_some());
        assert_eq!(
            runner.binding("HUSK_VERSION").and_then(|v| v.as_text()),
            Some(VERSION)
        );
    }

    #[test]
    fn test_inline_code_runs_before_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("show.hsk");
        fs::write(&src, "echo from-file $greeting").unwrap();
        let mut h = harness();
        let args = Args {
            paths: vec![src],
            run: true,
            code: vec!["greeting=hi".into(), "echo inline".into()],
            ..Args::default()
        };

        h.driver.parse(&args);

        assert_eq!(captured_text(&h.shell_out), "inline\nfrom-file hi\n");
        assert!(dir.path().join("show.sh").exists());
        let out = captured_text(&h.out);
        assert!(out.contains("Compiling '"));
        assert!(out.contains("Compiled '"));
    }

    #[test]
    fn test_version_and_bad_inline_code_are_reported() {
        let mut h = harness();
        let args = Args {
            version: true,
            code: vec!["| wc".into()],
            ..Args::default()
        };

        h.driver.parse(&args);

        assert_eq!(captured_text(&h.out), format!("[husk] Version {VERSION}\n"));
        assert!(captured_text(&h.err).starts_with("[husk] Error: invalid input"));
        assert!(h.driver.runner().is_none());
    }

    #[test]
    fn test_debug_echoes_compiled_code() {
        let mut h = harness();
        h.driver = h.driver.with_debug(true);

        h.driver.execute("echo hi");

        assert!(captured_text(&h.out).contains("Executing \"echo hi\""));
        assert_eq!(captured_text(&h.shell_out), "hi\n");
    }

    #[test]
    fn test_prompt_is_default_only_without_other_work() {
        assert!(Args::default().wants_prompt());
        let with_code = Args {
            code: vec!["x=1".into()],
            ..Args::default()
        };
        assert!(!with_code.wants_prompt());
        let forced = Args {
            interact: true,
            ..with_code
        };
        assert!(forced.wants_prompt());
        let version = Args {
            version: true,
            ..Args::default()
        };
        assert!(!version.wants_prompt());
    }

    #[test]
    fn test_builds_default_translator() {
        let args = Args::default();
        // Falls back to the built-in translator unless HUSK_TRANSLATOR is set.
        if std::env::var(TRANSLATOR_VAR).is_err() {
            let t = build_translator(&args).unwrap();
            assert_eq!(t.translate("echo a  ", Mode::Single).unwrap(), "echo a");
        }
        let missing = Args {
            translator: Some("no-such-translator-4242".into()),
            ..Args::default()
        };
        assert!(build_translator(&missing).is_err());
    }

    #[test]
    fn test_prompt_end_maps_to_exit_status() {
        assert_eq!(prompt_status(Ok(())).unwrap(), 0);
        assert_eq!(prompt_status(Err(ReadlineError::Eof.into())).unwrap(), 0);
        assert_eq!(prompt_status(Err(ReadlineError::Interrupted.into())).unwrap(), 130);

        let broken = std::io::Error::other("terminal gone");
        let err = prompt_status(Err(ReadlineError::Io(broken).into())).unwrap_err();
        assert!(err.to_string().contains("terminal gone"));
    }
}

use std::io;
use std::process::ExitCode;

use husk::Console;
use husk::cli::{self, Args, Driver};
use husk::session::Editor;
use husk::shell::ShellContext;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Respects RUST_LOG; stdout stays reserved for program output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Args = argh::from_env();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let translator = cli::build_translator(args)?;
    let mut driver =
        Driver::new(translator, Console::stdio(), ShellContext::new).with_debug(args.debug);

    driver.parse(args);
    if !args.wants_prompt() {
        return Ok(ExitCode::SUCCESS);
    }

    let mut editor = Editor::new()?;
    let status = cli::prompt_status(driver.start_prompt(&mut editor))?;
    Ok(ExitCode::from(status))
}

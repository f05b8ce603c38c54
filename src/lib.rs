//! husk: an interactive front end and batch compiler for husk sources.
//!
//! Source text goes through a [`Translator`] into husk shell, a small
//! sh-like command language. Compiled fragments run in one long-lived
//! session whose bindings are kept by a [`SessionExecutor`], separate from
//! the ambient environment the fragments see while they run. The same
//! session serves the interactive prompt ([`InteractiveSession`]), inline
//! `-c` code and files compiled with `--run` ([`Orchestrator`]).

pub mod cli;
pub mod console;
pub mod executor;
pub mod external;
mod io_adapters;
pub mod orchestrator;
pub mod session;
pub mod shell;
pub mod translate;

pub use console::Console;
pub use executor::{ExecutionContext, SessionExecutor};
pub use io_adapters::{Captured, MemReader, MemWriter, captured_text};
pub use orchestrator::Orchestrator;
pub use session::InteractiveSession;
pub use translate::Translator;

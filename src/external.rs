//! Locating and spawning external programs.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread;

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo` on Unix or any `./`-prefixed path on other platforms: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|candidate| candidate.is_file())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

/// Resolve `program` against the process `PATH`.
pub fn which(program: &str) -> Option<PathBuf> {
    let search_paths = std::env::var_os("PATH").unwrap_or_default();
    find_command_path(&search_paths, Path::new(program)).map(Cow::into_owned)
}

/// Shell-style exit code of a finished process.
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = exit_status.signal() {
        128 + signal
    } else if exit_status.core_dumped() {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Run `cmd` to completion, feeding `input` on stdin and capturing stdout and
/// stderr. Without input the child inherits the parent's stdin.
///
/// Input is written from a scoped thread while the output pipes are drained,
/// so filters producing more than a pipe buffer of output do not stall. A
/// child that exits without reading all of its input is not an error.
pub fn pipe_through(cmd: &mut Command, input: Option<&[u8]>) -> Result<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });

    let program = cmd.get_program().to_string_lossy().into_owned();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {}", program))?;
    let stdin = child.stdin.take();

    let (output, written) = thread::scope(|scope| {
        let writer = match (input, stdin) {
            (Some(buf), Some(mut stdin)) => Some(scope.spawn(move || stdin.write_all(buf))),
            _ => None,
        };
        let output = child.wait_with_output();
        let written = writer.map(|handle| {
            handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")))
        });
        (output, written)
    });

    let output = output.with_context(|| format!("failed to wait for {}", program))?;
    match written {
        Some(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!(%program, "child closed stdin early");
        }
        Some(Err(e)) => {
            return Err(e).with_context(|| format!("failed to write to {}", program));
        }
        _ => {}
    }
    tracing::debug!(%program, status = exit_code(output.status), "external process finished");
    Ok(output)
}

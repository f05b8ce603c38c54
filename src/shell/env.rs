use crate::executor::Namespace;
use crate::shell::Value;
use std::env as stdenv;
use std::path::PathBuf;

/// Name of the local holding the exit status of the last command.
pub const STATUS: &str = "?";

/// Variables visible to husk shell code.
///
/// `globals` is the ambient namespace seen by every fragment; `locals` is the
/// frame of the fragment being evaluated and always holds [`STATUS`].
#[derive(Debug, Clone)]
pub struct Environment {
    pub globals: Namespace<Value>,
    pub locals: Namespace<Value>,
    /// Working directory for relative paths and external commands.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state: every environment variable becomes
    /// a global.
    pub fn new() -> Self {
        let mut env = Self::empty();
        for (k, v) in stdenv::vars() {
            env.set_var(k, v);
        }
        env
    }

    /// No globals at all; the working directory is still the process one.
    pub fn empty() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut env = Self {
            globals: Namespace::new(),
            locals: Namespace::new(),
            current_dir,
        };
        env.reset_frame();
        env
    }

    /// Start a fresh local frame.
    pub fn reset_frame(&mut self) {
        self.locals.clear();
        self.set_status(0);
    }

    pub fn set_status(&mut self, code: i32) {
        self.locals
            .insert(STATUS.to_string(), Value::Text(code.to_string()));
    }

    /// Locals shadow globals.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }

    /// Text of a variable; capabilities have none.
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.lookup(name)
            .and_then(|v| v.as_text())
            .map(str::to_string)
    }

    /// Set or override a global.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<Value>) {
        self.globals.insert(key.into(), val.into());
    }

    pub fn set_local(&mut self, key: impl Into<String>, val: impl Into<Value>) {
        self.locals.insert(key.into(), val.into());
    }

    /// Remove a name from both scopes. The status local cannot be removed.
    pub fn unset(&mut self, name: &str) {
        if name != STATUS {
            self.locals.remove(name);
        }
        self.globals.remove(name);
    }

    /// Text globals, as handed to child processes.
    pub fn exported(&self) -> impl Iterator<Item = (&str, &str)> {
        self.globals
            .iter()
            .filter_map(|(k, v)| v.as_text().map(|t| (k.as_str(), t)))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

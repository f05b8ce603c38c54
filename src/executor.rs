//! Running compiled fragments against a binding store that outlives them.
//!
//! A fragment sees every binding made by earlier fragments, and whatever it
//! defines is moved out of the ambient namespace into the store once it
//! finishes. The ambient globals are put back exactly as they were before the
//! run, so the host never observes a fragment's temporary names.

use crate::console::Console;
use std::collections::{HashMap, HashSet};

/// Name to value mapping used for both the binding store and ambient scopes.
pub type Namespace<V> = HashMap<String, V>;

/// The ambient environment fragments are evaluated in.
///
/// Implementors expose their global and local scopes as plain maps and know
/// how to evaluate a piece of compiled code against them. The reconciliation
/// between runs is done by [`SessionExecutor`], not by the context.
pub trait ExecutionContext {
    type Value: Clone;

    /// Ambient global names visible to evaluated code.
    fn globals(&self) -> &Namespace<Self::Value>;

    fn globals_mut(&mut self) -> &mut Namespace<Self::Value>;

    /// Names local to the most recent evaluation.
    fn locals(&self) -> &Namespace<Self::Value>;

    /// Evaluate `code`. Effects made before a failure are kept.
    fn evaluate(&mut self, code: &str) -> anyhow::Result<()>;
}

/// Owner of the binding store; executes one fragment at a time.
pub struct SessionExecutor<C: ExecutionContext> {
    context: C,
    bindings: Namespace<C::Value>,
}

impl<C: ExecutionContext> SessionExecutor<C> {
    pub fn new(context: C) -> Self {
        Self {
            context,
            bindings: Namespace::new(),
        }
    }

    /// Create an executor whose store starts with `extras`.
    pub fn with_bindings<I>(context: C, extras: I) -> Self
    where
        I: IntoIterator<Item = (String, C::Value)>,
    {
        Self {
            context,
            bindings: extras.into_iter().collect(),
        }
    }

    pub fn bindings(&self) -> &Namespace<C::Value> {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&C::Value> {
        self.bindings.get(name)
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Execute `code` and fold its effects into the store.
    ///
    /// A failing fragment is reported on `console` and never returned: the
    /// bindings it made before failing are reconciled like any other.
    pub fn run(&mut self, code: &str, console: &mut Console) {
        let ambient_globals = self.context.globals().clone();
        let ambient_locals: HashSet<String> = self.context.locals().keys().cloned().collect();

        let globals = self.context.globals_mut();
        for (name, value) in &self.bindings {
            globals.insert(name.clone(), value.clone());
        }

        if let Err(err) = self.context.evaluate(code) {
            tracing::debug!(error = %err, "fragment failed");
            console.error(format!("{err:#}"));
        }

        let mut overrides = Namespace::new();
        let names: Vec<String> = self.context.globals().keys().cloned().collect();
        for name in names {
            if self.bindings.contains_key(&name) {
                if let Some(value) = self.context.globals_mut().remove(&name) {
                    self.bindings.insert(name, value);
                }
            } else if !ambient_globals.contains_key(&name) {
                if let Some(value) = self.context.globals_mut().remove(&name) {
                    overrides.insert(name, value);
                }
            }
        }

        for (name, value) in self.context.locals() {
            if self.bindings.contains_key(name) || !ambient_locals.contains(name) {
                self.bindings.insert(name.clone(), value.clone());
            }
        }

        // Step 4 already removed these from the globals; merging twice is harmless.
        self.bindings.extend(overrides);

        let globals = self.context.globals_mut();
        globals.retain(|name, _| ambient_globals.contains_key(name));
        globals.extend(ambient_globals);

        tracing::trace!(bindings = self.bindings.len(), "fragment reconciled");
    }
}

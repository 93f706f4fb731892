//! Named collection of native functions.
//!
//! The registry owns every [`FunctionCaller`] it creates and installs them
//! into a [`State`] as globals. Callers stay pinned at a stable address for
//! as long as the registry lives, so the only teardown rule is: drop every
//! state a registry was installed into before dropping the registry.

use std::pin::Pin;

use rustc_hash::FxHashMap;
use stackbind_core::{ScriptError, State};
use thiserror::Error;

use crate::binder::ArgList;
use crate::caller::FunctionCaller;
use crate::dispatch::NativeCallable;
use crate::policy::{PolicyTag, ScriptReturn};

/// Errors from registering or installing functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("function '{name}' is already registered")]
    Duplicate { name: String },

    #[error("no function named '{name}' is registered")]
    NotFound { name: String },

    #[error("failed to install '{name}': {source}")]
    Install {
        name: String,
        #[source]
        source: ScriptError,
    },
}

/// Owns registered native functions, keyed by name.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    callers: FxHashMap<String, Pin<Box<FunctionCaller>>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name` with the default (copy) return policy.
    pub fn register<Func, Args, R>(
        &mut self,
        name: impl Into<String>,
        func: Func,
    ) -> Result<(), RegistrationError>
    where
        Func: NativeCallable<Args, R>,
        Args: ArgList,
        R: ScriptReturn,
    {
        self.insert(FunctionCaller::new(name, func))
    }

    /// Register `func` under `name` with the return policy resolved from `tags`.
    pub fn register_with_policies<Func, Args, R>(
        &mut self,
        name: impl Into<String>,
        func: Func,
        tags: &[PolicyTag],
    ) -> Result<(), RegistrationError>
    where
        Func: NativeCallable<Args, R>,
        Args: ArgList,
        R: ScriptReturn,
    {
        self.insert(FunctionCaller::with_policies(name, func, tags))
    }

    /// Take ownership of an already built caller.
    pub fn insert(&mut self, caller: Pin<Box<FunctionCaller>>) -> Result<(), RegistrationError> {
        let name = caller.name().to_string();
        if self.callers.contains_key(&name) {
            tracing::warn!(function = %name, "duplicate registration rejected");
            return Err(RegistrationError::Duplicate { name });
        }
        self.callers.insert(name, caller);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Pin<&FunctionCaller>> {
        self.callers.get(name).map(|caller| caller.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.callers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Install the function `name` into `state` as a global.
    ///
    /// # Safety
    ///
    /// `state` must be dropped before this registry.
    pub unsafe fn install(&self, name: &str, state: &mut State) -> Result<(), RegistrationError> {
        let caller = self.get(name).ok_or_else(|| RegistrationError::NotFound {
            name: name.to_string(),
        })?;
        // SAFETY: forwarded to our caller; the registry keeps the caller pinned.
        unsafe { caller.install(state) }.map_err(|source| RegistrationError::Install {
            name: name.to_string(),
            source,
        })
    }

    /// Install every registered function into `state`, in name order.
    ///
    /// Returns the number of functions installed.
    ///
    /// # Safety
    ///
    /// `state` must be dropped before this registry.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub unsafe fn install_all(&self, state: &mut State) -> Result<usize, RegistrationError> {
        let names = self.names();
        for name in &names {
            // SAFETY: forwarded to our caller.
            unsafe { self.install(name, state) }?;
        }
        tracing::debug!(count = names.len(), "installed native functions");
        Ok(names.len())
    }
}

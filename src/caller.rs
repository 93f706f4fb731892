//! Registration shim between the engine and a typed native callable.
//!
//! A [`FunctionCaller`] owns one callable and its resolved return policy.
//! The engine only ever sees a closure whose single upvalue is the caller's
//! address as light user data. When the closure runs, a trampoline
//! monomorphized for the callable's signature recovers the caller from that
//! upvalue and dispatches the call.
//!
//! Because the engine holds a raw address, a caller is pinned for its whole
//! life and is neither `Clone` nor movable:
//!
//! ```compile_fail
//! use stackbind::FunctionCaller;
//!
//! let caller = FunctionCaller::new("f", || 1i32);
//! let copy = (*caller).clone();
//! ```
//!
//! ```compile_fail
//! use std::pin::Pin;
//! use stackbind::FunctionCaller;
//!
//! let caller = FunctionCaller::new("f", || 1i32);
//! let unpinned = Pin::into_inner(caller);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomPinned;
use std::pin::Pin;

use stackbind_core::{ConversionError, NativeFunction, ScriptError, ScriptResult, State, Value};

use crate::binder::ArgList;
use crate::codec::TypeCategory;
use crate::dispatch::{NativeCallable, dispatch};
use crate::policy::{PolicyTag, ReturnPolicy, ScriptReturn, resolve};

/// Parameter and result categories of a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [TypeCategory],
    pub result: Option<TypeCategory>,
}

impl Signature {
    /// Signature of a callable taking `Args` and returning `R`.
    pub fn of<Args: ArgList, R: ScriptReturn>() -> Self {
        Signature {
            params: Args::CATEGORIES,
            result: R::CATEGORY,
        }
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A named native callable, ready to be exposed to the engine.
pub struct FunctionCaller {
    name: String,
    policy: ReturnPolicy,
    signature: Signature,
    trampoline: NativeFunction,
    callable: Box<dyn Any>,
    _pinned: PhantomPinned,
}

impl FunctionCaller {
    /// Wrap `func` under `name`, returning results by copy.
    pub fn new<Func, Args, R>(name: impl Into<String>, func: Func) -> Pin<Box<Self>>
    where
        Func: NativeCallable<Args, R>,
        Args: ArgList,
        R: ScriptReturn,
    {
        Self::with_policies(name, func, &[])
    }

    /// Wrap `func` under `name` with the return policy resolved from `tags`.
    pub fn with_policies<Func, Args, R>(
        name: impl Into<String>,
        func: Func,
        tags: &[PolicyTag],
    ) -> Pin<Box<Self>>
    where
        Func: NativeCallable<Args, R>,
        Args: ArgList,
        R: ScriptReturn,
    {
        let name = name.into();
        let policy = resolve(tags);
        let signature = Signature::of::<Args, R>();
        tracing::debug!(
            function = %name,
            ?policy,
            arity = signature.arity(),
            "created native function"
        );
        Box::pin(FunctionCaller {
            name,
            policy,
            signature,
            trampoline: trampoline::<Func, Args, R>,
            callable: Box::new(func),
            _pinned: PhantomPinned,
        })
    }

    /// The name the function is installed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved return policy.
    pub fn policy(&self) -> ReturnPolicy {
        self.policy
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Push a closure that calls this function.
    ///
    /// Consumes no stack values and leaves exactly one, the closure.
    ///
    /// # Safety
    ///
    /// The engine keeps this caller's address. The caller must stay alive
    /// until the pushed closure, and every copy of it the engine makes, can
    /// no longer be called. Dropping `state` before the caller satisfies this.
    pub unsafe fn push_function(self: Pin<&Self>, state: &mut State) -> ScriptResult<()> {
        let address = self.get_ref() as *const FunctionCaller as *const ();
        state.push_light_user_data(address);
        state.push_native_closure(self.trampoline, 1)
    }

    /// Push the closure and store it as the global named [`name`](Self::name).
    ///
    /// # Safety
    ///
    /// Same contract as [`push_function`](Self::push_function).
    pub unsafe fn install(self: Pin<&Self>, state: &mut State) -> ScriptResult<()> {
        // SAFETY: forwarded to our caller.
        unsafe { self.push_function(state) }?;
        state.set_global(&self.name)?;
        tracing::debug!(function = %self.name, "installed native function");
        Ok(())
    }
}

impl fmt::Debug for FunctionCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCaller")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

fn trampoline<Func, Args, R>(state: &mut State) -> ScriptResult<usize>
where
    Func: NativeCallable<Args, R>,
    Args: ArgList,
    R: ScriptReturn,
{
    let address = match state.upvalue(1) {
        Some(Value::LightUserData(address)) => *address,
        other => {
            return Err(ConversionError::TypeMismatch {
                expected: "light userdata",
                actual: other.map_or("no value", Value::type_name),
            }
            .into());
        }
    };
    // SAFETY: only push_function creates closures over this trampoline, and its
    // contract keeps the pinned caller alive while the closure can run.
    let caller = unsafe { &*(address as *const FunctionCaller) };
    let func = caller.callable.downcast_ref::<Func>().ok_or_else(|| {
        ScriptError::runtime(format!(
            "native function '{}' has an unexpected callable",
            caller.name
        ))
    })?;
    tracing::trace!(function = %caller.name, nargs = state.top(), "native call");
    dispatch::<Func, Args, R>(state, func, caller.policy)
}

//! Typed bindings between native Rust functions and a stack-based script
//! engine.
//!
//! A native function with ordinary Rust parameter and result types is
//! wrapped in a [`FunctionCaller`] (or registered in a [`FunctionRegistry`])
//! and installed into a [`State`]. Each call from the script side reads the
//! arguments from the call frame, invokes the function and pushes its result,
//! following the registration's [`ReturnPolicy`](policy::ReturnPolicy).
//!
//! ```
//! use stackbind::prelude::*;
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register("add", |a: i32, b: i32| a + b).unwrap();
//!
//! let mut state = State::new();
//! // SAFETY: `state` is dropped before `registry`.
//! unsafe { registry.install_all(&mut state) }.unwrap();
//!
//! let results = state
//!     .call_global("add", [Value::Integer(2), Value::Integer(3)])
//!     .unwrap();
//! assert_eq!(results, vec![Value::Integer(5)]);
//! ```

pub mod binder;
pub mod caller;
pub mod codec;
pub mod dispatch;
mod macros;
pub mod policy;
pub mod registry;

pub use stackbind_core::{
    Closure, ConversionError, NativeFunction, ScriptError, ScriptResult, StackIndex, State,
    StateConfig, TypeTag, UserBorrow, UserHandle, UserType, Value,
};

pub use binder::{ARG_BASE, ArgList};
pub use caller::{FunctionCaller, Signature};
pub use codec::{FromStack, StrView, ToStack, TypeCategory, UserMut, UserRef};
pub use dispatch::{NativeCallable, dispatch};
pub use policy::{PolicyTag, ReturnPolicy, ScriptReturn};
pub use registry::{FunctionRegistry, RegistrationError};

#[doc(hidden)]
pub mod __private {
    pub use num_enum;
}

pub mod prelude {
    pub use crate::caller::FunctionCaller;
    pub use crate::codec::{StrView, UserMut, UserRef};
    pub use crate::policy::{PolicyTag, ReturnPolicy};
    pub use crate::registry::{FunctionRegistry, RegistrationError};
    pub use crate::{script_enum, user_type};
    pub use stackbind_core::{
        ScriptError, ScriptResult, State, StateConfig, UserHandle, UserType, Value,
    };
}

//! Engine-side collaborators of the stackbind marshaling layer.
//!
//! This crate provides the pieces a binding layer consumes but does not own:
//!
//! - [`State`]: a stack-based engine with call frames, native closures bound
//!   to upvalues, globals and a protected call entry point
//! - [`Value`]: one dynamically typed stack slot
//! - [`UserHandle`]: type-tagged handle to a native object, owned or borrowed
//! - [`ScriptError`]: everything that can travel through the engine's error
//!   channel

mod config;
mod error;
mod state;
mod type_tag;
mod user_handle;
mod value;

pub use config::StateConfig;
pub use error::{ConversionError, ScriptError, ScriptResult};
pub use state::{StackIndex, State};
pub use type_tag::TypeTag;
pub use user_handle::{UserBorrow, UserHandle, UserType};
pub use value::{Closure, NativeFunction, Value};

//! Argument binding.
//!
//! Maps the declared parameter list of a native function onto the arguments
//! of the current call frame: parameter `i` (0-based, declaration order) is
//! read from slot `ARG_BASE + i`. Reading stops at the first failure.

use stackbind_core::{ScriptResult, StackIndex, State};

use crate::codec::{FromStack, TypeCategory};

/// Slot holding the first argument of a call.
pub const ARG_BASE: StackIndex = 1;

/// A tuple of parameter types that can be read from a call frame.
pub trait ArgList: Sized + 'static {
    /// Category of every parameter, in declaration order.
    const CATEGORIES: &'static [TypeCategory];

    /// Number of parameters.
    const ARITY: usize = Self::CATEGORIES.len();

    /// Read every parameter from the current frame.
    fn bind(state: &State) -> ScriptResult<Self>;
}

macro_rules! impl_arg_list {
    ($($idx:tt $A:ident),*) => {
        impl<$($A: FromStack),*> ArgList for ($($A,)*) {
            const CATEGORIES: &'static [TypeCategory] = &[$($A::CATEGORY),*];

            #[inline]
            #[allow(unused_variables)]
            fn bind(state: &State) -> ScriptResult<Self> {
                Ok(($($A::from_stack(state, ARG_BASE + $idx)?,)*))
            }
        }
    };
}

impl_arg_list!();
impl_arg_list!(0 A);
impl_arg_list!(0 A, 1 B);
impl_arg_list!(0 A, 1 B, 2 C);
impl_arg_list!(0 A, 1 B, 2 C, 3 D);
impl_arg_list!(0 A, 1 B, 2 C, 3 D, 4 E);
impl_arg_list!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_arg_list!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_arg_list!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);

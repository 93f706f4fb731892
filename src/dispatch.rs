//! Call dispatch: bind arguments, invoke the callable, push its result.

use stackbind_core::{ScriptResult, State};

use crate::binder::ArgList;
use crate::policy::{ReturnPolicy, ScriptReturn};

/// A native callable taking the parameter tuple `Args` and producing `R`.
///
/// Implemented for every `Fn` with up to eight parameters, so plain
/// functions and closures can be registered directly.
pub trait NativeCallable<Args, R>: 'static {
    /// Call with already bound arguments.
    fn invoke(&self, args: Args) -> R;
}

macro_rules! impl_native_callable {
    ($($A:ident $a:ident),*) => {
        impl<Func, R, $($A),*> NativeCallable<($($A,)*), R> for Func
        where
            Func: Fn($($A),*) -> R + 'static,
        {
            #[inline]
            fn invoke(&self, ($($a,)*): ($($A,)*)) -> R {
                (self)($($a),*)
            }
        }
    };
}

impl_native_callable!();
impl_native_callable!(A a);
impl_native_callable!(A a, B b);
impl_native_callable!(A a, B b, C c);
impl_native_callable!(A a, B b, C c, D d);
impl_native_callable!(A a, B b, C c, D d, E e);
impl_native_callable!(A a, B b, C c, D d, E e, F f);
impl_native_callable!(A a, B b, C c, D d, E e, F f, G g);
impl_native_callable!(A a, B b, C c, D d, E e, F f, G g, H h);

/// Run one call of `func` against the current frame.
///
/// Returns the number of results pushed: 0 when `R` produces no value,
/// otherwise 1. A binding or conversion failure is returned before `func`
/// runs and leaves the stack untouched.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn dispatch<Func, Args, R>(
    state: &mut State,
    func: &Func,
    policy: ReturnPolicy,
) -> ScriptResult<usize>
where
    Func: NativeCallable<Args, R>,
    Args: ArgList,
    R: ScriptReturn,
{
    let args = Args::bind(state)?;
    let result = func.invoke(args).into_return(policy)?;
    match result {
        Some(value) => {
            state.push_value(value);
            Ok(1)
        }
        None => Ok(0),
    }
}

//! Return policies and return-value conversion.
//!
//! A registration carries a list of [`PolicyTag`]s. [`resolve`] picks the
//! first tag that names a return policy; without one, results are copied.
//!
//! The policy only matters for results that refer to native storage:
//!
//! - `&'static T` for a user type: [`ReturnPolicy::Copy`] hands the script a
//!   clone, [`ReturnPolicy::InternalRef`] hands it a handle aliasing `*T`.
//! - `&'static UserHandle`: a duplicate or an alias of the handle.
//! - `Rc<UserHandle>`, [`UserRef<T>`] and [`UserMut<T>`]: a duplicate of the
//!   object, or the very handle the script passed in. Returning an argument
//!   under [`ReturnPolicy::InternalRef`] keeps its identity.
//!
//! Every other result type converts the same way under both policies.

use std::rc::Rc;

use stackbind_core::{ScriptError, ScriptResult, UserHandle, UserType, Value};

use crate::codec::{StrView, ToStack, TypeCategory, UserMut, UserRef};

/// Marker attached to a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyTag {
    /// Return results by value.
    ReturnCopy,
    /// Return reference results as handles aliasing native storage.
    ReturnInternalRef,
    /// Any other marker; ignored by return policy resolution.
    Named(&'static str),
}

impl PolicyTag {
    /// The return policy this tag selects, if it is a return policy tag.
    pub fn return_policy(self) -> Option<ReturnPolicy> {
        match self {
            PolicyTag::ReturnCopy => Some(ReturnPolicy::Copy),
            PolicyTag::ReturnInternalRef => Some(ReturnPolicy::InternalRef),
            PolicyTag::Named(_) => None,
        }
    }
}

/// How a result that refers to native storage is handed to the script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReturnPolicy {
    #[default]
    Copy,
    InternalRef,
}

/// First return policy tag in `tags`, or [`ReturnPolicy::Copy`].
///
/// ```
/// use stackbind::policy::{PolicyTag, ReturnPolicy, resolve};
///
/// let tags = [
///     PolicyTag::Named("doc"),
///     PolicyTag::ReturnInternalRef,
///     PolicyTag::ReturnCopy,
/// ];
/// assert_eq!(resolve(&tags), ReturnPolicy::InternalRef);
/// assert_eq!(resolve(&[]), ReturnPolicy::Copy);
/// ```
pub fn resolve(tags: &[PolicyTag]) -> ReturnPolicy {
    tags.iter()
        .find_map(|tag| tag.return_policy())
        .unwrap_or_default()
}

/// Result types a bound function may return.
///
/// `into_return` yields the value to push, or `None` for functions that
/// produce no result.
pub trait ScriptReturn {
    /// Category of the pushed value; `None` when nothing is pushed or the
    /// kind depends on the value.
    const CATEGORY: Option<TypeCategory>;

    /// Convert into the value handed to the script.
    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>>;
}

impl ScriptReturn for () {
    const CATEGORY: Option<TypeCategory> = None;

    fn into_return(self, _policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        Ok(None)
    }
}

macro_rules! impl_return_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ScriptReturn for $ty {
                const CATEGORY: Option<TypeCategory> = Some(<$ty as ToStack>::CATEGORY);

                #[inline]
                fn into_return(self, _policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
                    Ok(Some(self.to_value()))
                }
            }
        )*
    };
}

impl_return_by_value!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, bool, f32, f64, String, StrView,
);

impl ScriptReturn for &str {
    const CATEGORY: Option<TypeCategory> = Some(TypeCategory::StringView);

    fn into_return(self, _policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        Ok(Some(self.to_value()))
    }
}

impl ScriptReturn for UserHandle {
    const CATEGORY: Option<TypeCategory> = Some(TypeCategory::UserType);

    fn into_return(self, _policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        Ok(Some(Value::from(self)))
    }
}

impl ScriptReturn for &'static UserHandle {
    const CATEGORY: Option<TypeCategory> = Some(TypeCategory::UserType);

    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        let handle = match policy {
            ReturnPolicy::Copy => self.duplicate()?,
            ReturnPolicy::InternalRef => self.alias(),
        };
        Ok(Some(Value::from(handle)))
    }
}

impl ScriptReturn for Rc<UserHandle> {
    const CATEGORY: Option<TypeCategory> = Some(TypeCategory::UserType);

    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        match policy {
            ReturnPolicy::Copy => Ok(Some(Value::from(self.duplicate()?))),
            ReturnPolicy::InternalRef => Ok(Some(Value::UserData(self))),
        }
    }
}

impl<T: UserType> ScriptReturn for UserRef<T> {
    const CATEGORY: Option<TypeCategory> = Some(TypeCategory::UserType);

    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        self.into_handle().into_return(policy)
    }
}

impl<T: UserType> ScriptReturn for UserMut<T> {
    const CATEGORY: Option<TypeCategory> = Some(TypeCategory::UserType);

    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        self.into_handle().into_return(policy)
    }
}

/// `None` and a `Some` holding a value-less result both push nil, so an
/// optional result always produces exactly one value.
impl<R: ScriptReturn> ScriptReturn for Option<R> {
    const CATEGORY: Option<TypeCategory> = R::CATEGORY;

    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        match self {
            Some(value) => Ok(Some(value.into_return(policy)?.unwrap_or(Value::Nil))),
            None => Ok(Some(Value::Nil)),
        }
    }
}

impl<R, E> ScriptReturn for Result<R, E>
where
    R: ScriptReturn,
    E: Into<ScriptError>,
{
    const CATEGORY: Option<TypeCategory> = R::CATEGORY;

    fn into_return(self, policy: ReturnPolicy) -> ScriptResult<Option<Value>> {
        match self {
            Ok(value) => value.into_return(policy),
            Err(err) => Err(err.into()),
        }
    }
}

/// Result conversion for a user value returned by value.
///
/// The value is moved into an owning handle under either policy.
pub fn return_user_value<T: UserType>(value: T, _policy: ReturnPolicy) -> Value {
    Value::from(UserHandle::make_copy(value))
}

/// Result conversion for a user value returned by reference.
pub fn return_user_ref<T: UserType>(value: &'static T, policy: ReturnPolicy) -> Value {
    let handle = match policy {
        ReturnPolicy::Copy => UserHandle::make_copy(value.clone()),
        // SAFETY: 'static storage is never freed or moved.
        ReturnPolicy::InternalRef => unsafe { UserHandle::make_ref(value) },
    };
    Value::from(handle)
}

//! Declaration macros for user types and enums.

/// Declare a native type as a script user type.
///
/// Implements [`UserType`](crate::UserType) and makes the type usable as a
/// parameter (owned copy), as a by-value result and as a `&'static` result
/// whose handling follows the registration's return policy.
///
/// ```
/// use stackbind::{FunctionCaller, UserRef, user_type};
///
/// #[derive(Clone)]
/// struct Vec2 {
///     x: f64,
///     y: f64,
/// }
///
/// user_type!(Vec2);
///
/// let length = FunctionCaller::new("length", |v: UserRef<Vec2>| v.x.hypot(v.y));
/// let scale = FunctionCaller::new("scale", |v: Vec2, k: f64| Vec2 {
///     x: v.x * k,
///     y: v.y * k,
/// });
/// # let _ = (length, scale);
/// ```
///
/// The script-visible name defaults to the type's name and can be given
/// explicitly with `user_type!(Vec2 as "vector")`.
#[macro_export]
macro_rules! user_type {
    ($ty:ty as $name:expr) => {
        impl $crate::UserType for $ty {
            const NAME: &'static str = $name;
        }

        impl $crate::codec::FromStack for $ty {
            const CATEGORY: $crate::codec::TypeCategory = $crate::codec::TypeCategory::UserType;

            fn from_stack(
                state: &$crate::State,
                index: $crate::StackIndex,
            ) -> $crate::ScriptResult<Self> {
                $crate::codec::read_user_value::<$ty>(state, index)
            }
        }

        impl $crate::policy::ScriptReturn for $ty {
            const CATEGORY: ::core::option::Option<$crate::codec::TypeCategory> =
                ::core::option::Option::Some($crate::codec::TypeCategory::UserType);

            fn into_return(
                self,
                policy: $crate::policy::ReturnPolicy,
            ) -> $crate::ScriptResult<::core::option::Option<$crate::Value>> {
                ::core::result::Result::Ok(::core::option::Option::Some(
                    $crate::policy::return_user_value(self, policy),
                ))
            }
        }

        impl $crate::policy::ScriptReturn for &'static $ty {
            const CATEGORY: ::core::option::Option<$crate::codec::TypeCategory> =
                ::core::option::Option::Some($crate::codec::TypeCategory::UserType);

            fn into_return(
                self,
                policy: $crate::policy::ReturnPolicy,
            ) -> $crate::ScriptResult<::core::option::Option<$crate::Value>> {
                ::core::result::Result::Ok(::core::option::Option::Some(
                    $crate::policy::return_user_ref(self, policy),
                ))
            }
        }
    };
    ($ty:ty) => {
        $crate::user_type!($ty as ::core::stringify!($ty));
    };
}

/// Declare an integer-backed enum as a script parameter type.
///
/// The enum must derive [`num_enum::FromPrimitive`] with a
/// `#[num_enum(default)]` variant; integers outside the declared variants
/// read as that default. `$repr` is the enum's `#[repr]` type.
///
/// ```
/// use num_enum::FromPrimitive;
/// use stackbind::{FunctionCaller, script_enum};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
/// #[repr(u8)]
/// enum Mode {
///     #[num_enum(default)]
///     Off = 0,
///     On = 1,
/// }
///
/// script_enum!(Mode: u8);
///
/// let toggle = FunctionCaller::new("toggle", |m: Mode| m == Mode::On);
/// # let _ = toggle;
/// ```
#[macro_export]
macro_rules! script_enum {
    ($ty:ty : $repr:ty) => {
        impl $crate::codec::FromStack for $ty {
            const CATEGORY: $crate::codec::TypeCategory = $crate::codec::TypeCategory::Enum;

            fn from_stack(
                state: &$crate::State,
                index: $crate::StackIndex,
            ) -> $crate::ScriptResult<Self> {
                let raw = state.to_integer(index) as $repr;
                ::core::result::Result::Ok(
                    <$ty as $crate::__private::num_enum::FromPrimitive>::from_primitive(raw),
                )
            }
        }
    };
}

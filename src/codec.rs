//! Value codec: conversion between native values and stack slots.
//!
//! Every marshalable type belongs to exactly one [`TypeCategory`], fixed at
//! compile time through the `CATEGORY` constant of its [`FromStack`] or
//! [`ToStack`] implementation. The category decides which engine primitive
//! reads or writes the value:
//!
//! | Category      | Read                       | Write                 |
//! |---------------|----------------------------|-----------------------|
//! | Integral      | `to_integer` + `as` cast   | `Value::Integer`      |
//! | FloatingPoint | `to_number` + `as` cast    | `Value::Number`       |
//! | Enum          | `to_integer` + primitive   | not supported         |
//! | StringView    | shared engine string       | string content        |
//! | OwnedString   | copy of the engine string  | string content        |
//! | UserType      | typed handle borrow        | via return policy     |

use std::cell::RefMut;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use stackbind_core::{
    ScriptError, ScriptResult, StackIndex, State, UserBorrow, UserHandle, UserType, Value,
};

/// The closed set of conversion strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Integral,
    FloatingPoint,
    Enum,
    StringView,
    OwnedString,
    UserType,
}

impl TypeCategory {
    /// Name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TypeCategory::Integral => "integral",
            TypeCategory::FloatingPoint => "floating point",
            TypeCategory::Enum => "enum",
            TypeCategory::StringView => "string view",
            TypeCategory::OwnedString => "string",
            TypeCategory::UserType => "user data",
        }
    }
}

/// Read a native value from a stack slot.
///
/// All implementors are owned types: arguments never borrow from the stack,
/// so the callable can run while the engine state stays usable.
pub trait FromStack: Sized + 'static {
    /// Conversion strategy for this type.
    const CATEGORY: TypeCategory;

    /// Convert the slot at `index`.
    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self>;
}

/// Write a native value as exactly one stack slot.
pub trait ToStack {
    /// Conversion strategy for this type.
    const CATEGORY: TypeCategory;

    /// The dynamic value this native value becomes.
    fn to_value(self) -> Value;
}

/// Read the slot at `index` as `T`.
#[inline]
pub fn read<T: FromStack>(state: &State, index: StackIndex) -> ScriptResult<T> {
    T::from_stack(state, index)
}

/// Push `value`; always reports one value written.
#[inline]
pub fn write<T: ToStack>(state: &mut State, value: T) -> usize {
    state.push_value(value.to_value());
    1
}

/// Argument-type error for the slot at `index`.
///
/// Arguments start at slot 1, so a positive slot index is also the 1-based
/// argument number.
pub fn argument_error(state: &State, index: StackIndex, expected: &'static str) -> ScriptError {
    let position = argument_position(state, index);
    tracing::debug!(
        argument = position,
        expected,
        found = state.type_name(index),
        "argument type mismatch"
    );
    ScriptError::ArgumentType {
        index: position,
        expected,
    }
}

// ============================================================================
// Integral
// ============================================================================

macro_rules! impl_integral {
    ($($ty:ty),*) => {
        $(
            impl FromStack for $ty {
                const CATEGORY: TypeCategory = TypeCategory::Integral;

                #[inline]
                fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
                    Ok(state.to_integer(index) as $ty)
                }
            }

            impl ToStack for $ty {
                const CATEGORY: TypeCategory = TypeCategory::Integral;

                #[inline]
                fn to_value(self) -> Value {
                    Value::Integer(self as i64)
                }
            }
        )*
    };
}

impl_integral!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromStack for bool {
    const CATEGORY: TypeCategory = TypeCategory::Integral;

    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        match state.value(index) {
            Some(Value::Boolean(b)) => Ok(*b),
            _ => Ok(state.to_integer(index) != 0),
        }
    }
}

impl ToStack for bool {
    const CATEGORY: TypeCategory = TypeCategory::Integral;

    fn to_value(self) -> Value {
        Value::Boolean(self)
    }
}

// ============================================================================
// FloatingPoint
// ============================================================================

impl FromStack for f32 {
    const CATEGORY: TypeCategory = TypeCategory::FloatingPoint;

    #[inline]
    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        Ok(state.to_number(index) as f32)
    }
}

impl ToStack for f32 {
    const CATEGORY: TypeCategory = TypeCategory::FloatingPoint;

    #[inline]
    fn to_value(self) -> Value {
        Value::Number(self as f64)
    }
}

impl FromStack for f64 {
    const CATEGORY: TypeCategory = TypeCategory::FloatingPoint;

    #[inline]
    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        Ok(state.to_number(index))
    }
}

impl ToStack for f64 {
    const CATEGORY: TypeCategory = TypeCategory::FloatingPoint;

    #[inline]
    fn to_value(self) -> Value {
        Value::Number(self)
    }
}

// ============================================================================
// Strings
// ============================================================================

/// A view of an engine string.
///
/// Shares the engine's storage; reading a `StrView` argument never copies the
/// string's bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StrView(Rc<str>);

impl StrView {
    /// The viewed string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does this view share storage with `other`?
    pub fn shares_storage(&self, other: &Rc<str>) -> bool {
        Rc::ptr_eq(&self.0, other)
    }
}

impl Deref for StrView {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StrView {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StrView {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for StrView {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl From<&str> for StrView {
    fn from(s: &str) -> Self {
        StrView(Rc::from(s))
    }
}

impl fmt::Debug for StrView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for StrView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStack for StrView {
    const CATEGORY: TypeCategory = TypeCategory::StringView;

    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        state
            .to_str_view(index)
            .map(StrView)
            .ok_or_else(|| argument_error(state, index, "string"))
    }
}

impl ToStack for StrView {
    const CATEGORY: TypeCategory = TypeCategory::StringView;

    fn to_value(self) -> Value {
        Value::String(self.0)
    }
}

impl ToStack for &str {
    const CATEGORY: TypeCategory = TypeCategory::StringView;

    fn to_value(self) -> Value {
        Value::from(self)
    }
}

impl FromStack for String {
    const CATEGORY: TypeCategory = TypeCategory::OwnedString;

    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        StrView::from_stack(state, index).map(|view| view.as_str().to_owned())
    }
}

impl ToStack for String {
    const CATEGORY: TypeCategory = TypeCategory::OwnedString;

    fn to_value(self) -> Value {
        Value::from(self)
    }
}

// ============================================================================
// UserType
// ============================================================================

/// 1-based argument position of the slot at `index`.
fn argument_position(state: &State, index: StackIndex) -> usize {
    if index > 0 {
        index as usize
    } else {
        (state.top() + 1).saturating_sub(index.unsigned_abs() as usize)
    }
}

fn user_handle_at(state: &State, index: StackIndex) -> ScriptResult<Rc<UserHandle>> {
    state
        .to_user_data(index)
        .ok_or_else(|| argument_error(state, index, "user data"))
}

/// Shared reference to a user data argument.
///
/// Keeps the engine's handle alive and holds a shared borrow of the native
/// object until dropped. While any `UserRef` to an owned object exists,
/// [`UserMut`] access to it fails with [`ScriptError::BorrowConflict`].
pub struct UserRef<T: UserType> {
    // Declared before `handle` so the borrow is released first.
    borrow: UserBorrow<'static, T>,
    handle: Rc<UserHandle>,
}

impl<T: UserType> UserRef<T> {
    /// The handle this reference was read from.
    pub fn handle(&self) -> &Rc<UserHandle> {
        &self.handle
    }

    /// Release the borrow and keep only the handle.
    pub fn into_handle(self) -> Rc<UserHandle> {
        let UserRef { borrow, handle } = self;
        drop(borrow);
        handle
    }
}

impl<T: UserType> Deref for UserRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.borrow
    }
}

impl<T: UserType> Clone for UserRef<T> {
    fn clone(&self) -> Self {
        UserRef {
            borrow: self.borrow.clone(),
            handle: Rc::clone(&self.handle),
        }
    }
}

impl<T: UserType + fmt::Debug> fmt::Debug for UserRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserRef").field(&**self).finish()
    }
}

impl<T: UserType> FromStack for UserRef<T> {
    const CATEGORY: TypeCategory = TypeCategory::UserType;

    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        let handle = user_handle_at(state, index)?;
        let borrow = handle
            .get::<T>()
            .map_err(|e| e.at_argument(argument_position(state, index)))?;
        // SAFETY: the borrow points into the handle's heap allocation, which
        // `handle` keeps alive and which is dropped only after `borrow`.
        let borrow = unsafe {
            std::mem::transmute::<UserBorrow<'_, T>, UserBorrow<'static, T>>(borrow)
        };
        Ok(UserRef { borrow, handle })
    }
}

/// Exclusive reference to an owned user data argument.
///
/// Changes made through it are seen by every holder of the handle. Reading
/// fails with [`ScriptError::ReadOnlyUserData`] for reference handles and
/// with [`ScriptError::BorrowConflict`] when the object is already borrowed,
/// for instance when the same object is passed twice in one call.
pub struct UserMut<T: UserType> {
    // Declared before `handle` so the borrow is released first.
    borrow: RefMut<'static, T>,
    handle: Rc<UserHandle>,
}

impl<T: UserType> UserMut<T> {
    /// The handle this reference was read from.
    pub fn handle(&self) -> &Rc<UserHandle> {
        &self.handle
    }

    /// Release the borrow and keep only the handle.
    pub fn into_handle(self) -> Rc<UserHandle> {
        let UserMut { borrow, handle } = self;
        drop(borrow);
        handle
    }
}

impl<T: UserType> Deref for UserMut<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.borrow
    }
}

impl<T: UserType> DerefMut for UserMut<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.borrow
    }
}

impl<T: UserType + fmt::Debug> fmt::Debug for UserMut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserMut").field(&**self).finish()
    }
}

impl<T: UserType> FromStack for UserMut<T> {
    const CATEGORY: TypeCategory = TypeCategory::UserType;

    fn from_stack(state: &State, index: StackIndex) -> ScriptResult<Self> {
        let handle = user_handle_at(state, index)?;
        let borrow = handle
            .get_mut::<T>()
            .map_err(|e| e.at_argument(argument_position(state, index)))?;
        // SAFETY: as for `UserRef`, the borrowed cell lives in the allocation
        // owned by `handle`, which outlives `borrow`.
        let borrow = unsafe { std::mem::transmute::<RefMut<'_, T>, RefMut<'static, T>>(borrow) };
        Ok(UserMut { borrow, handle })
    }
}

/// Read a user data argument as an owned copy of the native object.
pub fn read_user_value<T: UserType>(state: &State, index: StackIndex) -> ScriptResult<T> {
    UserRef::<T>::from_stack(state, index).map(|r| T::clone(&r))
}

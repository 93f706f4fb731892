//! Opaque handles to native objects living inside the engine.
//!
//! A [`UserHandle`] is what a script sees when a native object crosses the
//! boundary. It either owns its object ([`UserHandle::make_copy`]) or refers
//! to storage owned by the native side ([`UserHandle::make_ref`]). Both kinds
//! carry a [`TypeTag`] so typed access can refuse the wrong type.
//!
//! Owned objects sit behind a shared `RefCell`: handles made with
//! [`UserHandle::alias`] see the same object, and mutable access through
//! [`UserHandle::get_mut`] is borrow checked at runtime. Objects referenced
//! with `make_ref` are read-only.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::error::ScriptError;
use crate::type_tag::TypeTag;

/// Trait for native types that can be handed to scripts as user data.
///
/// # Example
///
/// ```
/// use stackbind_core::{UserHandle, UserType};
///
/// #[derive(Clone)]
/// struct Vec2 {
///     x: f64,
///     y: f64,
/// }
///
/// impl UserType for Vec2 {
///     const NAME: &'static str = "Vec2";
/// }
///
/// let handle = UserHandle::make_copy(Vec2 { x: 1.0, y: 2.0 });
/// handle.get_mut::<Vec2>().unwrap().y = 3.0;
/// assert_eq!(handle.get::<Vec2>().unwrap().y, 3.0);
/// ```
pub trait UserType: Any + Clone {
    /// The name of this type as scripts see it.
    const NAME: &'static str;

    /// Identity stored in every handle of this type.
    fn type_tag() -> TypeTag {
        TypeTag::from_name(Self::NAME)
    }
}

type ClonePayload = fn(&dyn Any) -> Option<Box<dyn Any>>;

enum Storage {
    Owned {
        cell: Rc<RefCell<Box<dyn Any>>>,
        clone: ClonePayload,
    },
    Borrowed(NonNull<dyn Any>),
}

fn clone_payload<T: UserType>(value: &dyn Any) -> Option<Box<dyn Any>> {
    value
        .downcast_ref::<T>()
        .map(|v| Box::new(v.clone()) as Box<dyn Any>)
}

/// Shared access to the object behind a handle.
pub enum UserBorrow<'a, T> {
    /// Borrow of an owned object; blocks mutable access while alive.
    Shared(Ref<'a, T>),
    /// Reference to native storage.
    Plain(&'a T),
}

impl<T> Deref for UserBorrow<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            UserBorrow::Shared(r) => r,
            UserBorrow::Plain(r) => r,
        }
    }
}

impl<T> Clone for UserBorrow<'_, T> {
    fn clone(&self) -> Self {
        match self {
            UserBorrow::Shared(r) => UserBorrow::Shared(Ref::clone(r)),
            UserBorrow::Plain(r) => UserBorrow::Plain(r),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for UserBorrow<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Type-tagged handle to a native value, owned or borrowed.
pub struct UserHandle {
    tag: TypeTag,
    storage: Storage,
}

impl UserHandle {
    /// Move `value` into a new handle that owns it.
    pub fn make_copy<T: UserType>(value: T) -> Self {
        UserHandle {
            tag: T::type_tag(),
            storage: Storage::Owned {
                cell: Rc::new(RefCell::new(Box::new(value))),
                clone: clone_payload::<T>,
            },
        }
    }

    /// Create a non-owning, read-only handle bound to `value`'s storage.
    ///
    /// The handle observes every later change made to `value` through
    /// interior mutability.
    ///
    /// # Safety
    ///
    /// `value` must stay alive and must not be moved for as long as the
    /// returned handle, or any handle derived from it, may be accessed.
    pub unsafe fn make_ref<T: UserType>(value: &T) -> Self {
        let any: &(dyn Any + 'static) = value;
        UserHandle {
            tag: T::type_tag(),
            storage: Storage::Borrowed(NonNull::from(any)),
        }
    }

    /// The type tag recorded when the handle was created.
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Does this handle own (or share ownership of) its object?
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned { .. })
    }

    /// Do both handles refer to the same object?
    pub fn same_object(&self, other: &UserHandle) -> bool {
        std::ptr::eq(self.address(), other.address())
    }

    fn address(&self) -> *const () {
        match &self.storage {
            Storage::Owned { cell, .. } => Rc::as_ptr(cell) as *const (),
            Storage::Borrowed(ptr) => ptr.as_ptr() as *const (),
        }
    }

    fn mismatch<T: UserType>(&self) -> ScriptError {
        ScriptError::HandleTypeMismatch {
            expected: T::NAME,
            actual: self.tag.name(),
        }
    }

    fn conflict(&self) -> ScriptError {
        ScriptError::BorrowConflict {
            type_name: self.tag.name(),
        }
    }

    fn check_tag<T: UserType>(&self) -> Result<(), ScriptError> {
        if self.tag == T::type_tag() {
            Ok(())
        } else {
            Err(self.mismatch::<T>())
        }
    }

    /// Shared typed access to the referenced object.
    ///
    /// Fails with [`ScriptError::HandleTypeMismatch`] when the handle stores a
    /// different type and with [`ScriptError::BorrowConflict`] while the
    /// object is mutably borrowed.
    pub fn get<T: UserType>(&self) -> Result<UserBorrow<'_, T>, ScriptError> {
        self.check_tag::<T>()?;
        match &self.storage {
            Storage::Owned { cell, .. } => {
                let payload = cell.try_borrow().map_err(|_| self.conflict())?;
                Ref::filter_map(payload, |p| (**p).downcast_ref::<T>())
                    .map(UserBorrow::Shared)
                    .map_err(|_| self.mismatch::<T>())
            }
            Storage::Borrowed(ptr) => {
                // SAFETY: make_ref's contract keeps the target alive while the handle is used.
                let payload = unsafe { ptr.as_ref() };
                payload
                    .downcast_ref::<T>()
                    .map(UserBorrow::Plain)
                    .ok_or_else(|| self.mismatch::<T>())
            }
        }
    }

    /// Mutable typed access to an owned object.
    ///
    /// Fails with [`ScriptError::ReadOnlyUserData`] for handles made with
    /// [`make_ref`](Self::make_ref) and with [`ScriptError::BorrowConflict`]
    /// while the object is borrowed elsewhere.
    pub fn get_mut<T: UserType>(&self) -> Result<RefMut<'_, T>, ScriptError> {
        self.check_tag::<T>()?;
        match &self.storage {
            Storage::Owned { cell, .. } => {
                let payload = cell.try_borrow_mut().map_err(|_| self.conflict())?;
                RefMut::filter_map(payload, |p| (**p).downcast_mut::<T>())
                    .map_err(|_| self.mismatch::<T>())
            }
            Storage::Borrowed(_) => Err(ScriptError::ReadOnlyUserData {
                type_name: self.tag.name(),
            }),
        }
    }

    /// Copy this handle.
    ///
    /// An owning handle clones its object into a new, independent handle. A
    /// borrowing handle yields another borrow of the same storage.
    pub fn duplicate(&self) -> Result<UserHandle, ScriptError> {
        let storage = match &self.storage {
            Storage::Owned { cell, clone } => {
                let payload = cell.try_borrow().map_err(|_| self.conflict())?;
                let value = clone(&**payload).ok_or_else(|| {
                    ScriptError::runtime(format!("cannot copy user data of type {}", self.tag))
                })?;
                Storage::Owned {
                    cell: Rc::new(RefCell::new(value)),
                    clone: *clone,
                }
            }
            Storage::Borrowed(ptr) => Storage::Borrowed(*ptr),
        };
        Ok(UserHandle {
            tag: self.tag,
            storage,
        })
    }

    /// Another handle to the same object.
    pub fn alias(&self) -> UserHandle {
        let storage = match &self.storage {
            Storage::Owned { cell, clone } => Storage::Owned {
                cell: Rc::clone(cell),
                clone: *clone,
            },
            Storage::Borrowed(ptr) => Storage::Borrowed(*ptr),
        };
        UserHandle {
            tag: self.tag,
            storage,
        }
    }
}

impl fmt::Debug for UserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserHandle")
            .field("type", &self.tag.name())
            .field("owned", &self.is_owned())
            .finish()
    }
}

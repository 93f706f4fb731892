//! Deterministic type identity for user data.
//!
//! Every [`UserHandle`](crate::UserHandle) carries a [`TypeTag`] so typed access
//! can be checked before the payload is reinterpreted. The hash is computed
//! from the script-visible type name, so the same name always yields the same
//! tag regardless of registration order.
//!
//! ```
//! use stackbind_core::TypeTag;
//!
//! let a = TypeTag::from_name("Vec2");
//! let b = TypeTag::from_name("Vec2");
//! assert_eq!(a, b);
//! assert_ne!(a, TypeTag::from_name("Player"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain marker mixed into every user type hash.
const USER_TYPE: u64 = 0x2fac10b63a6cc57c;

/// A named 64-bit type identity.
#[derive(Clone, Copy)]
pub struct TypeTag {
    hash: u64,
    name: &'static str,
}

impl TypeTag {
    /// Create a tag from a script-visible type name.
    #[inline]
    pub fn from_name(name: &'static str) -> Self {
        TypeTag {
            hash: USER_TYPE ^ xxh64(name.as_bytes(), 0),
            name,
        }
    }

    /// The underlying hash value.
    #[inline]
    pub const fn hash(self) -> u64 {
        self.hash
    }

    /// The type name this tag was built from.
    #[inline]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({}: {:#018x})", self.name, self.hash)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(TypeTag::from_name("Point"), TypeTag::from_name("Point"));
        assert_eq!(
            TypeTag::from_name("Point").hash(),
            TypeTag::from_name("Point").hash()
        );
    }

    #[test]
    fn distinct_names_distinct_tags() {
        assert_ne!(TypeTag::from_name("Point"), TypeTag::from_name("Rect"));
    }

    #[test]
    fn display_is_name() {
        assert_eq!(TypeTag::from_name("Game::Player").to_string(), "Game::Player");
    }

    #[test]
    fn debug_contains_name() {
        let dbg = format!("{:?}", TypeTag::from_name("Point"));
        assert!(dbg.contains("Point"));
    }
}

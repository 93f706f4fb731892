//! Error types for the engine and the marshaling layer.
//!
//! Every error a native function can produce is a [`ScriptError`]. Returning
//! one from a native closure is the engine's error channel: the current call
//! is aborted, the stack is restored to the call boundary and the error
//! surfaces to whoever made the protected call.

use thiserror::Error;

/// Errors that can occur when converting a single slot value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The slot does not hold the kind of value the target type needs.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Stack index does not address a live slot.
    #[error("stack index {index} is not valid (stack top is {top})")]
    InvalidIndex { index: i32, top: usize },
}

/// Errors raised through the engine's error channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Runtime error raised by a native function or by the engine itself.
    #[error("{message}")]
    Runtime { message: String },

    /// An argument slot does not hold the expected kind of value.
    ///
    /// `index` is 1-based, counted in declaration order.
    #[error("argument {index}: expecting {expected}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
    },

    /// A user handle was accessed as a type other than the one it stores.
    #[error("user data type mismatch: expected {expected}, handle holds {actual}")]
    HandleTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A user data argument holds a handle of another type.
    #[error("argument {index}: expecting {expected}, got {actual}")]
    ArgumentHandleType {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// User data is already borrowed in a way that conflicts with this access.
    #[error("user data of type {type_name} is already borrowed")]
    BorrowConflict { type_name: &'static str },

    /// Mutable access was requested through a read-only reference handle.
    #[error("user data of type {type_name} is read-only")]
    ReadOnlyUserData { type_name: &'static str },

    /// Attempted to call a value that is not a function.
    #[error("attempt to call a {type_name} value")]
    NotCallable { type_name: &'static str },

    /// A global name was looked up but never set.
    #[error("undefined global '{name}'")]
    UndefinedGlobal { name: String },

    /// The value stack or the call stack exceeded its configured limit.
    #[error("stack overflow ({what} limit of {limit} exceeded)")]
    StackOverflow { what: &'static str, limit: usize },

    /// Error converting a slot value
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

impl ScriptError {
    /// Create a runtime error with a message.
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            message: message.into(),
        }
    }

    /// Is this an argument type error for the given 1-based argument?
    pub fn is_argument_error(&self, arg: usize) -> bool {
        match self {
            ScriptError::ArgumentType { index, .. }
            | ScriptError::ArgumentHandleType { index, .. } => *index == arg,
            _ => false,
        }
    }

    /// Attach a 1-based argument position to a handle type mismatch.
    ///
    /// Other errors are returned unchanged.
    pub fn at_argument(self, index: usize) -> Self {
        match self {
            ScriptError::HandleTypeMismatch { expected, actual } => {
                ScriptError::ArgumentHandleType {
                    index,
                    expected,
                    actual,
                }
            }
            other => other,
        }
    }
}

impl From<String> for ScriptError {
    fn from(message: String) -> Self {
        ScriptError::Runtime { message }
    }
}

impl From<&str> for ScriptError {
    fn from(message: &str) -> Self {
        ScriptError::Runtime {
            message: message.to_string(),
        }
    }
}

/// Convenience alias used throughout the engine API.
pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_type_message() {
        let err = ScriptError::ArgumentType {
            index: 2,
            expected: "user data",
        };
        assert_eq!(err.to_string(), "argument 2: expecting user data");
        assert!(err.is_argument_error(2));
        assert!(!err.is_argument_error(1));
    }

    #[test]
    fn handle_mismatch_message() {
        let err = ScriptError::HandleTypeMismatch {
            expected: "Vec2",
            actual: "Player",
        };
        assert!(err.to_string().contains("Vec2"));
        assert!(err.to_string().contains("Player"));
    }

    #[test]
    fn handle_mismatch_at_argument() {
        let err = ScriptError::HandleTypeMismatch {
            expected: "Vec2",
            actual: "counter",
        }
        .at_argument(2);
        assert_eq!(err.to_string(), "argument 2: expecting Vec2, got counter");
        assert!(err.is_argument_error(2));

        let other = ScriptError::BorrowConflict { type_name: "Vec2" }.at_argument(1);
        assert_eq!(other, ScriptError::BorrowConflict { type_name: "Vec2" });
    }

    #[test]
    fn conversion_error_converts() {
        let err: ScriptError = ConversionError::TypeMismatch {
            expected: "function",
            actual: "nil",
        }
        .into();
        assert!(matches!(err, ScriptError::Conversion(_)));
        assert!(err.to_string().contains("expected function"));
    }

    #[test]
    fn runtime_from_str() {
        let err: ScriptError = "boom".into();
        assert_eq!(err, ScriptError::runtime("boom"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn stack_overflow_message() {
        let err = ScriptError::StackOverflow {
            what: "call depth",
            limit: 200,
        };
        assert!(err.to_string().contains("call depth"));
        assert!(err.to_string().contains("200"));
    }
}

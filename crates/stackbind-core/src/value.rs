//! Runtime value type for stack slots.

use std::fmt;
use std::rc::Rc;

use crate::error::ScriptResult;
use crate::state::State;
use crate::user_handle::UserHandle;

/// Signature of every function the engine can call natively.
///
/// The function finds its arguments in the current frame (slot 1 is the first
/// argument) and returns how many values it left on top of the stack as
/// results. Returning `Err` raises the error at the call boundary.
pub type NativeFunction = fn(&mut State) -> ScriptResult<usize>;

/// A native function together with its bound upvalues.
#[derive(Clone)]
pub struct Closure {
    inner: Rc<ClosureData>,
}

struct ClosureData {
    func: NativeFunction,
    upvalues: Box<[Value]>,
}

impl Closure {
    /// Bind `upvalues` to `func`.
    pub fn new(func: NativeFunction, upvalues: Vec<Value>) -> Self {
        Closure {
            inner: Rc::new(ClosureData {
                func,
                upvalues: upvalues.into_boxed_slice(),
            }),
        }
    }

    /// The native entry point.
    pub fn function(&self) -> NativeFunction {
        self.inner.func
    }

    /// Upvalue `n`, 1-based.
    pub fn upvalue(&self, n: usize) -> Option<&Value> {
        n.checked_sub(1).and_then(|i| self.inner.upvalues.get(i))
    }

    /// Number of bound upvalues.
    pub fn upvalue_count(&self) -> usize {
        self.inner.upvalues.len()
    }

    /// Do both closures refer to the same closure object?
    pub fn ptr_eq(&self, other: &Closure) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("upvalues", &self.inner.upvalues.len())
            .finish_non_exhaustive()
    }
}

/// A dynamically typed value held in a stack slot.
///
/// Cloning a value is cheap: strings, user data and closures are reference
/// counted and a clone refers to the same underlying object.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Nil,
    /// Boolean value
    Boolean(bool),
    /// Integer value (every native integer type is stored as i64)
    Integer(i64),
    /// Floating point value (f32 and f64 are stored as f64)
    Number(f64),
    /// Immutable shared string
    String(Rc<str>),
    /// Full user data: a handle to a native object
    UserData(Rc<UserHandle>),
    /// Light user data: a bare address the engine never dereferences
    LightUserData(*const ()),
    /// Callable native closure
    Function(Closure),
}

impl Value {
    /// Get a human-readable name for this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::UserData(_) => "userdata",
            Value::LightUserData(_) => "light userdata",
            Value::Function(_) => "function",
        }
    }

    /// Check if this value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Engine integer coercion.
    ///
    /// Numbers truncate toward zero, strings holding a numeral are parsed.
    /// Everything else has no integer form.
    pub fn coerce_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Number(v) => Some(*v as i64),
            Value::String(s) => parse_numeral(s).map(|n| match n {
                Numeral::Int(i) => i,
                Numeral::Float(f) => f as i64,
            }),
            _ => None,
        }
    }

    /// Engine float coercion.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Number(v) => Some(*v),
            Value::String(s) => parse_numeral(s).map(|n| match n {
                Numeral::Int(i) => i as f64,
                Numeral::Float(f) => f,
            }),
            _ => None,
        }
    }

    /// Engine string coercion.
    ///
    /// Strings are shared, numbers are formatted into a fresh string.
    pub fn coerce_string(&self) -> Option<Rc<str>> {
        match self {
            Value::String(s) => Some(Rc::clone(s)),
            Value::Integer(v) => Some(Rc::from(v.to_string())),
            Value::Number(v) => Some(Rc::from(v.to_string())),
            _ => None,
        }
    }

    /// Truthiness: only `nil` and `false` are false.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }
}

enum Numeral {
    Int(i64),
    Float(f64),
}

fn parse_numeral(s: &str) -> Option<Numeral> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Numeral::Int(i));
    }
    s.parse::<f64>().ok().map(Numeral::Float)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Rc::from(v))
    }
}

impl From<UserHandle> for Value {
    fn from(v: UserHandle) -> Self {
        Value::UserData(Rc::new(v))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Integer(v) => write!(f, "Integer({})", v),
            Value::Number(v) => write!(f, "Number({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::UserData(h) => write!(f, "UserData({})", h.type_tag()),
            Value::LightUserData(p) => write!(f, "LightUserData({:p})", p),
            Value::Function(c) => write!(f, "{:?}", c),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // User data and closures compare by identity
            (Value::UserData(a), Value::UserData(b)) => Rc::ptr_eq(a, b),
            (Value::LightUserData(a), Value::LightUserData(b)) => std::ptr::eq(*a, *b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut State) -> ScriptResult<usize> {
        Ok(0)
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Boolean(true).type_name(), "boolean");
        assert_eq!(Value::Integer(0).type_name(), "integer");
        assert_eq!(Value::Number(0.0).type_name(), "number");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::LightUserData(std::ptr::null()).type_name(), "light userdata");
        assert_eq!(
            Value::Function(Closure::new(nop, vec![])).type_name(),
            "function"
        );
    }

    #[test]
    fn integer_coercion() {
        assert_eq!(Value::Integer(7).coerce_integer(), Some(7));
        assert_eq!(Value::Number(3.9).coerce_integer(), Some(3));
        assert_eq!(Value::Number(-3.9).coerce_integer(), Some(-3));
        assert_eq!(Value::from(" 42 ").coerce_integer(), Some(42));
        assert_eq!(Value::from("2.5").coerce_integer(), Some(2));
        assert_eq!(Value::from("abc").coerce_integer(), None);
        assert_eq!(Value::Boolean(true).coerce_integer(), None);
        assert_eq!(Value::Nil.coerce_integer(), None);
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::Integer(2).coerce_number(), Some(2.0));
        assert_eq!(Value::Number(0.5).coerce_number(), Some(0.5));
        assert_eq!(Value::from("1e3").coerce_number(), Some(1000.0));
        assert_eq!(Value::Nil.coerce_number(), None);
    }

    #[test]
    fn string_coercion_shares_storage() {
        let s: Rc<str> = Rc::from("shared");
        let value = Value::String(Rc::clone(&s));
        let view = value.coerce_string().unwrap();
        assert!(Rc::ptr_eq(&s, &view));
        assert_eq!(&*Value::Integer(12).coerce_string().unwrap(), "12");
        assert!(Value::Boolean(false).coerce_string().is_none());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Boolean(false).truthy());
        assert!(Value::Integer(0).truthy());
        assert!(Value::from("").truthy());
    }

    #[test]
    fn closure_upvalues_are_one_based() {
        let closure = Closure::new(nop, vec![Value::Integer(5)]);
        assert_eq!(closure.upvalue_count(), 1);
        assert_eq!(closure.upvalue(1), Some(&Value::Integer(5)));
        assert_eq!(closure.upvalue(0), None);
        assert_eq!(closure.upvalue(2), None);
    }

    #[test]
    fn identity_equality() {
        let a = Value::Function(Closure::new(nop, vec![]));
        let b = Value::Function(Closure::new(nop, vec![]));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Value::from("x"), Value::from("x"));
        assert_ne!(Value::Integer(1), Value::Number(1.0));
    }
}

//! The engine state: value stack, call frames and globals.
//!
//! Indices follow the classic embedded-interpreter convention. Positive
//! indices are 1-based and relative to the current frame, so inside a native
//! call slot 1 is the first argument. Negative indices count down from the
//! top of the stack, `-1` being the topmost value.
//!
//! ```
//! use stackbind_core::{State, Value};
//!
//! let mut state = State::new();
//! state.push_integer(7);
//! state.push_string("seven");
//! assert_eq!(state.top(), 2);
//! assert_eq!(state.to_integer(1), 7);
//! assert_eq!(state.to_str_view(-1).as_deref(), Some("seven"));
//! ```

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::config::StateConfig;
use crate::error::{ConversionError, ScriptError, ScriptResult};
use crate::user_handle::UserHandle;
use crate::value::{Closure, NativeFunction, Value};

/// Stack index as used by the engine API.
pub type StackIndex = i32;

struct Frame {
    /// Absolute stack position of slot 1.
    base: usize,
    /// Closure being executed, `None` for the root frame.
    closure: Option<Closure>,
}

/// A single-threaded engine instance.
pub struct State {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    globals: FxHashMap<Rc<str>, Value>,
    config: StateConfig,
}

impl State {
    /// Create a state with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    /// Create a state with explicit limits.
    pub fn with_config(config: StateConfig) -> Self {
        State {
            stack: Vec::with_capacity(config.initial_stack_capacity),
            frames: vec![Frame {
                base: 0,
                closure: None,
            }],
            globals: FxHashMap::default(),
            config,
        }
    }

    /// The limits this state was created with.
    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    fn frame(&self) -> &Frame {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    /// Number of values in the current frame.
    pub fn top(&self) -> usize {
        self.stack.len() - self.frame().base
    }

    /// Number of native calls currently executing.
    pub fn call_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Translate a frame-relative index into a position in the stack.
    pub fn absolute(&self, index: StackIndex) -> Option<usize> {
        let base = self.frame().base;
        let pos = if index > 0 {
            base + (index as usize) - 1
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            self.stack.len().checked_sub(back)?
        } else {
            return None;
        };
        (pos >= base && pos < self.stack.len()).then_some(pos)
    }

    /// The value at `index`, if the index is valid.
    pub fn value(&self, index: StackIndex) -> Option<&Value> {
        self.absolute(index).map(|pos| &self.stack[pos])
    }

    /// Type name of the value at `index`; `"none"` for invalid indices.
    pub fn type_name(&self, index: StackIndex) -> &'static str {
        self.value(index).map_or("none", Value::type_name)
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Push any value.
    pub fn push_value(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn push_nil(&mut self) {
        self.push_value(Value::Nil);
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.push_value(Value::Boolean(value));
    }

    pub fn push_integer(&mut self, value: i64) {
        self.push_value(Value::Integer(value));
    }

    pub fn push_number(&mut self, value: f64) {
        self.push_value(Value::Number(value));
    }

    /// Push a copy of `value` as a new engine string.
    pub fn push_string(&mut self, value: &str) {
        self.push_value(Value::String(Rc::from(value)));
    }

    /// Push an existing engine string without copying its bytes.
    pub fn push_shared_string(&mut self, value: Rc<str>) {
        self.push_value(Value::String(value));
    }

    /// Push full user data; the engine takes ownership of the handle.
    pub fn push_user_data(&mut self, handle: UserHandle) {
        self.push_value(Value::UserData(Rc::new(handle)));
    }

    /// Push a bare address the engine will never dereference.
    pub fn push_light_user_data(&mut self, ptr: *const ()) {
        self.push_value(Value::LightUserData(ptr));
    }

    /// Pop `upvalues` values and push a closure binding them to `func`.
    ///
    /// The first popped-over value becomes upvalue 1.
    pub fn push_native_closure(
        &mut self,
        func: NativeFunction,
        upvalues: usize,
    ) -> ScriptResult<()> {
        if upvalues > self.top() {
            return Err(ScriptError::runtime(format!(
                "closure needs {} upvalues but the frame holds {} values",
                upvalues,
                self.top()
            )));
        }
        let bound = self.stack.split_off(self.stack.len() - upvalues);
        self.push_value(Value::Function(Closure::new(func, bound)));
        Ok(())
    }

    /// Push another reference to the value at `index`.
    pub fn push_copy(&mut self, index: StackIndex) -> ScriptResult<()> {
        let value = self
            .value(index)
            .cloned()
            .ok_or(ConversionError::InvalidIndex {
                index,
                top: self.top(),
            })?;
        self.push_value(value);
        Ok(())
    }

    /// Remove `n` values from the top of the current frame.
    pub fn pop(&mut self, n: usize) {
        let keep = self.stack.len() - n.min(self.top());
        self.stack.truncate(keep);
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Integer form of the slot, `0` when it has none.
    pub fn to_integer(&self, index: StackIndex) -> i64 {
        self.value(index)
            .and_then(Value::coerce_integer)
            .unwrap_or(0)
    }

    /// Float form of the slot, `0.0` when it has none.
    pub fn to_number(&self, index: StackIndex) -> f64 {
        self.value(index).and_then(Value::coerce_number).unwrap_or(0.0)
    }

    /// Truthiness of the slot; invalid indices are false.
    pub fn to_boolean(&self, index: StackIndex) -> bool {
        self.value(index).is_some_and(Value::truthy)
    }

    /// String form of the slot, sharing the engine's storage when it already
    /// is a string.
    pub fn to_str_view(&self, index: StackIndex) -> Option<Rc<str>> {
        self.value(index).and_then(Value::coerce_string)
    }

    /// Does the slot hold full user data?
    pub fn is_user_data(&self, index: StackIndex) -> bool {
        matches!(self.value(index), Some(Value::UserData(_)))
    }

    /// The user data handle stored in the slot.
    pub fn to_user_data(&self, index: StackIndex) -> Option<Rc<UserHandle>> {
        match self.value(index) {
            Some(Value::UserData(handle)) => Some(Rc::clone(handle)),
            _ => None,
        }
    }

    /// The address stored in a light user data slot.
    pub fn to_light_user_data(&self, index: StackIndex) -> Option<*const ()> {
        match self.value(index) {
            Some(Value::LightUserData(ptr)) => Some(*ptr),
            _ => None,
        }
    }

    /// Upvalue `n` (1-based) of the closure currently executing.
    pub fn upvalue(&self, n: usize) -> Option<&Value> {
        self.frame().closure.as_ref()?.upvalue(n)
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// Pop the top value and store it as global `name`.
    pub fn set_global(&mut self, name: &str) -> ScriptResult<()> {
        if self.top() == 0 {
            return Err(ScriptError::runtime(format!(
                "set_global('{}') on an empty frame",
                name
            )));
        }
        let value = self.stack.pop().unwrap_or_default();
        tracing::trace!(global = name, kind = value.type_name(), "set global");
        self.globals.insert(Rc::from(name), value);
        Ok(())
    }

    /// Push global `name`, or nil when it is not set.
    pub fn get_global(&mut self, name: &str) {
        let value = self.globals.get(name).cloned().unwrap_or_default();
        self.push_value(value);
    }

    /// Borrow global `name`.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Remove global `name`, returning its value.
    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        self.globals.remove(name)
    }

    // ========================================================================
    // Calls and errors
    // ========================================================================

    /// Build the runtime error a native function returns to abort its call.
    pub fn raise_error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::runtime(message)
    }

    /// Call the function sitting below the top `nargs` values.
    ///
    /// On success the function and its arguments are replaced by its results
    /// and the number of results is returned. On error the function and its
    /// arguments are removed and the error is returned; the caller's part of
    /// the stack is left untouched.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&mut self, nargs: usize) -> ScriptResult<usize> {
        if nargs >= self.top() {
            return Err(ScriptError::runtime(format!(
                "call expects a function and {} arguments, frame holds {} values",
                nargs,
                self.top()
            )));
        }
        let func_pos = self.stack.len() - nargs - 1;

        let closure = match &self.stack[func_pos] {
            Value::Function(closure) => closure.clone(),
            other => {
                let type_name = other.type_name();
                self.stack.truncate(func_pos);
                return Err(ScriptError::NotCallable { type_name });
            }
        };

        if self.call_depth() >= self.config.max_call_depth {
            self.stack.truncate(func_pos);
            return Err(ScriptError::StackOverflow {
                what: "call depth",
                limit: self.config.max_call_depth,
            });
        }
        if self.stack.len() > self.config.max_stack_size {
            self.stack.truncate(func_pos);
            return Err(ScriptError::StackOverflow {
                what: "stack size",
                limit: self.config.max_stack_size,
            });
        }

        let func = closure.function();
        self.frames.push(Frame {
            base: func_pos + 1,
            closure: Some(closure),
        });
        tracing::trace!(depth = self.call_depth(), nargs, "native call");
        let outcome = func(self);
        let pushed = self.stack.len() - (func_pos + 1);
        self.frames.pop();

        match outcome {
            Ok(nresults) if nresults <= pushed => {
                let results = self.stack.split_off(self.stack.len() - nresults);
                self.stack.truncate(func_pos);
                self.stack.extend(results);
                Ok(nresults)
            }
            Ok(nresults) => {
                self.stack.truncate(func_pos);
                Err(ScriptError::runtime(format!(
                    "native function reported {} results but its frame holds {}",
                    nresults, pushed
                )))
            }
            Err(err) => {
                tracing::debug!(error = %err, "native call raised an error");
                self.stack.truncate(func_pos);
                Err(err)
            }
        }
    }

    /// Protected call of global `name` with `args`, collecting its results.
    pub fn call_global<I>(&mut self, name: &str, args: I) -> ScriptResult<Vec<Value>>
    where
        I: IntoIterator<Item = Value>,
    {
        let func = match self.globals.get(name) {
            Some(value) => value.clone(),
            None => {
                return Err(ScriptError::UndefinedGlobal {
                    name: name.to_string(),
                });
            }
        };
        let mark = self.stack.len();
        self.push_value(func);
        self.stack.extend(args);
        let nargs = self.stack.len() - mark - 1;
        let nresults = self.call(nargs)?;
        Ok(self.stack.split_off(self.stack.len() - nresults))
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("top", &self.top())
            .field("call_depth", &self.call_depth())
            .field("globals", &self.globals.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(state: &mut State) -> ScriptResult<usize> {
        let sum = state.to_integer(1) + state.to_integer(2);
        state.push_integer(sum);
        Ok(1)
    }

    fn fail(state: &mut State) -> ScriptResult<usize> {
        state.push_integer(99);
        Err(state.raise_error("nope"))
    }

    fn read_upvalue(state: &mut State) -> ScriptResult<usize> {
        let value = state.upvalue(1).cloned().unwrap_or_default();
        state.push_value(value);
        Ok(1)
    }

    fn recurse(state: &mut State) -> ScriptResult<usize> {
        state.get_global("recurse");
        state.call(0)
    }

    fn overreport(_: &mut State) -> ScriptResult<usize> {
        Ok(3)
    }

    #[test]
    fn positive_and_negative_indices() {
        let mut state = State::new();
        state.push_integer(1);
        state.push_integer(2);
        state.push_integer(3);
        assert_eq!(state.to_integer(1), 1);
        assert_eq!(state.to_integer(3), 3);
        assert_eq!(state.to_integer(-1), 3);
        assert_eq!(state.to_integer(-3), 1);
        assert!(state.value(0).is_none());
        assert!(state.value(4).is_none());
        assert!(state.value(-4).is_none());
        assert_eq!(state.type_name(9), "none");
    }

    #[test]
    fn push_copy_shares_value() {
        let mut state = State::new();
        state.push_string("a");
        state.push_copy(1).unwrap();
        assert_eq!(state.top(), 2);
        assert_eq!(state.value(1), state.value(2));
        let err = state.push_copy(5).unwrap_err();
        assert_eq!(
            err,
            ScriptError::Conversion(ConversionError::InvalidIndex { index: 5, top: 2 })
        );
    }

    #[test]
    fn pop_is_clamped_to_frame() {
        let mut state = State::new();
        state.push_nil();
        state.pop(5);
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn reads_with_engine_coercion() {
        let mut state = State::new();
        state.push_number(2.75);
        state.push_string("12");
        state.push_boolean(true);
        assert_eq!(state.to_integer(1), 2);
        assert_eq!(state.to_integer(2), 12);
        assert_eq!(state.to_integer(3), 0);
        assert_eq!(state.to_number(2), 12.0);
        assert!(state.to_boolean(3));
        assert!(!state.to_boolean(7));
        assert_eq!(state.to_str_view(1).as_deref(), Some("2.75"));
        assert!(state.to_str_view(3).is_none());
    }

    #[test]
    fn user_data_slots() {
        #[derive(Clone)]
        struct Tag;
        impl crate::UserType for Tag {
            const NAME: &'static str = "Tag";
        }

        let mut state = State::new();
        state.push_user_data(UserHandle::make_copy(Tag));
        state.push_light_user_data(std::ptr::null());
        assert!(state.is_user_data(1));
        assert!(!state.is_user_data(2));
        assert!(state.to_user_data(1).is_some());
        assert!(state.to_user_data(2).is_none());
        assert_eq!(state.to_light_user_data(2), Some(std::ptr::null()));
    }

    #[test]
    fn call_replaces_function_and_args_with_results() {
        let mut state = State::new();
        state.push_integer(100);
        state.push_native_closure(add, 0).unwrap();
        state.push_integer(2);
        state.push_integer(3);
        assert_eq!(state.call(2).unwrap(), 1);
        assert_eq!(state.top(), 2);
        assert_eq!(state.to_integer(1), 100);
        assert_eq!(state.to_integer(2), 5);
    }

    #[test]
    fn call_error_restores_stack() {
        let mut state = State::new();
        state.push_integer(100);
        state.push_native_closure(fail, 0).unwrap();
        state.push_integer(1);
        let err = state.call(1).unwrap_err();
        assert_eq!(err, ScriptError::runtime("nope"));
        assert_eq!(state.top(), 1);
        assert_eq!(state.to_integer(1), 100);
    }

    #[test]
    fn call_non_function() {
        let mut state = State::new();
        state.push_integer(1);
        let err = state.call(0).unwrap_err();
        assert_eq!(err, ScriptError::NotCallable { type_name: "integer" });
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn closure_upvalue_visible_inside_call() {
        let mut state = State::new();
        state.push_string("bound");
        state.push_native_closure(read_upvalue, 1).unwrap();
        assert_eq!(state.top(), 1);
        state.call(0).unwrap();
        assert_eq!(state.to_str_view(-1).as_deref(), Some("bound"));
        assert!(state.upvalue(1).is_none());
    }

    #[test]
    fn closure_needs_enough_values() {
        let mut state = State::new();
        assert!(state.push_native_closure(add, 1).is_err());
    }

    #[test]
    fn globals_round_trip() {
        let mut state = State::new();
        state.push_native_closure(add, 0).unwrap();
        state.set_global("add").unwrap();
        assert_eq!(state.top(), 0);
        let results = state
            .call_global("add", [Value::Integer(4), Value::Integer(5)])
            .unwrap();
        assert_eq!(results, vec![Value::Integer(9)]);
        assert_eq!(state.top(), 0);

        state.get_global("missing");
        assert!(state.value(-1).unwrap().is_nil());
        assert!(state.remove_global("add").is_some());
        assert!(state.global("add").is_none());
    }

    #[test]
    fn call_undefined_global() {
        let mut state = State::new();
        let err = state.call_global("nothing", []).unwrap_err();
        assert_eq!(
            err,
            ScriptError::UndefinedGlobal {
                name: "nothing".to_string()
            }
        );
    }

    #[test]
    fn call_depth_limit() {
        let mut state = State::with_config(StateConfig::default().with_max_call_depth(8));
        state.push_native_closure(recurse, 0).unwrap();
        state.set_global("recurse").unwrap();
        let err = state.call_global("recurse", []).unwrap_err();
        assert_eq!(
            err,
            ScriptError::StackOverflow {
                what: "call depth",
                limit: 8
            }
        );
        assert_eq!(state.top(), 0);
        assert_eq!(state.call_depth(), 0);
    }

    #[test]
    fn stack_size_limit() {
        let mut state = State::with_config(StateConfig::default().with_max_stack_size(4));
        for i in 0..4 {
            state.push_integer(i);
        }
        state.push_native_closure(add, 0).unwrap();
        let err = state.call(0).unwrap_err();
        assert!(matches!(err, ScriptError::StackOverflow { what: "stack size", .. }));
        assert_eq!(state.top(), 4);
    }

    #[test]
    fn overreported_results() {
        let mut state = State::new();
        state.push_native_closure(overreport, 0).unwrap();
        assert!(state.call(0).is_err());
        assert_eq!(state.top(), 0);
    }
}

//! Engine configuration.

/// Limits applied by a [`State`](crate::State).
///
/// ```
/// use stackbind_core::StateConfig;
///
/// let config = StateConfig::default().with_max_call_depth(64);
/// assert_eq!(config.max_call_depth, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateConfig {
    /// Maximum number of live slots across all frames.
    pub max_stack_size: usize,
    /// Maximum nesting of native calls.
    pub max_call_depth: usize,
    /// Slots reserved when the state is created.
    pub initial_stack_capacity: usize,
}

impl StateConfig {
    pub const DEFAULT_MAX_STACK_SIZE: usize = 1_000_000;
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;
    pub const DEFAULT_INITIAL_STACK_CAPACITY: usize = 1024;

    /// Set the slot limit.
    pub fn with_max_stack_size(mut self, slots: usize) -> Self {
        self.max_stack_size = slots;
        self
    }

    /// Set the call nesting limit.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the number of slots preallocated.
    pub fn with_initial_stack_capacity(mut self, slots: usize) -> Self {
        self.initial_stack_capacity = slots;
        self
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            max_stack_size: Self::DEFAULT_MAX_STACK_SIZE,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            initial_stack_capacity: Self::DEFAULT_INITIAL_STACK_CAPACITY,
        }
    }
}

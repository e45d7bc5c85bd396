//! Context configuration

/// Limits and sizing for one [`Context`](crate::Context)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Initial capacity of the value stack
    pub stack_capacity: usize,
    /// Maximum nesting of function calls before a `RangeError` is thrown
    pub max_call_depth: usize,
    /// Hard limit on values held by the value stack, checked on every call
    pub max_stack_values: usize,
}

impl ContextConfig {
    /// Default value stack capacity
    pub const DEFAULT_STACK_CAPACITY: usize = 1024;
    /// Default max call depth
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;
    /// Default value stack limit
    pub const DEFAULT_MAX_STACK_VALUES: usize = 1_000_000;

    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_stack_values(mut self, limit: usize) -> Self {
        self.max_stack_values = limit;
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            stack_capacity: Self::DEFAULT_STACK_CAPACITY,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            max_stack_values: Self::DEFAULT_MAX_STACK_VALUES,
        }
    }
}

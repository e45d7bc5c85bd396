//! Evaluation engine
//!
//! Tree-walking evaluation over the shared value stack, plus the value
//! conversions and property access rules the stack API reuses.

pub(crate) mod interpreter;
pub(crate) mod ops;
pub(crate) mod stack;

pub(crate) use stack::ValueStack;

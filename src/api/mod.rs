//! Duktape-style stack API
//!
//! Every operation addresses values by a signed index into the current
//! frame: `0` is the frame bottom and `-1` the top. Inside a host function
//! the frame holds exactly the arguments of the call; at the top level it is
//! the whole stack.
//!
//! The operations are split by concern:
//! - `stack`: push, typed reads, coercions and stack shape
//! - `property`: property access on objects and the global object
//! - `call`: plain and protected calls
//! - `host`: host objects, method suites and handles

mod call;
mod host;
mod property;
mod stack;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::gc::ObjectId;
use crate::value::Value;

impl Context {
    /// Resolve a frame index to an absolute stack slot
    pub(crate) fn require_index(&self, index: i32) -> Result<usize> {
        self.stack.normalize(index).ok_or(Error::InvalidIndex(index))
    }

    pub(crate) fn value_at(&self, index: i32) -> Result<&Value> {
        self.stack.get(index).ok_or(Error::InvalidIndex(index))
    }

    /// Object at `index`, or `NotObject`
    pub(crate) fn require_object(&self, index: i32) -> Result<ObjectId> {
        self.value_at(index)?
            .as_object()
            .ok_or(Error::NotObject(index))
    }

    /// Short description of a value for type mismatch errors
    pub(crate) fn describe_value(&self, value: &Value) -> String {
        match value {
            Value::Object(id) => match self.heap.get(*id) {
                Some(object) => object.class_name().to_string(),
                None => "object".to_string(),
            },
            other => other.get_type().name().to_string(),
        }
    }

    /// Require `count` values in the current frame
    pub(crate) fn require_values(&self, count: usize) -> Result<()> {
        let available = self.stack.top();
        if count > available {
            return Err(Error::StackUnderflow {
                needed: count,
                available,
            });
        }
        Ok(())
    }
}

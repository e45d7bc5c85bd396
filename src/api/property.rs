//! Property access through the stack

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value;

impl Context {
    /// Push `target[key]` for the value at `index`
    ///
    /// Returns whether the property exists. Primitives other than `null` and
    /// `undefined` are accepted (`"abc".length` works).
    pub fn get_prop_string(&mut self, index: i32, key: &str) -> Result<bool> {
        let target = self.value_at(index)?.clone();
        if target.is_nullish() {
            return Err(Error::NotObject(index));
        }
        let value = self.get_property(&target, key).map_err(|_| self.take_error())?;
        let exists = match target {
            Value::Object(id) => self.object_has(id, key),
            _ => !value.is_undefined(),
        };
        self.stack.push(value);
        Ok(exists)
    }

    /// Pop the top value and store it as `key` of the object at `index`
    ///
    /// `index` is resolved before the value is popped.
    pub fn put_prop_string(&mut self, index: i32, key: &str) -> Result<()> {
        let id = self.require_object(index)?;
        let value = self.stack.pop().ok_or(Error::StackUnderflow {
            needed: 1,
            available: 0,
        })?;
        self.object_put(id, key, value).map_err(|_| self.take_error())
    }

    pub fn has_prop_string(&self, index: i32, key: &str) -> Result<bool> {
        let id = self.require_object(index)?;
        Ok(self.object_has(id, key))
    }

    /// Delete `key` from the object at `index`
    pub fn del_prop_string(&mut self, index: i32, key: &str) -> Result<bool> {
        let id = self.require_object(index)?;
        Ok(self.object_delete(id, key))
    }

    pub fn get_prop_index(&mut self, index: i32, element: u32) -> Result<bool> {
        self.get_prop_string(index, &element.to_string())
    }

    pub fn put_prop_index(&mut self, index: i32, element: u32) -> Result<()> {
        self.put_prop_string(index, &element.to_string())
    }

    /// Push the global variable `key`
    pub fn get_global_string(&mut self, key: &str) -> Result<bool> {
        let exists = self.object_has(self.global, key);
        let value = self.object_get(self.global, key);
        self.stack.push(value);
        Ok(exists)
    }

    /// Pop the top value into the global variable `key`
    pub fn put_global_string(&mut self, key: &str) -> Result<()> {
        let value = self.stack.pop().ok_or(Error::StackUnderflow {
            needed: 1,
            available: 0,
        })?;
        self.object_put(self.global, key, value).map_err(|_| self.take_error())
    }

    /// Pop a function and install it as the finalizer of the object at `index`
    ///
    /// `undefined` removes the finalizer. The finalizer is called once with
    /// the object as its argument when the collector finds it unreachable.
    pub fn set_finalizer(&mut self, index: i32) -> Result<()> {
        let id = self.require_object(index)?;
        self.require_values(1)?;
        let finalizer = match self.value_at(-1)? {
            Value::Undefined => None,
            value => {
                if !self.is_callable_value(value) {
                    return Err(Error::type_mismatch("function", self.describe_value(value)));
                }
                value.as_object()
            }
        };
        self.stack.pop();
        if let Some(object) = self.heap.get_mut(id) {
            object.finalizer = finalizer;
            object.finalized = false;
        }
        Ok(())
    }

    /// Push the finalizer of the object at `index`, or `undefined`
    pub fn get_finalizer(&mut self, index: i32) -> Result<()> {
        let id = self.require_object(index)?;
        let finalizer = self
            .heap
            .get(id)
            .and_then(|o| o.finalizer)
            .map_or(Value::Undefined, Value::Object);
        self.stack.push(finalizer);
        Ok(())
    }
}

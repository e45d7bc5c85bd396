//! Push, read and reshape stack values

use std::rc::Rc;

use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::{HeapObject, Nargs, ObjectKind};
use crate::util::utf16_len;
use crate::value::{Type, Value};
use crate::vm::ops;

/// Integer view of a number: truncated, saturating, `NaN` as zero
#[inline]
fn number_to_int(n: f64) -> i32 {
    n as i32
}

impl Context {
    // ---- push ----

    pub fn push_undefined(&mut self) {
        self.stack.push(Value::Undefined);
    }

    pub fn push_null(&mut self) {
        self.stack.push(Value::Null);
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.stack.push(Value::Bool(value));
    }

    pub fn push_int(&mut self, value: i32) {
        self.stack.push(Value::from(value));
    }

    pub fn push_number(&mut self, value: f64) {
        self.stack.push(Value::Number(value));
    }

    pub fn push_string(&mut self, value: &str) {
        self.stack.push(Value::string(value));
    }

    /// Push an empty object, returning its index
    pub fn push_object(&mut self) -> i32 {
        let id = self.heap.alloc(HeapObject::new(ObjectKind::Plain));
        self.stack.push(Value::Object(id));
        self.get_top() - 1
    }

    /// Push an empty array, returning its index
    pub fn push_array(&mut self) -> i32 {
        let id = self.heap.alloc(HeapObject::new(ObjectKind::Array(Vec::new())));
        self.stack.push(Value::Object(id));
        self.get_top() - 1
    }

    pub fn push_global_object(&mut self) {
        self.stack.push(Value::Object(self.global));
    }

    /// Push the `this` binding of the running host function
    ///
    /// Outside of a host call this pushes `undefined`.
    pub fn push_this(&mut self) {
        let this = self
            .host_frames
            .last()
            .and_then(|&slot| self.stack.get_abs(slot))
            .cloned()
            .unwrap_or_default();
        self.stack.push(this);
    }

    /// Push a host function object, returning its index
    pub fn push_host_function<F>(&mut self, func: F, nargs: Nargs) -> i32
    where
        F: Fn(&mut Context) -> Result<usize> + 'static,
    {
        let id = self.alloc_host_function("", Rc::new(func), nargs);
        self.stack.push(Value::Object(id));
        self.get_top() - 1
    }

    /// Push a new error object of the given class, returning its index
    pub fn push_error_object(&mut self, kind: ErrorKind, message: &str) -> i32 {
        let id = self.new_error_object(kind, kind.name(), message);
        self.stack.push(Value::Object(id));
        self.get_top() - 1
    }

    // ---- type checks ----

    /// Type tag at `index`, `Type::None` when the index is invalid
    pub fn get_type(&self, index: i32) -> Type {
        self.stack.get(index).map_or(Type::None, Value::get_type)
    }

    pub fn check_type(&self, index: i32, expected: Type) -> bool {
        self.get_type(index) == expected
    }

    pub fn is_valid_index(&self, index: i32) -> bool {
        self.stack.normalize(index).is_some()
    }

    pub fn is_undefined(&self, index: i32) -> bool {
        self.get_type(index).is_undefined()
    }

    pub fn is_null(&self, index: i32) -> bool {
        self.get_type(index).is_null()
    }

    pub fn is_null_or_undefined(&self, index: i32) -> bool {
        matches!(self.get_type(index), Type::Null | Type::Undefined)
    }

    pub fn is_boolean(&self, index: i32) -> bool {
        self.get_type(index).is_boolean()
    }

    pub fn is_number(&self, index: i32) -> bool {
        self.get_type(index).is_number()
    }

    pub fn is_string(&self, index: i32) -> bool {
        self.get_type(index).is_string()
    }

    pub fn is_object(&self, index: i32) -> bool {
        self.get_type(index).is_object()
    }

    fn object_kind_at(&self, index: i32) -> Option<&ObjectKind> {
        let id = self.stack.get(index)?.as_object()?;
        self.heap.get(id).map(|o| &o.kind)
    }

    pub fn is_array(&self, index: i32) -> bool {
        matches!(self.object_kind_at(index), Some(ObjectKind::Array(_)))
    }

    pub fn is_error(&self, index: i32) -> bool {
        matches!(self.object_kind_at(index), Some(ObjectKind::Error(_)))
    }

    pub fn is_callable(&self, index: i32) -> bool {
        matches!(self.object_kind_at(index), Some(ObjectKind::Function(_)))
    }

    pub fn is_host_object(&self, index: i32) -> bool {
        matches!(self.object_kind_at(index), Some(ObjectKind::HostProxy(_)))
    }

    // ---- typed reads ----

    fn mismatch(&self, index: i32, expected: Type) -> Error {
        match self.stack.get(index) {
            Some(value) => Error::type_mismatch(expected, self.describe_value(value)),
            None => Error::InvalidIndex(index),
        }
    }

    pub fn get_boolean(&self, index: i32) -> Result<bool> {
        match self.value_at(index)? {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(index, Type::Boolean)),
        }
    }

    pub fn get_number(&self, index: i32) -> Result<f64> {
        match self.value_at(index)? {
            Value::Number(n) => Ok(*n),
            _ => Err(self.mismatch(index, Type::Number)),
        }
    }

    /// Number at `index` truncated to an integer
    pub fn get_int(&self, index: i32) -> Result<i32> {
        self.get_number(index).map(number_to_int)
    }

    pub fn get_string(&self, index: i32) -> Result<String> {
        match self.value_at(index)? {
            Value::String(s) => Ok(s.to_string()),
            _ => Err(self.mismatch(index, Type::String)),
        }
    }

    /// String length in UTF-16 units or array length; zero for anything else
    pub fn get_length(&self, index: i32) -> Result<usize> {
        Ok(match self.value_at(index)? {
            Value::String(s) => utf16_len(s),
            Value::Object(id) => match self.heap.get(*id).map(|o| &o.kind) {
                Some(ObjectKind::Array(items)) => items.len(),
                _ => 0,
            },
            _ => 0,
        })
    }

    // ---- coercions, replacing the value in place ----

    pub fn to_boolean(&mut self, index: i32) -> Result<bool> {
        let abs = self.require_index(index)?;
        let value = self.value_at(index)?;
        let b = ops::to_boolean(value);
        self.stack.set_abs(abs, Value::Bool(b));
        Ok(b)
    }

    pub fn to_number(&mut self, index: i32) -> Result<f64> {
        let abs = self.require_index(index)?;
        let n = self.to_number_value(self.value_at(index)?);
        self.stack.set_abs(abs, Value::Number(n));
        Ok(n)
    }

    pub fn to_int(&mut self, index: i32) -> Result<i32> {
        let abs = self.require_index(index)?;
        let n = number_to_int(self.to_number_value(self.value_at(index)?));
        self.stack.set_abs(abs, Value::from(n));
        Ok(n)
    }

    pub fn to_string(&mut self, index: i32) -> Result<String> {
        let abs = self.require_index(index)?;
        let s = self.to_display_string(self.value_at(index)?);
        self.stack.set_abs(abs, Value::string(&s));
        Ok(s)
    }

    // ---- stack shape ----

    /// Number of values in the current frame
    pub fn get_top(&self) -> i32 {
        self.stack.top() as i32
    }

    /// Grow the frame with `undefined` or shrink it to `index` values
    ///
    /// A negative `index` counts from the current top.
    pub fn set_top(&mut self, index: i32) -> Result<()> {
        let count = if index >= 0 {
            index as usize
        } else {
            self.stack
                .top()
                .checked_sub(index.unsigned_abs() as usize)
                .ok_or(Error::InvalidIndex(index))?
        };
        if count > self.stack.top() && self.stack.bottom() + count > self.config.max_stack_values {
            return Err(Error::InvalidIndex(index));
        }
        self.stack.resize_frame(count);
        Ok(())
    }

    /// Convert any valid index to its non-negative form
    pub fn normalize_index(&self, index: i32) -> Result<i32> {
        let abs = self.require_index(index)?;
        Ok((abs - self.stack.bottom()) as i32)
    }

    pub fn pop(&mut self) -> Result<()> {
        self.pop_n(1)
    }

    pub fn pop_n(&mut self, count: usize) -> Result<()> {
        self.require_values(count)?;
        self.stack.truncate(self.stack.len() - count);
        Ok(())
    }

    /// Push a copy of the value at `index`
    pub fn dup(&mut self, index: i32) -> Result<()> {
        let abs = self.require_index(index)?;
        self.stack.dup_abs(abs);
        Ok(())
    }

    pub fn dup_top(&mut self) -> Result<()> {
        self.dup(-1)
    }

    pub fn swap(&mut self, a: i32, b: i32) -> Result<()> {
        let a = self.require_index(a)?;
        let b = self.require_index(b)?;
        self.stack.swap_abs(a, b);
        Ok(())
    }

    /// Move the top value to `index`, shifting the values above it up
    pub fn insert(&mut self, index: i32) -> Result<()> {
        let abs = self.require_index(index)?;
        let value = self.stack.remove_abs(self.stack.len() - 1);
        self.stack.insert_abs(abs, value);
        Ok(())
    }

    /// Remove the value at `index`, shifting the values above it down
    pub fn remove(&mut self, index: i32) -> Result<()> {
        let abs = self.require_index(index)?;
        self.stack.remove_abs(abs);
        Ok(())
    }

    /// Pop the top value and write it over the value at `index`
    pub fn replace(&mut self, index: i32) -> Result<()> {
        let abs = self.require_index(index)?;
        let value = self.stack.remove_abs(self.stack.len() - 1);
        if abs < self.stack.len() {
            self.stack.set_abs(abs, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;

    #[test]
    fn test_push_and_read() {
        let mut ctx = Context::new();
        ctx.push_undefined();
        ctx.push_null();
        ctx.push_boolean(true);
        ctx.push_int(7);
        ctx.push_number(2.5);
        ctx.push_string("hé");

        assert_eq!(ctx.get_top(), 6);
        assert_eq!(ctx.get_type(0), Type::Undefined);
        assert_eq!(ctx.get_type(1), Type::Null);
        assert!(ctx.get_boolean(2).unwrap());
        assert_eq!(ctx.get_int(3).unwrap(), 7);
        assert_eq!(ctx.get_number(-2).unwrap(), 2.5);
        assert_eq!(ctx.get_string(-1).unwrap(), "hé");
        assert_eq!(ctx.get_length(-1).unwrap(), 2);
        assert_eq!(ctx.get_type(6), Type::None);
    }

    #[test]
    fn test_typed_read_mismatch() {
        let mut ctx = Context::new();
        ctx.push_string("x");
        assert!(matches!(ctx.get_number(-1), Err(Error::TypeMismatch { .. })));
        assert!(matches!(ctx.get_string(-2), Err(Error::InvalidIndex(-2))));
        ctx.push_array();
        let err = ctx.get_boolean(-1).unwrap_err();
        assert_eq!(err.to_string(), "type mismatch: expected boolean, found Array");
    }

    #[test]
    fn test_coercions_in_place() {
        let mut ctx = Context::new();
        ctx.push_string("42");
        assert_eq!(ctx.to_number(-1).unwrap(), 42.0);
        assert!(ctx.is_number(-1));
        assert_eq!(ctx.to_string(-1).unwrap(), "42");
        assert!(ctx.is_string(-1));
        ctx.push_number(-3.9);
        assert_eq!(ctx.to_int(-1).unwrap(), -3);
        ctx.push_string("");
        assert!(!ctx.to_boolean(-1).unwrap());
    }

    #[test]
    fn test_stack_shape() {
        let mut ctx = Context::new();
        for i in 0..4 {
            ctx.push_int(i);
        }
        ctx.swap(0, -1).unwrap();
        assert_eq!(ctx.get_int(0).unwrap(), 3);
        ctx.dup(1).unwrap();
        assert_eq!(ctx.get_int(-1).unwrap(), 1);
        ctx.insert(0).unwrap();
        assert_eq!(ctx.get_int(0).unwrap(), 1);
        ctx.remove(0).unwrap();
        ctx.push_int(9);
        ctx.replace(0).unwrap();
        assert_eq!(ctx.get_int(0).unwrap(), 9);
        assert_eq!(ctx.normalize_index(-1).unwrap(), 3);

        ctx.set_top(6).unwrap();
        assert!(ctx.is_undefined(5));
        ctx.set_top(-4).unwrap();
        assert_eq!(ctx.get_top(), 2);
        ctx.pop_n(2).unwrap();
        assert!(matches!(
            ctx.pop(),
            Err(Error::StackUnderflow {
                needed: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn test_type_checks() {
        let mut ctx = Context::new();
        ctx.push_null();
        assert!(ctx.check_type(-1, Type::Null));
        assert!(ctx.is_null_or_undefined(-1));
        assert!(ctx.is_valid_index(0));
        assert!(!ctx.is_valid_index(1));
        assert!(ctx.check_type(1, Type::None));

        ctx.push_string("s");
        ctx.dup_top().unwrap();
        assert_eq!(ctx.get_top(), 3);
        assert!(!ctx.is_null_or_undefined(-1));
        assert_eq!(ctx.get_string(-1).unwrap(), "s");
    }

    #[test]
    fn test_set_top_respects_stack_limit() {
        let mut ctx = Context::with_config(ContextConfig::default().with_max_stack_values(8));
        assert!(matches!(ctx.set_top(i32::MAX), Err(Error::InvalidIndex(i32::MAX))));
        assert!(matches!(ctx.set_top(9), Err(Error::InvalidIndex(9))));
        assert_eq!(ctx.get_top(), 0);

        ctx.set_top(8).unwrap();
        assert_eq!(ctx.get_top(), 8);
        ctx.set_top(2).unwrap();
        assert_eq!(ctx.get_top(), 2);
    }

    #[test]
    fn test_push_this_outside_call() {
        let mut ctx = Context::new();
        ctx.push_this();
        assert!(ctx.is_undefined(-1));
    }
}

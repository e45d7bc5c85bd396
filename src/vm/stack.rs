//! Value stack for the VM
//!
//! One stack is shared by the evaluator and the public stack API. Host
//! calls see a frame starting at `bottom`; non-negative indices count up
//! from the frame bottom and negative indices count down from the top.
//! Values below the bottom belong to callers and are unreachable from the
//! API until the frame is left again.

use crate::value::Value;

/// Value stack with a movable frame bottom
pub struct ValueStack {
    /// Stack storage
    values: Vec<Value>,
    /// Absolute index of the current frame's first slot
    bottom: usize,
}

impl ValueStack {
    /// Create a new stack with the given capacity
    pub fn new(capacity: usize) -> Self {
        ValueStack {
            values: Vec::with_capacity(capacity),
            bottom: 0,
        }
    }

    /// Push a value onto the stack
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pop a value from the stack, refusing to cross the frame bottom
    #[inline]
    pub fn pop(&mut self) -> Option<Value> {
        if self.values.len() > self.bottom {
            self.values.pop()
        } else {
            None
        }
    }

    /// Peek at the top value without removing it
    #[inline]
    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    /// Peek at a value at offset from top (0 = top)
    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<&Value> {
        let len = self.values.len();
        if offset < len {
            Some(&self.values[len - 1 - offset])
        } else {
            None
        }
    }

    /// Total number of values, including those below the frame
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values in the current frame
    #[inline]
    pub fn top(&self) -> usize {
        self.values.len() - self.bottom
    }

    /// Absolute index of the frame bottom
    #[inline]
    pub fn bottom(&self) -> usize {
        self.bottom
    }

    /// Shrink the stack to `len` absolute slots
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Grow or shrink the current frame to `count` values
    pub fn resize_frame(&mut self, count: usize) {
        self.values.resize(self.bottom + count, Value::Undefined);
    }

    /// Convert a frame-relative index into an absolute one
    pub fn normalize(&self, index: i32) -> Option<usize> {
        let abs = if index >= 0 {
            self.bottom.checked_add(index as usize)?
        } else {
            self.values.len().checked_sub(index.unsigned_abs() as usize)?
        };
        if abs >= self.bottom && abs < self.values.len() {
            Some(abs)
        } else {
            None
        }
    }

    /// Get value at a frame-relative index
    #[inline]
    pub fn get(&self, index: i32) -> Option<&Value> {
        self.normalize(index).map(|abs| &self.values[abs])
    }

    #[inline]
    pub fn get_abs(&self, abs: usize) -> Option<&Value> {
        self.values.get(abs)
    }

    #[inline]
    pub fn set_abs(&mut self, abs: usize, value: Value) {
        self.values[abs] = value;
    }

    /// Insert `value` at an absolute index, shifting the values above it up
    #[inline]
    pub fn insert_abs(&mut self, abs: usize, value: Value) {
        self.values.insert(abs, value);
    }

    /// Remove the value at an absolute index, shifting the values above it down
    #[inline]
    pub fn remove_abs(&mut self, abs: usize) -> Value {
        self.values.remove(abs)
    }

    #[inline]
    pub fn swap_abs(&mut self, a: usize, b: usize) {
        self.values.swap(a, b);
    }

    /// Duplicate the value at an absolute index onto the top
    pub fn dup_abs(&mut self, abs: usize) {
        let value = self.values[abs].clone();
        self.values.push(value);
    }

    /// Start a new frame at absolute index `bottom`, returning the previous bottom
    pub fn enter_frame(&mut self, bottom: usize) -> usize {
        debug_assert!(bottom <= self.values.len());
        std::mem::replace(&mut self.bottom, bottom)
    }

    /// Return to the frame that `enter_frame` replaced
    pub fn leave_frame(&mut self, prev_bottom: usize) {
        self.bottom = prev_bottom;
    }

    /// Every value on the stack, for the collector's root set
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Drop every value and reset the frame
    pub fn clear(&mut self) {
        self.values.clear();
        self.bottom = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_push_pop() {
        let mut stack = ValueStack::new(16);

        stack.push(num(1.0));
        stack.push(num(2.0));
        stack.push(num(3.0));

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop(), Some(num(3.0)));
        assert_eq!(stack.pop(), Some(num(2.0)));
        assert_eq!(stack.pop(), Some(num(1.0)));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_peek() {
        let mut stack = ValueStack::new(16);

        stack.push(num(1.0));
        stack.push(num(2.0));

        assert_eq!(stack.peek(), Some(&num(2.0)));
        assert_eq!(stack.peek_at(0), Some(&num(2.0)));
        assert_eq!(stack.peek_at(1), Some(&num(1.0)));
        assert!(stack.peek_at(2).is_none());
    }

    #[test]
    fn test_normalize() {
        let mut stack = ValueStack::new(16);
        for i in 0..4 {
            stack.push(num(i as f64));
        }

        assert_eq!(stack.normalize(0), Some(0));
        assert_eq!(stack.normalize(3), Some(3));
        assert_eq!(stack.normalize(4), None);
        assert_eq!(stack.normalize(-1), Some(3));
        assert_eq!(stack.normalize(-4), Some(0));
        assert_eq!(stack.normalize(-5), None);
        assert_eq!(stack.normalize(i32::MIN), None);
    }

    #[test]
    fn test_frames() {
        let mut stack = ValueStack::new(16);
        stack.push(num(10.0));
        stack.push(num(20.0));

        let prev = stack.enter_frame(1);
        assert_eq!(stack.top(), 1);
        assert_eq!(stack.get(0), Some(&num(20.0)));
        // the caller's value is out of reach
        assert_eq!(stack.normalize(-2), None);

        assert_eq!(stack.pop(), Some(num(20.0)));
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.len(), 1);

        stack.resize_frame(2);
        assert_eq!(stack.get(1), Some(&Value::Undefined));

        stack.leave_frame(prev);
        assert_eq!(stack.top(), 3);
        assert_eq!(stack.get(0), Some(&num(10.0)));
    }

    #[test]
    fn test_insert_remove() {
        let mut stack = ValueStack::new(16);
        stack.push(num(1.0));
        stack.push(num(3.0));

        stack.insert_abs(1, num(2.0));
        assert_eq!(stack.values(), &[num(1.0), num(2.0), num(3.0)]);

        assert_eq!(stack.remove_abs(0), num(1.0));
        stack.swap_abs(0, 1);
        stack.dup_abs(0);
        assert_eq!(stack.values(), &[num(3.0), num(2.0), num(3.0)]);
    }
}

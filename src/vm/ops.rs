//! Value conversions and operators
//!
//! Type conversions follow the ECMAScript abstract operations, restricted to
//! what an engine without prototypes or user-defined `toString` needs: object
//! to primitive conversion never runs script code, so none of these helpers
//! can re-enter the evaluator.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::gc::ObjectId;
use crate::context::Context;
use crate::parser::ast::BinaryOp;
use crate::runtime::{Function, ObjectKind};
use crate::util::unicode::char_at_utf16;
use crate::util::{array_index, number_to_string, string_to_number, utf16_len};
use crate::value::Value;
use crate::vm::interpreter::Flow;

/// Index past the current length beyond which array writes are refused
const MAX_ARRAY_GROWTH: usize = 1 << 24;

/// ToBoolean
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => !(n.is_nan() || *n == 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Object(_) => true,
    }
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc() % 4_294_967_296.0;
    let n = if n < 0.0 { n + 4_294_967_296.0 } else { n };
    n as u32
}

/// Strict equality (`===`)
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x == y,
        _ => false,
    }
}

fn compare_utf16(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

impl Context {
    /// ToString, also used to display values to host code
    pub(crate) fn to_display_string(&self, value: &Value) -> String {
        let mut out = String::new();
        self.display_into(value, &mut out, &mut Vec::new());
        out
    }

    fn display_into(&self, value: &Value, out: &mut String, seen: &mut Vec<ObjectId>) {
        match value {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&number_to_string(*n)),
            Value::String(s) => out.push_str(s),
            Value::Object(id) => self.display_object(*id, out, seen),
        }
    }

    fn display_object(&self, id: ObjectId, out: &mut String, seen: &mut Vec<ObjectId>) {
        let Some(object) = self.heap.get(id) else {
            out.push_str("[object Object]");
            return;
        };
        match &object.kind {
            ObjectKind::Array(elements) => {
                // cyclic arrays print as empty, like Array.prototype.join
                if seen.contains(&id) {
                    return;
                }
                seen.push(id);
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if !element.is_nullish() {
                        self.display_into(element, out, seen);
                    }
                }
                seen.pop();
            }
            ObjectKind::Error(kind) => {
                let name = match object.properties.get("name") {
                    Some(Value::Undefined) | None => kind.name().to_string(),
                    Some(name) => self.to_display_string(name),
                };
                let message = match object.properties.get("message") {
                    Some(Value::Undefined) | None => String::new(),
                    Some(message) => self.to_display_string(message),
                };
                match (name.is_empty(), message.is_empty()) {
                    (_, true) => out.push_str(&name),
                    (true, false) => out.push_str(&message),
                    (false, false) => {
                        out.push_str(&name);
                        out.push_str(": ");
                        out.push_str(&message);
                    }
                }
            }
            ObjectKind::Function(function) => {
                let body = match function {
                    Function::Closure { .. } => "[ecmascript code]",
                    Function::Host { .. } | Function::Method { .. } => "[native code]",
                };
                out.push_str(&format!("function {}() {{ {body} }}", function.name()));
            }
            ObjectKind::Plain | ObjectKind::HostProxy(_) | ObjectKind::Scope { .. } => {
                out.push_str("[object ");
                out.push_str(object.class_name());
                out.push(']');
            }
        }
    }

    /// ToNumber
    pub(crate) fn to_number_value(&self, value: &Value) -> f64 {
        match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => string_to_number(&self.to_display_string(value)),
        }
    }

    /// ToPropertyKey
    pub(crate) fn to_property_key(&self, value: &Value) -> Rc<str> {
        match value {
            Value::String(s) => Rc::clone(s),
            other => Rc::from(self.to_display_string(other)),
        }
    }

    /// ToPrimitive with no hint: objects become their string form
    fn to_primitive(&self, value: &Value) -> Value {
        match value {
            Value::Object(_) => Value::from(self.to_display_string(value)),
            other => other.clone(),
        }
    }

    /// The `typeof` operator
    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(id) => {
                if self.heap.get(*id).is_some_and(|o| o.is_callable()) {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Loose equality (`==`)
    pub(crate) fn loose_equals(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(x), Value::String(_)) => *x == self.to_number_value(b),
            (Value::String(_), Value::Number(y)) => self.to_number_value(a) == *y,
            (Value::Bool(_), _) => self.loose_equals(&Value::Number(self.to_number_value(a)), b),
            (_, Value::Bool(_)) => self.loose_equals(a, &Value::Number(self.to_number_value(b))),
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                self.loose_equals(&self.to_primitive(a), b)
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                self.loose_equals(a, &self.to_primitive(b))
            }
            _ => strict_equals(a, b),
        }
    }

    /// Abstract relational comparison, `None` when either side is NaN
    fn compare(&self, a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
        let a = self.to_primitive(a);
        let b = self.to_primitive(b);
        if let (Value::String(x), Value::String(y)) = (&a, &b) {
            return Some(compare_utf16(x, y));
        }
        self.to_number_value(&a)
            .partial_cmp(&self.to_number_value(&b))
    }

    /// Apply a binary operator
    pub(crate) fn binary_op(&mut self, op: BinaryOp, a: &Value, b: &Value) -> Flow<Value> {
        let num = |ctx: &Self, v: &Value| ctx.to_number_value(v);
        let result = match op {
            BinaryOp::Add => {
                let a = self.to_primitive(a);
                let b = self.to_primitive(b);
                if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
                    let mut s = self.to_display_string(&a);
                    s.push_str(&self.to_display_string(&b));
                    Value::from(s)
                } else {
                    Value::Number(num(self, &a) + num(self, &b))
                }
            }
            BinaryOp::Sub => Value::Number(num(self, a) - num(self, b)),
            BinaryOp::Mul => Value::Number(num(self, a) * num(self, b)),
            BinaryOp::Div => Value::Number(num(self, a) / num(self, b)),
            BinaryOp::Mod => Value::Number(num(self, a) % num(self, b)),
            BinaryOp::Exp => {
                let base = num(self, a);
                let exponent = num(self, b);
                if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
                    Value::Number(f64::NAN)
                } else {
                    Value::Number(base.powf(exponent))
                }
            }
            BinaryOp::Shl => {
                let shift = to_uint32(num(self, b)) & 31;
                Value::from(to_int32(num(self, a)).wrapping_shl(shift))
            }
            BinaryOp::Shr => {
                let shift = to_uint32(num(self, b)) & 31;
                Value::from(to_int32(num(self, a)) >> shift)
            }
            BinaryOp::UShr => {
                let shift = to_uint32(num(self, b)) & 31;
                Value::Number((to_uint32(num(self, a)) >> shift) as f64)
            }
            BinaryOp::BitAnd => Value::from(to_int32(num(self, a)) & to_int32(num(self, b))),
            BinaryOp::BitOr => Value::from(to_int32(num(self, a)) | to_int32(num(self, b))),
            BinaryOp::BitXor => Value::from(to_int32(num(self, a)) ^ to_int32(num(self, b))),
            BinaryOp::Eq => Value::Bool(self.loose_equals(a, b)),
            BinaryOp::NotEq => Value::Bool(!self.loose_equals(a, b)),
            BinaryOp::StrictEq => Value::Bool(strict_equals(a, b)),
            BinaryOp::StrictNotEq => Value::Bool(!strict_equals(a, b)),
            BinaryOp::Lt => Value::Bool(self.compare(a, b).is_some_and(|o| o.is_lt())),
            BinaryOp::LtEq => Value::Bool(self.compare(a, b).is_some_and(|o| o.is_le())),
            BinaryOp::Gt => Value::Bool(self.compare(a, b).is_some_and(|o| o.is_gt())),
            BinaryOp::GtEq => Value::Bool(self.compare(a, b).is_some_and(|o| o.is_ge())),
            BinaryOp::In => {
                let Value::Object(id) = b else {
                    let found = self.type_of(b);
                    return Err(self.throw_error(
                        ErrorKind::TypeError,
                        format!("cannot use 'in' operator to search a {found}"),
                    ));
                };
                let key = self.to_property_key(a);
                Value::Bool(self.object_has(*id, &key))
            }
        };
        Ok(result)
    }

    // ---- property access ----

    /// `target[key]` for any value
    pub(crate) fn get_property(&mut self, target: &Value, key: &str) -> Flow<Value> {
        match target {
            Value::Undefined | Value::Null => {
                let what = self.to_display_string(target);
                Err(self.throw_error(
                    ErrorKind::TypeError,
                    format!("cannot read property '{key}' of {what}"),
                ))
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(utf16_len(s) as f64));
                }
                Ok(array_index(key)
                    .and_then(|i| char_at_utf16(s, i))
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default())
            }
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
            Value::Object(id) => Ok(self.object_get(*id, key)),
        }
    }

    /// Own property lookup on a heap object
    pub(crate) fn object_get(&self, id: ObjectId, key: &str) -> Value {
        let Some(object) = self.heap.get(id) else {
            return Value::Undefined;
        };
        match &object.kind {
            ObjectKind::Array(elements) => {
                if key == "length" {
                    return Value::Number(elements.len() as f64);
                }
                if let Some(value) = array_index(key).and_then(|i| elements.get(i)) {
                    return value.clone();
                }
            }
            ObjectKind::Function(function) if !object.properties.contains(key) => {
                match key {
                    "name" => return Value::from(function.name()),
                    "length" => return Value::Number(function.length() as f64),
                    _ => {}
                }
            }
            _ => {}
        }
        object.properties.get(key).cloned().unwrap_or_default()
    }

    /// `target[key] = value` for any value
    pub(crate) fn put_property(&mut self, target: &Value, key: &str, value: Value) -> Flow<()> {
        match target {
            Value::Undefined | Value::Null => {
                let what = self.to_display_string(target);
                Err(self.throw_error(
                    ErrorKind::TypeError,
                    format!("cannot set property '{key}' of {what}"),
                ))
            }
            Value::Object(id) => self.object_put(*id, key, value),
            // writes to primitives are silently dropped
            _ => Ok(()),
        }
    }

    pub(crate) fn object_put(&mut self, id: ObjectId, key: &str, value: Value) -> Flow<()> {
        let is_array = self.heap.get(id).is_some_and(|o| o.is_array());
        if is_array {
            if key == "length" {
                let n = self.to_number_value(&value);
                let len = to_uint32(n);
                if len as f64 != n || self.array_len(id) + MAX_ARRAY_GROWTH < len as usize {
                    return Err(self.throw_error(ErrorKind::RangeError, "invalid array length"));
                }
                if let Some(ObjectKind::Array(elements)) = self.heap.get_mut(id).map(|o| &mut o.kind) {
                    elements.resize(len as usize, Value::Undefined);
                }
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                if index > self.array_len(id) + MAX_ARRAY_GROWTH {
                    return Err(self.throw_error(ErrorKind::RangeError, "invalid array length"));
                }
                if let Some(ObjectKind::Array(elements)) = self.heap.get_mut(id).map(|o| &mut o.kind) {
                    if index >= elements.len() {
                        elements.resize(index + 1, Value::Undefined);
                    }
                    elements[index] = value;
                }
                return Ok(());
            }
        }
        if let Some(object) = self.heap.get_mut(id) {
            object.properties.set(key, value);
        }
        Ok(())
    }

    fn array_len(&self, id: ObjectId) -> usize {
        match self.heap.get(id).map(|o| &o.kind) {
            Some(ObjectKind::Array(elements)) => elements.len(),
            _ => 0,
        }
    }

    /// Own property check on a heap object
    pub(crate) fn object_has(&self, id: ObjectId, key: &str) -> bool {
        let Some(object) = self.heap.get(id) else {
            return false;
        };
        match &object.kind {
            ObjectKind::Array(elements) => {
                if key == "length" || array_index(key).is_some_and(|i| i < elements.len()) {
                    return true;
                }
            }
            ObjectKind::Function(_) if key == "name" || key == "length" => return true,
            _ => {}
        }
        object.properties.contains(key)
    }

    /// Delete an own property, returning whether it is gone
    pub(crate) fn object_delete(&mut self, id: ObjectId, key: &str) -> bool {
        let Some(object) = self.heap.get_mut(id) else {
            return true;
        };
        if let ObjectKind::Array(elements) = &mut object.kind {
            if key == "length" {
                return false;
            }
            if let Some(index) = array_index(key) {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return true;
            }
        }
        object.properties.remove(key);
        true
    }

    /// Enumerable own keys, in `for-in` order
    pub(crate) fn own_keys(&self, value: &Value) -> Vec<Rc<str>> {
        match value {
            Value::String(s) => (0..utf16_len(s)).map(|i| Rc::from(i.to_string())).collect(),
            Value::Object(id) => {
                let Some(object) = self.heap.get(*id) else {
                    return Vec::new();
                };
                let mut keys: Vec<Rc<str>> = match &object.kind {
                    ObjectKind::Array(elements) => {
                        (0..elements.len()).map(|i| Rc::from(i.to_string())).collect()
                    }
                    _ => Vec::new(),
                };
                keys.extend(object.properties.keys().cloned());
                keys
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_boolean() {
        assert!(!to_boolean(&Value::Undefined));
        assert!(!to_boolean(&Value::Number(f64::NAN)));
        assert!(!to_boolean(&Value::Number(-0.0)));
        assert!(!to_boolean(&Value::string("")));
        assert!(to_boolean(&Value::string("0")));
        assert!(to_boolean(&Value::Number(-1.0)));
    }

    #[test]
    fn test_int32_conversions() {
        assert_eq!(to_int32(4_294_967_295.0), -1);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(-1.5), -1);
        assert_eq!(to_int32(f64::INFINITY), 0);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_uint32(f64::NAN), 0);
    }

    #[test]
    fn test_strict_equals() {
        assert!(strict_equals(&Value::Null, &Value::Null));
        assert!(!strict_equals(&Value::Null, &Value::Undefined));
        assert!(!strict_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(strict_equals(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(!strict_equals(&Value::string("1"), &Value::Number(1.0)));
    }

    #[test]
    fn test_loose_equals() {
        let ctx = Context::new();
        assert!(ctx.loose_equals(&Value::Null, &Value::Undefined));
        assert!(ctx.loose_equals(&Value::string("1"), &Value::Number(1.0)));
        assert!(ctx.loose_equals(&Value::Bool(true), &Value::string("1")));
        assert!(!ctx.loose_equals(&Value::Null, &Value::Number(0.0)));
    }

    #[test]
    fn test_binary_add() {
        let mut ctx = Context::new();
        let sum = ctx
            .binary_op(BinaryOp::Add, &Value::Number(1.0), &Value::Number(2.0))
            .unwrap();
        assert_eq!(sum, Value::Number(3.0));

        let concat = ctx
            .binary_op(BinaryOp::Add, &Value::string("a"), &Value::Number(1.0))
            .unwrap();
        assert_eq!(concat, Value::string("a1"));
    }

    #[test]
    fn test_string_comparison_utf16() {
        let mut ctx = Context::new();
        // U+FF61 sorts after U+1F600 in UTF-16 but before it by code point
        let lt = ctx
            .binary_op(BinaryOp::Lt, &Value::string("\u{1F600}"), &Value::string("\u{FF61}"))
            .unwrap();
        assert_eq!(lt, Value::Bool(true));
    }
}

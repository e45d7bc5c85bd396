//! JavaScript value representation
//!
//! `Value` is the tagged union stored on the value stack, in object
//! properties and in scopes. Primitive strings are shared immutable
//! `Rc<str>`; everything else that lives on the heap is referenced through
//! an [`ObjectId`] handle owned by the garbage collector.
//!
//! `Type` is the coarse type tag reported by the stack API, matching the
//! Duktape type classes (`None` marks an invalid stack index).

use std::fmt;
use std::rc::Rc;

use crate::gc::ObjectId;

/// Type tag of a stack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (index outside the current frame)
    None,
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    /// Any heap value: plain objects, arrays, functions, host proxies, errors
    Object,
}

impl Type {
    #[inline]
    pub fn is_none(self) -> bool {
        self == Type::None
    }

    #[inline]
    pub fn is_undefined(self) -> bool {
        self == Type::Undefined
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self == Type::Null
    }

    #[inline]
    pub fn is_boolean(self) -> bool {
        self == Type::Boolean
    }

    #[inline]
    pub fn is_number(self) -> bool {
        self == Type::Number
    }

    #[inline]
    pub fn is_string(self) -> bool {
        self == Type::String
    }

    #[inline]
    pub fn is_object(self) -> bool {
        self == Type::Object
    }

    /// Check if values of this type are primitives
    #[inline]
    pub fn is_primitive(self) -> bool {
        !matches!(self, Type::None | Type::Object)
    }

    /// Lower-case type name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Type::None => "none",
            Type::Undefined => "undefined",
            Type::Null => "null",
            Type::Boolean => "boolean",
            Type::Number => "number",
            Type::String => "string",
            Type::Object => "object",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A JavaScript value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectId),
}

impl Value {
    /// Create a string value
    #[inline]
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    /// Get the type tag of this value
    pub fn get_type(&self) -> Type {
        match self {
            Value::Undefined => Type::Undefined,
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Boolean,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Object(_) => Type::Object,
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is nullish (null or undefined)
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Get the heap handle, returns None for primitives
    #[inline]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the number, returns None if not a number
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the boolean, returns None if not a boolean
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the string contents, returns None if not a string
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

//! Heap object layout
//!
//! Every heap value shares the same header: a property table, an optional
//! finalizer and a flag recording whether that finalizer already ran. The
//! `kind` carries the per-class payload.

use crate::error::ErrorKind;
use crate::gc::ObjectId;
use crate::registry::Handle;
use crate::runtime::function::Function;
use crate::runtime::property::PropertyTable;
use crate::value::Value;

/// Object class and class-specific payload
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Ordinary object
    Plain,
    /// Dense array
    Array(Vec<Value>),
    /// Error instance, `name` and `message` live in the property table
    Error(ErrorKind),
    /// Callable object
    Function(Function),
    /// Script-side stand-in for a host value in the registry
    HostProxy(Handle),
    /// Activation scope of a function call or catch clause
    ///
    /// Variables are stored in the property table.
    Scope {
        parent: Option<ObjectId>,
        this: Value,
    },
}

/// A garbage-collected object
#[derive(Debug, Clone)]
pub struct HeapObject {
    pub kind: ObjectKind,
    pub properties: PropertyTable,
    /// Function called once when the object becomes unreachable
    pub finalizer: Option<ObjectId>,
    /// Set by the collector when the finalizer has been queued
    pub finalized: bool,
}

impl HeapObject {
    pub fn new(kind: ObjectKind) -> Self {
        HeapObject {
            kind,
            properties: PropertyTable::new(),
            finalizer: None,
            finalized: false,
        }
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn host_handle(&self) -> Option<Handle> {
        match self.kind {
            ObjectKind::HostProxy(handle) => Some(handle),
            _ => None,
        }
    }

    /// Class name, as used by `Object.prototype.toString`
    pub fn class_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Plain | ObjectKind::Scope { .. } => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Error(_) => "Error",
            ObjectKind::Function(_) => "Function",
            ObjectKind::HostProxy(_) => "HostObject",
        }
    }

    /// Visit every heap object directly referenced by this one
    pub fn trace(&self, visit: &mut dyn FnMut(ObjectId)) {
        for value in self.properties.values() {
            if let Value::Object(id) = value {
                visit(*id);
            }
        }
        if let Some(finalizer) = self.finalizer {
            visit(finalizer);
        }
        match &self.kind {
            ObjectKind::Array(elements) => {
                for value in elements {
                    if let Value::Object(id) = value {
                        visit(*id);
                    }
                }
            }
            ObjectKind::Function(function) => function.trace(visit),
            ObjectKind::Scope { parent, this } => {
                if let Some(parent) = parent {
                    visit(*parent);
                }
                if let Value::Object(id) = this {
                    visit(*id);
                }
            }
            ObjectKind::Plain | ObjectKind::Error(_) | ObjectKind::HostProxy(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::Heap;

    #[test]
    fn test_trace_visits_children() {
        let mut heap = Heap::new();
        let a = heap.alloc(HeapObject::new(ObjectKind::Plain));
        let b = heap.alloc(HeapObject::new(ObjectKind::Plain));
        let f = heap.alloc(HeapObject::new(ObjectKind::Plain));

        let mut array = HeapObject::new(ObjectKind::Array(vec![
            Value::Number(1.0),
            Value::Object(a),
        ]));
        array.properties.set("extra", Value::Object(b));
        array.finalizer = Some(f);

        let mut seen = Vec::new();
        array.trace(&mut |id| seen.push(id));
        seen.sort_by_key(|id| id.index());
        assert_eq!(seen, vec![a, b, f]);
    }

    #[test]
    fn test_scope_traces_parent_and_this() {
        let mut heap = Heap::new();
        let parent = heap.alloc(HeapObject::new(ObjectKind::Plain));
        let this = heap.alloc(HeapObject::new(ObjectKind::Plain));
        let scope = HeapObject::new(ObjectKind::Scope {
            parent: Some(parent),
            this: Value::Object(this),
        });

        let mut seen = Vec::new();
        scope.trace(&mut |id| seen.push(id));
        assert_eq!(seen, vec![parent, this]);
        assert_eq!(scope.class_name(), "Object");
    }
}

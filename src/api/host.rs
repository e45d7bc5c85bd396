//! Host objects and method suites on the stack
//!
//! A host value handed to scripts lives in the context's registry; the
//! script sees an opaque proxy object that records only the handle. When the
//! collector frees the proxy, the registry entry goes with it.

use std::any::Any;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::registry::Handle;
use crate::runtime::{Function, HeapObject, ObjectKind};
use crate::suite::MethodSuite;
use crate::value::Value;

impl Context {
    /// Register `value` and push a proxy for it
    pub fn push_host_object<T: Any>(&mut self, value: T) -> Handle {
        self.push_host_rc(Rc::new(value))
    }

    /// Register a shared host value and push a proxy for it
    ///
    /// The registry keeps one strong reference until the proxy is collected
    /// or the context is destroyed.
    pub fn push_host_rc<T: Any>(&mut self, value: Rc<T>) -> Handle {
        let handle = self.registry.register(value);
        let proxy = self.heap.alloc(HeapObject::new(ObjectKind::HostProxy(handle)));
        self.stack.push(Value::Object(proxy));
        handle
    }

    /// Handle behind the host proxy at `index`
    pub fn get_host_handle(&self, index: i32) -> Result<Handle> {
        let value = self.value_at(index)?;
        value
            .as_object()
            .and_then(|id| self.heap.get(id))
            .and_then(|o| o.host_handle())
            .ok_or_else(|| Error::type_mismatch("host object", self.describe_value(value)))
    }

    /// Recover the host value behind the proxy at `index`
    ///
    /// Fails with `TypeMismatch` when the stored value is not a `T`, and with
    /// `NotFound` when its registry entry is already gone.
    pub fn get_host_object<T: Any>(&self, index: i32) -> Result<Rc<T>> {
        let handle = self.get_host_handle(index)?;
        self.registry.lookup_as::<T>(handle)
    }

    /// Register `suite` and push a proxy whose properties call its methods
    pub fn push_method_suite(&mut self, suite: MethodSuite) -> Handle {
        let names: Vec<Rc<str>> = suite.names().map(Rc::from).collect();
        let handle = self.registry.register(Rc::new(suite));
        let proxy = self.heap.alloc(HeapObject::new(ObjectKind::HostProxy(handle)));
        for name in names {
            let method = self.heap.alloc(HeapObject::new(ObjectKind::Function(Function::Method {
                suite: proxy,
                name: Rc::clone(&name),
            })));
            if let Some(object) = self.heap.get_mut(proxy) {
                object.properties.set(&name, Value::Object(method));
            }
        }
        self.stack.push(Value::Object(proxy));
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_host_object_round_trip() {
        let mut ctx = Context::new();
        let handle = ctx.push_host_object(Point { x: 1, y: 2 });
        assert!(ctx.is_host_object(-1));
        assert_eq!(ctx.get_host_handle(-1).unwrap(), handle);
        assert_eq!(*ctx.get_host_object::<Point>(-1).unwrap(), Point { x: 1, y: 2 });
        assert_eq!(ctx.registry().len(), 1);
    }

    #[test]
    fn test_wrong_type_is_mismatch() {
        let mut ctx = Context::new();
        ctx.push_host_object(5_u8);
        assert!(matches!(
            ctx.get_host_object::<String>(-1),
            Err(Error::TypeMismatch { .. })
        ));
        ctx.push_object();
        assert!(matches!(ctx.get_host_handle(-1), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_proxy_collection_releases_entry() {
        let shared = Rc::new(String::from("kept"));
        let mut ctx = Context::new();
        ctx.push_host_rc(Rc::clone(&shared));
        assert_eq!(Rc::strong_count(&shared), 2);

        ctx.pop().unwrap();
        let stats = ctx.gc();
        assert_eq!(stats.handles_released, 1);
        assert!(ctx.registry().is_empty());
        assert_eq!(Rc::strong_count(&shared), 1);
    }

    #[test]
    fn test_method_suite_proxy() {
        let mut ctx = Context::new();
        let suite = MethodSuite::new().method("one", |ctx| {
            ctx.push_int(1);
            Ok(1)
        });
        ctx.push_method_suite(suite);
        assert!(ctx.has_prop_string(-1, "one").unwrap());
        ctx.call_prop(-1, "one", 0).unwrap();
        assert_eq!(ctx.get_int(-1).unwrap(), 1);
    }
}

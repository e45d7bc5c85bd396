//! Method suites
//!
//! A [`MethodSuite`] is a named set of host functions handed to a script as
//! one object. Each entry becomes a callable property of that object.
//!
//! ```ignore
//! let counter = Rc::new(Cell::new(0));
//! let state = Rc::clone(&counter);
//! let suite = MethodSuite::new().method("inc", move |ctx| {
//!     state.set(state.get() + 1);
//!     ctx.push_int(state.get());
//!     Ok(1)
//! });
//! ctx.eval_with("(function (o) { return o.inc() })", suite)?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::Result;
use crate::runtime::HostFunction;

/// Ordered map from method name to host function
#[derive(Clone, Default)]
pub struct MethodSuite {
    methods: BTreeMap<String, HostFunction>,
}

impl MethodSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn method<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<usize> + 'static,
    {
        self.insert(name, func);
        self
    }

    /// Add or replace a method, returning the previous one
    pub fn insert<F>(&mut self, name: impl Into<String>, func: F) -> Option<HostFunction>
    where
        F: Fn(&mut Context) -> Result<usize> + 'static,
    {
        self.methods.insert(name.into(), Rc::new(func))
    }

    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl<S: Into<String>> FromIterator<(S, HostFunction)> for MethodSuite {
    fn from_iter<I: IntoIterator<Item = (S, HostFunction)>>(iter: I) -> Self {
        MethodSuite {
            methods: iter.into_iter().map(|(name, func)| (name.into(), func)).collect(),
        }
    }
}

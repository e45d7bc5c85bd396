//! Host object registry
//!
//! Maps opaque [`Handle`]s to host-owned values handed into the engine. Each
//! context owns exactly one registry; the only writer besides the stack API is
//! the collector, which releases the handle of every proxy it sweeps.
//!
//! Entries hold an `Rc` clone of the host value. Releasing an entry drops that
//! clone only, so host code that kept its own `Rc` is unaffected.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, Result};

/// Opaque token identifying a registry entry
///
/// Handles are allocated from a monotonically increasing counter and are
/// never reused within a context, so a stale handle can never alias a newer
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Raw numeric value of the handle
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct HostEntry {
    value: Rc<dyn Any>,
    type_name: &'static str,
}

/// Table of host values currently reachable from script code
pub struct HostRegistry {
    entries: HashMap<Handle, HostEntry>,
    next: u64,
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry {
            entries: HashMap::new(),
            next: 1,
        }
    }

    /// Store a host value under a fresh handle
    pub fn register<T: Any>(&mut self, value: Rc<T>) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        let type_name = type_name::<T>();
        trace!(%handle, type_name, "registered host object");
        self.entries.insert(handle, HostEntry { value, type_name });
        handle
    }

    /// Look up the type-erased value stored under `handle`
    pub fn lookup(&self, handle: Handle) -> Result<&Rc<dyn Any>> {
        self.entries
            .get(&handle)
            .map(|entry| &entry.value)
            .ok_or(Error::NotFound(handle))
    }

    /// Look up the value stored under `handle` and recover its concrete type
    pub fn lookup_as<T: Any>(&self, handle: Handle) -> Result<Rc<T>> {
        let entry = self.entries.get(&handle).ok_or(Error::NotFound(handle))?;
        Rc::clone(&entry.value)
            .downcast::<T>()
            .map_err(|_| Error::type_mismatch(type_name::<T>(), entry.type_name))
    }

    /// Name of the concrete type stored under `handle`
    pub fn type_name_of(&self, handle: Handle) -> Result<&'static str> {
        self.entries
            .get(&handle)
            .map(|entry| entry.type_name)
            .ok_or(Error::NotFound(handle))
    }

    /// Remove the entry for `handle`, returning the registry's reference
    ///
    /// A second release of the same handle fails with [`Error::NotFound`].
    pub fn release(&mut self, handle: Handle) -> Result<Rc<dyn Any>> {
        let entry = self.entries.remove(&handle).ok_or(Error::NotFound(handle))?;
        trace!(%handle, type_name = entry.type_name, "released host object");
        Ok(entry.value)
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Number of live entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live handles in allocation order
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.entries.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Drop every entry, returning how many were live
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRegistry")
            .field("live", &self.entries.len())
            .field("next", &self.next)
            .finish()
    }
}

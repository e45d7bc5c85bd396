//! Property table
//!
//! Properties are kept in insertion order, which is also the enumeration
//! order seen by `for-in`. Objects in embedding scenarios carry a handful
//! of properties, so lookup is a linear scan.

use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    entries: Vec<(Rc<str>, Value)>,
}

impl PropertyTable {
    pub fn new() -> Self {
        PropertyTable {
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| &**k == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Define or overwrite a property
    pub fn set(&mut self, key: &str, value: Value) {
        match self.position(key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((Rc::from(key), value)),
        }
    }

    /// Delete a property, returning its old value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.position(key)?;
        Some(self.entries.remove(i).1)
    }

    /// Property names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

//! Runtime object model
//!
//! Heap objects, their property tables and the function representations
//! shared by script closures, host functions and method trampolines.

pub mod function;
pub mod object;
pub mod property;

pub use function::{Function, HostFunction, Nargs};
pub use object::{HeapObject, ObjectKind};
pub use property::PropertyTable;

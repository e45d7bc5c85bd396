//! Garbage collector module
//!
//! Objects live in a slot heap addressed by generational [`ObjectId`]s and
//! are reclaimed by a non-moving mark-sweep collector. Collection only ever
//! runs when the host asks for it, so every value held on the value stack,
//! in a scope or in a pending finalizer queue stays valid between passes.
//!
//! Objects with a finalizer survive the first pass that finds them
//! unreachable: the finalizer is queued and run once, and the object is
//! reclaimed by the next pass if it is still unreachable.

mod collector;
mod heap;

pub use collector::{GcStats, Sweep};
pub use heap::{Heap, ObjectId};

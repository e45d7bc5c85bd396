//! Mark-sweep garbage collector
//!
//! A pass works in three phases:
//! 1. Mark: trace every object reachable from the roots
//! 2. Rescue: unreachable objects with a finalizer that has not run yet are
//!    queued for finalization and traced again so they survive this pass
//! 3. Sweep: free every object still unmarked, collecting the registry
//!    handles of swept host proxies
//!
//! The collector never touches the host registry or runs script code itself.
//! It reports what it found in a [`Sweep`] and the context acts on it.

use super::heap::{Heap, ObjectId};
use crate::registry::Handle;
use crate::runtime::ObjectKind;

/// Outcome of one collector pass
#[derive(Debug, Default)]
pub struct Sweep {
    /// Objects freed by the pass
    pub freed: usize,
    /// Handles of host proxies that were freed
    pub released: Vec<Handle>,
    /// Objects kept alive this pass so their finalizer can run
    pub to_finalize: Vec<ObjectId>,
}

/// Statistics about a GC run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects reachable after the pass
    pub live_objects: usize,
    /// Objects freed
    pub freed: usize,
    /// Script finalizers invoked
    pub finalizers_run: usize,
    /// Host registry entries released
    pub handles_released: usize,
}

impl Heap {
    /// Run one full collection with the given root set
    pub fn collect<I>(&mut self, roots: I) -> Sweep
    where
        I: IntoIterator<Item = ObjectId>,
    {
        self.gc_runs += 1;
        self.marks.iter_mut().for_each(|mark| *mark = false);

        self.worklist.clear();
        self.worklist.extend(roots);
        self.drain_worklist();

        let to_finalize = self.rescue_finalizable();
        if !to_finalize.is_empty() {
            self.worklist.extend(to_finalize.iter().copied());
            self.drain_worklist();
        }

        let mut sweep = Sweep {
            to_finalize,
            ..Sweep::default()
        };
        for index in 0..self.slots.len() {
            if self.marks[index] {
                continue;
            }
            if let Some(object) = self.free_slot(index) {
                sweep.freed += 1;
                if let ObjectKind::HostProxy(handle) = object.kind {
                    sweep.released.push(handle);
                }
            }
        }
        sweep
    }

    fn drain_worklist(&mut self) {
        let Heap {
            slots,
            marks,
            worklist,
            ..
        } = self;

        while let Some(id) = worklist.pop() {
            let index = id.index();
            let Some(slot) = slots.get(index) else {
                continue;
            };
            if marks[index] {
                continue;
            }
            let Some(object) = slot.object.as_ref() else {
                continue;
            };
            marks[index] = true;
            object.trace(&mut |child| worklist.push(child));
        }
    }

    fn rescue_finalizable(&mut self) -> Vec<ObjectId> {
        let mut rescued = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if self.marks[index] {
                continue;
            }
            let generation = slot.generation;
            let Some(object) = slot.object.as_mut() else {
                continue;
            };
            if object.finalizer.is_some() && !object.finalized {
                object.finalized = true;
                rescued.push(ObjectId::from_parts(index as u32, generation));
            }
        }
        rescued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::HeapObject;
    use crate::value::Value;

    const NO_ROOTS: [ObjectId; 0] = [];

    fn plain(heap: &mut Heap) -> ObjectId {
        heap.alloc(HeapObject::new(ObjectKind::Plain))
    }

    #[test]
    fn test_collect_empty_heap() {
        let mut heap = Heap::new();
        let sweep = heap.collect(NO_ROOTS);
        assert_eq!(sweep.freed, 0);
        assert_eq!(heap.gc_runs(), 1);
    }

    #[test]
    fn test_unreachable_objects_freed() {
        let mut heap = Heap::new();
        let root = plain(&mut heap);
        let child = plain(&mut heap);
        let garbage = plain(&mut heap);
        heap.get_mut(root)
            .unwrap()
            .properties
            .set("child", Value::Object(child));

        let sweep = heap.collect([root]);

        assert_eq!(sweep.freed, 1);
        assert!(heap.is_valid(root));
        assert!(heap.is_valid(child));
        assert!(!heap.is_valid(garbage));
    }

    #[test]
    fn test_cycles_collected() {
        let mut heap = Heap::new();
        let a = plain(&mut heap);
        let b = plain(&mut heap);
        heap.get_mut(a).unwrap().properties.set("b", Value::Object(b));
        heap.get_mut(b).unwrap().properties.set("a", Value::Object(a));

        let sweep = heap.collect(NO_ROOTS);
        assert_eq!(sweep.freed, 2);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_host_proxy_handle_reported() {
        use crate::registry::HostRegistry;
        use std::rc::Rc;

        let mut registry = HostRegistry::new();
        let handle = registry.register(Rc::new("payload"));
        let mut heap = Heap::new();
        heap.alloc(HeapObject::new(ObjectKind::HostProxy(handle)));

        let sweep = heap.collect(NO_ROOTS);
        assert_eq!(sweep.released, vec![handle]);
    }

    #[test]
    fn test_finalizable_object_survives_one_pass() {
        let mut heap = Heap::new();
        let finalizer = plain(&mut heap);
        let target = plain(&mut heap);
        heap.get_mut(target).unwrap().finalizer = Some(finalizer);

        let first = heap.collect(NO_ROOTS);
        assert_eq!(first.to_finalize, vec![target]);
        assert_eq!(first.freed, 0);
        assert!(heap.is_valid(finalizer));

        let second = heap.collect(NO_ROOTS);
        assert!(second.to_finalize.is_empty());
        assert_eq!(second.freed, 2);
        assert!(!heap.is_valid(target));
    }
}

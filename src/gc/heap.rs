//! Slot heap
//!
//! Objects are stored in a `Vec` of slots. An [`ObjectId`] records the slot
//! index together with the slot's generation at allocation time, so a handle
//! to a swept object is detected rather than silently aliasing whatever is
//! allocated into the slot next.

use std::fmt;

use crate::runtime::HeapObject;

/// Handle to a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    #[inline]
    pub(super) fn from_parts(index: u32, generation: u32) -> Self {
        ObjectId { index, generation }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.{}", self.index, self.generation)
    }
}

pub(super) struct Slot {
    pub(super) generation: u32,
    pub(super) object: Option<HeapObject>,
}

/// Non-moving object heap
pub struct Heap {
    pub(super) slots: Vec<Slot>,
    pub(super) marks: Vec<bool>,
    pub(super) free_list: Vec<u32>,
    /// Worklist used during marking, kept to avoid allocating per pass
    pub(super) worklist: Vec<ObjectId>,
    pub(super) live: usize,
    pub(super) gc_runs: u64,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            marks: Vec::new(),
            free_list: Vec::new(),
            worklist: Vec::new(),
            live: 0,
            gc_runs: 0,
        }
    }

    /// Allocate an object, reusing a free slot when one is available
    pub fn alloc(&mut self, object: HeapObject) -> ObjectId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.object.is_none());
            slot.object = Some(object);
            return ObjectId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        self.marks.push(false);
        ObjectId {
            index,
            generation: 0,
        }
    }

    /// Borrow a live object
    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Mutably borrow a live object
    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Check whether `id` still refers to a live object
    #[inline]
    pub fn is_valid(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live objects
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of completed collection passes
    #[inline]
    pub fn gc_runs(&self) -> u64 {
        self.gc_runs
    }

    pub(super) fn free_slot(&mut self, index: usize) -> Option<HeapObject> {
        let slot = &mut self.slots[index];
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index as u32);
        self.live -= 1;
        Some(object)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

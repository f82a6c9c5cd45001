//! A minimal slab arena with a free list, used to give every in-memory
//! dentry a stable index instead of a raw pointer (see the design notes on
//! cyclic ownership).

use crate::dentry::DentryId;

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Free(Option<u32>),
}

/// Indexed storage for dentries. Removal punches a hole that is reused by
/// the next insertion, so `DentryId`s stay small even across many
/// create/unlink cycles.
#[derive(Debug, Default)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
        }
    }

    /// Inserts `value`, returning its handle.
    pub fn insert(&mut self, value: T) -> DentryId {
        if let Some(idx) = self.free_head {
            let next_free = match &self.slots[idx as usize] {
                Slot::Free(next) => *next,
                Slot::Occupied(_) => unreachable!("free list pointed at an occupied slot"),
            };
            self.free_head = next_free;
            self.slots[idx as usize] = Slot::Occupied(value);
            DentryId(idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot::Occupied(value));
            DentryId(idx)
        }
    }

    pub fn get(&self, id: DentryId) -> &T {
        match &self.slots[id.0 as usize] {
            Slot::Occupied(v) => v,
            Slot::Free(_) => panic!("dangling dentry handle {:?}", id.0),
        }
    }

    pub fn get_mut(&mut self, id: DentryId) -> &mut T {
        match &mut self.slots[id.0 as usize] {
            Slot::Occupied(v) => v,
            Slot::Free(_) => panic!("dangling dentry handle {:?}", id.0),
        }
    }

    /// Removes and returns the value at `id`, freeing the slot for reuse.
    pub fn remove(&mut self, id: DentryId) -> T {
        let slot = std::mem::replace(&mut self.slots[id.0 as usize], Slot::Free(self.free_head));
        self.free_head = Some(id.0);
        match slot {
            Slot::Occupied(v) => v,
            Slot::Free(_) => panic!("double free of dentry handle {:?}", id.0),
        }
    }
}

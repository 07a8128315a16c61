//! Open-addressing hash tables with linear probing and backward-shift deletion.
//!
//! Invariant for every occupied slot `s`: walking forward (cyclically) from
//! `hash(s) % capacity` reaches `s` without crossing an empty slot. Removal restores it
//! by shifting later members of the probe chain into the hole, so there are no
//! tombstones.

pub mod array;
pub mod multi;

use std::mem::size_of;
use std::sync::Arc;

use crate::core::error::Result;
use crate::memory::zone::{MemoryZone, ZoneReservation};

/// Default bucket count of a fresh table
pub const INITIAL_SIZE: usize = 251;

/// Hash and equality callbacks of a table.
pub trait HashPolicy {
    type Key: ?Sized;
    type Element;

    fn hash_key(&self, key: &Self::Key) -> u64;

    fn hash_element(&self, element: &Self::Element) -> u64;

    fn is_equal_key_element(&self, key: &Self::Key, element: &Self::Element) -> bool;

    /// Both elements carry the same indexed values.
    fn is_equal_element_element(&self, left: &Self::Element, right: &Self::Element) -> bool;

    /// Both elements reference the same document. Multi tables use this for identity.
    fn is_same_element(&self, left: &Self::Element, right: &Self::Element) -> bool {
        self.is_equal_element_element(left, right)
    }
}

#[inline]
fn next_slot(i: usize, capacity: usize) -> usize {
    let n = i + 1;
    if n == capacity { 0 } else { n }
}

/// Bucket array shared by the unique and multi tables
pub(crate) struct Slots<E> {
    slots: Vec<Option<E>>,
    used: usize,
    zone: Arc<MemoryZone>,
    memory: ZoneReservation,
}

/// A bucket array allocated ahead of a growing insert
pub(crate) struct Grown<E> {
    slots: Vec<Option<E>>,
    memory: ZoneReservation,
}

impl<E> Slots<E> {
    pub(crate) fn allocate(zone: &Arc<MemoryZone>, capacity: usize) -> Result<Self> {
        let grown = Self::fresh(zone, capacity.max(1))?;
        Ok(Slots {
            slots: grown.slots,
            used: 0,
            zone: Arc::clone(zone),
            memory: grown.memory,
        })
    }

    fn fresh(zone: &Arc<MemoryZone>, capacity: usize) -> Result<Grown<E>> {
        let memory = zone.allocate(capacity * size_of::<Option<E>>())?;
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Grown { slots, memory })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub(crate) fn start(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    #[inline]
    pub(crate) fn next(&self, i: usize) -> usize {
        next_slot(i, self.slots.len())
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> Option<&E> {
        self.slots.get(i).and_then(Option::as_ref)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &E> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.slots.len() * size_of::<Option<E>>()
    }

    /// Allocates the doubled table when one more element would push the load past one
    /// half. Called before the slot is written, so an allocation failure leaves the
    /// table untouched.
    pub(crate) fn prepare_insert(&self) -> Result<Option<Grown<E>>> {
        if self.slots.len() >= 2 * (self.used + 1) {
            return Ok(None);
        }
        Self::fresh(&self.zone, 2 * self.slots.len() + 1).map(Some)
    }

    pub(crate) fn prepare_resize(&self, size: usize) -> Result<Option<Grown<E>>> {
        let target = 2 * size + 1;
        if target <= self.slots.len() {
            return Ok(None);
        }
        Self::fresh(&self.zone, target).map(Some)
    }

    /// Writes into an empty slot found by probing.
    pub(crate) fn fill(&mut self, i: usize, element: E) {
        debug_assert!(self.slots[i].is_none());
        self.slots[i] = Some(element);
        self.used += 1;
    }

    pub(crate) fn replace(&mut self, i: usize, element: E) -> Option<E> {
        self.slots[i].replace(element)
    }

    /// Moves every live element into `grown`, probing with `hash`.
    pub(crate) fn rehash(&mut self, grown: Grown<E>, hash: impl Fn(&E) -> u64) {
        let old = std::mem::replace(&mut self.slots, grown.slots);
        self.memory = grown.memory;
        let capacity = self.slots.len();
        for element in old.into_iter().flatten() {
            let mut i = (hash(&element) % capacity as u64) as usize;
            while self.slots[i].is_some() {
                i = next_slot(i, capacity);
            }
            self.slots[i] = Some(element);
        }
    }

    /// Empties slot `i` and closes the hole by backward shifting.
    pub(crate) fn remove_at(&mut self, mut i: usize, hash: impl Fn(&E) -> u64) -> Option<E> {
        let removed = self.slots[i].take()?;
        self.used -= 1;

        let n = self.slots.len();
        let mut k = next_slot(i, n);
        while let Some(element) = &self.slots[k] {
            let j = (hash(element) % n as u64) as usize;
            // move k into the hole unless its home j lies cyclically in (i, k]
            if (i < k && !(i < j && j <= k)) || (k < i && !(i < j || j <= k)) {
                self.slots[i] = self.slots[k].take();
                i = k;
            }
            k = next_slot(k, n);
        }
        Some(removed)
    }
}

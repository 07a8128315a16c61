use std::sync::Arc;

use crate::core::error::{Error, ErrorKind, Result};
use crate::hash::{HashPolicy, INITIAL_SIZE, Slots};
use crate::memory::zone::MemoryZone;

/// Multi-valued open-addressing table: any number of elements may share a key.
///
/// Equal keys are found by scanning the whole cluster that starts at the key's home
/// bucket, up to the next empty slot.
pub struct MultiHashArray<P: HashPolicy> {
    policy: P,
    slots: Slots<P::Element>,
}

impl<P: HashPolicy> MultiHashArray<P> {
    pub fn new(policy: P, zone: &Arc<MemoryZone>) -> Result<Self> {
        Self::with_capacity(policy, zone, INITIAL_SIZE)
    }

    pub fn with_capacity(policy: P, zone: &Arc<MemoryZone>, capacity: usize) -> Result<Self> {
        Ok(MultiHashArray {
            policy,
            slots: Slots::allocate(zone, capacity)?,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.used()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.used() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.slots.memory_usage()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P::Element> {
        self.slots.iter()
    }

    /// All elements stored under `key`.
    pub fn lookup_by_key(&self, key: &P::Key) -> Vec<&P::Element> {
        let mut result = Vec::new();
        let mut i = self.slots.start(self.policy.hash_key(key));
        while let Some(element) = self.slots.get(i) {
            if self.policy.is_equal_key_element(key, element) {
                result.push(element);
            }
            i = self.slots.next(i);
        }
        result
    }

    fn probe_same(&self, element: &P::Element) -> usize {
        let mut i = self.slots.start(self.policy.hash_element(element));
        while let Some(existing) = self.slots.get(i) {
            if self.policy.is_same_element(element, existing) {
                break;
            }
            i = self.slots.next(i);
        }
        i
    }

    pub fn lookup_by_element(&self, element: &P::Element) -> Option<&P::Element> {
        self.slots.get(self.probe_same(element))
    }

    /// Appends `element` under `key`. Equal keys are expected, nothing is checked.
    pub fn insert_key(&mut self, key: &P::Key, element: P::Element) -> Result<()> {
        let mut i = self.slots.start(self.policy.hash_key(key));
        while self.slots.get(i).is_some() {
            i = self.slots.next(i);
        }
        self.fill(i, element)
    }

    /// Inserts `element` unless the same document is already present, in which case
    /// it is replaced when `overwrite` is set and `ElementExists` is reported otherwise.
    pub fn insert_element(&mut self, element: P::Element, overwrite: bool) -> Result<()> {
        let i = self.probe_same(&element);
        if self.slots.get(i).is_some() {
            if !overwrite {
                return Err(Error::new(ErrorKind::ElementExists, "element already in multi hash array"));
            }
            self.slots.replace(i, element);
            return Ok(());
        }
        self.fill(i, element)
    }

    fn fill(&mut self, i: usize, element: P::Element) -> Result<()> {
        let grown = self.slots.prepare_insert()?;
        self.slots.fill(i, element);
        if let Some(grown) = grown {
            self.slots.rehash(grown, |e| self.policy.hash_element(e));
        }
        Ok(())
    }

    pub fn remove_element(&mut self, element: &P::Element) -> Result<P::Element> {
        let i = self.probe_same(element);
        self.slots
            .remove_at(i, |e| self.policy.hash_element(e))
            .ok_or_else(|| Error::new(ErrorKind::ElementNotFound, "element not found in multi hash array"))
    }

    pub fn resize(&mut self, size: usize) -> Result<()> {
        if let Some(grown) = self.slots.prepare_resize(size)? {
            self.slots.rehash(grown, |e| self.policy.hash_element(e));
        }
        Ok(())
    }
}

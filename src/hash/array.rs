use std::sync::Arc;

use crate::core::error::{Error, ErrorKind, Result};
use crate::hash::{HashPolicy, INITIAL_SIZE, Slots};
use crate::memory::zone::MemoryZone;

/// Single-valued open-addressing table: at most one element per key.
pub struct HashArray<P: HashPolicy> {
    policy: P,
    slots: Slots<P::Element>,
}

impl<P: HashPolicy> HashArray<P> {
    pub fn new(policy: P, zone: &Arc<MemoryZone>) -> Result<Self> {
        Self::with_capacity(policy, zone, INITIAL_SIZE)
    }

    pub fn with_capacity(policy: P, zone: &Arc<MemoryZone>, capacity: usize) -> Result<Self> {
        Ok(HashArray {
            policy,
            slots: Slots::allocate(zone, capacity)?,
        })
    }

    pub fn policy(&self) -> &P {
        &self.policy
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

    /// Raw slot access, `None` for an empty bucket.
    pub fn slot(&self, i: usize) -> Option<&P::Element> {
        self.slots.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &P::Element> {
        self.slots.iter()
    }

    fn probe_key(&self, key: &P::Key) -> usize {
        let mut i = self.slots.start(self.policy.hash_key(key));
        while let Some(element) = self.slots.get(i) {
            if self.policy.is_equal_key_element(key, element) {
                break;
            }
            i = self.slots.next(i);
        }
        i
    }

    fn probe_element(&self, element: &P::Element) -> usize {
        let mut i = self.slots.start(self.policy.hash_element(element));
        while let Some(existing) = self.slots.get(i) {
            if self.policy.is_equal_element_element(element, existing) {
                break;
            }
            i = self.slots.next(i);
        }
        i
    }

    pub fn lookup_by_key(&self, key: &P::Key) -> Option<&P::Element> {
        self.slots.get(self.probe_key(key))
    }

    pub fn lookup_by_element(&self, element: &P::Element) -> Option<&P::Element> {
        self.slots.get(self.probe_element(element))
    }

    /// Inserts `element` under `key`. An existing entry is replaced when `overwrite` is
    /// set, otherwise the insert is a no-op reporting `KeyExists`.
    pub fn insert_key(&mut self, key: &P::Key, element: P::Element, overwrite: bool) -> Result<()> {
        let i = self.probe_key(key);
        self.store(i, element, overwrite, ErrorKind::KeyExists)
    }

    pub fn insert_element(&mut self, element: P::Element, overwrite: bool) -> Result<()> {
        let i = self.probe_element(&element);
        self.store(i, element, overwrite, ErrorKind::ElementExists)
    }

    fn store(&mut self, i: usize, element: P::Element, overwrite: bool, exists: ErrorKind) -> Result<()> {
        if self.slots.get(i).is_some() {
            if !overwrite {
                return Err(Error::new(exists, "hash array already contains an equal entry"));
            }
            self.slots.replace(i, element);
            return Ok(());
        }

        let grown = self.slots.prepare_insert()?;
        self.slots.fill(i, element);
        if let Some(grown) = grown {
            self.slots.rehash(grown, |e| self.policy.hash_element(e));
        }
        Ok(())
    }

    pub fn remove_key(&mut self, key: &P::Key) -> Result<P::Element> {
        let i = self.probe_key(key);
        self.slots
            .remove_at(i, |e| self.policy.hash_element(e))
            .ok_or_else(|| Error::new(ErrorKind::KeyNotFound, "key not found in hash array"))
    }

    pub fn remove_element(&mut self, element: &P::Element) -> Result<P::Element> {
        let i = self.probe_element(element);
        self.slots
            .remove_at(i, |e| self.policy.hash_element(e))
            .ok_or_else(|| Error::new(ErrorKind::ElementNotFound, "element not found in hash array"))
    }

    /// Grows the table so `size` elements fit without further resizes. Never shrinks.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        if let Some(grown) = self.slots.prepare_resize(size)? {
            self.slots.rehash(grown, |e| self.policy.hash_element(e));
        }
        Ok(())
    }
}

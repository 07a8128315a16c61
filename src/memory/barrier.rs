use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::core::error::Result;
use crate::core::types::DocumentRef;
use crate::memory::zone::{MemoryZone, ZoneReservation};

/// Bytes charged for one barrier element
const BARRIER_ELEMENT_SIZE: usize = 64;

/// Ordered list of barriers on one collection. Documents removed while a barrier is
/// outstanding are parked here and released once every barrier ordered before the
/// removal has been dropped.
pub struct BarrierList {
    zone: Arc<MemoryZone>,
    state: Mutex<BarrierState>,
}

#[derive(Default)]
struct BarrierState {
    last_id: u64,
    outstanding: BTreeSet<u64>,
    pending: Vec<(u64, DocumentRef)>,
}

impl BarrierState {
    fn take_releasable(&mut self) -> Vec<DocumentRef> {
        let oldest = self.outstanding.first().copied();
        let mut released = Vec::new();
        self.pending.retain(|(guard, doc)| match oldest {
            Some(oldest) if oldest <= *guard => true,
            _ => {
                released.push(Arc::clone(doc));
                false
            }
        });
        released
    }
}

impl BarrierList {
    pub fn new(zone: Arc<MemoryZone>) -> Arc<Self> {
        Arc::new(BarrierList {
            zone,
            state: Mutex::new(BarrierState::default()),
        })
    }

    /// Orders a new barrier. Fails with `OutOfMemory` before anything is registered.
    pub fn order(self: &Arc<Self>) -> Result<Barrier> {
        let memory = self.zone.allocate(BARRIER_ELEMENT_SIZE)?;
        let mut state = self.state.lock();
        state.last_id += 1;
        let id = state.last_id;
        state.outstanding.insert(id);
        trace!(target: "barrier.order", id);

        Ok(Barrier {
            list: Arc::clone(self),
            id,
            _memory: memory,
        })
    }

    /// Hands a removed document to the list. It is dropped right away when no barrier
    /// could still observe it.
    pub fn defer_release(&self, doc: DocumentRef) {
        let mut state = self.state.lock();
        if state.outstanding.is_empty() {
            drop(state);
            drop(doc);
            return;
        }
        let guard = state.last_id;
        state.pending.push((guard, doc));
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn release(&self, id: u64) {
        let released = {
            let mut state = self.state.lock();
            state.outstanding.remove(&id);
            state.take_releasable()
        };
        if !released.is_empty() {
            trace!(target: "barrier.release", id, documents = released.len());
        }
    }
}

/// RAII barrier element
pub struct Barrier {
    list: Arc<BarrierList>,
    id: u64,
    _memory: ZoneReservation,
}

impl Barrier {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        self.list.release(self.id);
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::error;

use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneId {
    /// Never fails. Exceeding its limit terminates the process.
    Core,
    /// May fail with `OutOfMemory`.
    Unknown,
}

impl ZoneId {
    pub fn name(self) -> &'static str {
        match self {
            ZoneId::Core => "core",
            ZoneId::Unknown => "unknown",
        }
    }

    pub fn failable(self) -> bool {
        matches!(self, ZoneId::Unknown)
    }
}

/// Memory usage tracker for one allocation zone
pub struct MemoryZone {
    pub id: ZoneId,
    pub usage: AtomicUsize,
    pub limit: usize,
}

impl fmt::Debug for MemoryZone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemoryZone")
            .field("name", &self.id.name())
            .field("usage", &self.current_usage())
            .field("limit", &self.limit)
            .finish()
    }
}

impl MemoryZone {
    pub fn new(id: ZoneId, limit: usize) -> Arc<Self> {
        Arc::new(MemoryZone {
            id,
            usage: AtomicUsize::new(0),
            limit,
        })
    }

    pub fn unbounded(id: ZoneId) -> Arc<Self> {
        Self::new(id, usize::MAX)
    }

    /// Charges `size` bytes to the zone. The returned reservation gives them back on drop.
    pub fn allocate(self: &Arc<Self>, size: usize) -> Result<ZoneReservation> {
        self.charge(size)?;
        Ok(ZoneReservation {
            zone: Arc::clone(self),
            size,
        })
    }

    fn charge(&self, size: usize) -> Result<()> {
        let previous = self.usage.fetch_add(size, Ordering::SeqCst);
        let exceeded = previous.checked_add(size).is_none_or(|total| total > self.limit);
        if !exceeded {
            return Ok(());
        }
        self.usage.fetch_sub(size, Ordering::SeqCst);

        if !self.id.failable() {
            error!(
                target: "memory.zone",
                zone = self.id.name(),
                size,
                usage = previous,
                "failed to allocate from non-failing zone, giving up"
            );
            std::process::abort();
        }
        Err(Error::new(
            ErrorKind::OutOfMemory,
            format!("memory zone '{}' limit exceeded", self.id.name()),
        ))
    }

    fn release(&self, size: usize) {
        self.usage.fetch_sub(size, Ordering::SeqCst);
    }

    pub fn current_usage(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }
}

/// Bytes charged to a zone, returned when dropped.
pub struct ZoneReservation {
    zone: Arc<MemoryZone>,
    size: usize,
}

impl ZoneReservation {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn zone(&self) -> &Arc<MemoryZone> {
        &self.zone
    }
}

impl fmt::Debug for ZoneReservation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ZoneReservation({} bytes in {})", self.size, self.zone.id.name())
    }
}

impl Drop for ZoneReservation {
    fn drop(&mut self) {
        self.zone.release(self.size);
    }
}

/// The two zones every component allocates from
#[derive(Debug, Clone)]
pub struct MemoryZones {
    pub core: Arc<MemoryZone>,
    pub unknown: Arc<MemoryZone>,
}

impl MemoryZones {
    pub fn from_config(config: &Config) -> Self {
        MemoryZones {
            core: MemoryZone::new(ZoneId::Core, config.core_memory_limit),
            unknown: MemoryZone::new(ZoneId::Unknown, config.unknown_memory_limit),
        }
    }

    pub fn unbounded() -> Self {
        MemoryZones {
            core: MemoryZone::unbounded(ZoneId::Core),
            unknown: MemoryZone::unbounded(ZoneId::Unknown),
        }
    }
}

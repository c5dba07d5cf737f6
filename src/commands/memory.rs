//! Free memory check run before accepting an upload.

use sysinfo::System;
use tracing::warn;

const MIB: u64 = 1024 * 1024;

/// Source of the amount of free memory.
pub trait MemoryProbe: Send + Sync {
    /// Returns free memory in bytes.
    fn free_bytes(&self) -> u64;
}

/// Reads free memory from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn free_bytes(&self) -> u64 {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.free_memory()
    }
}

/// Refuses work while free memory is under a threshold.
pub struct MemoryGuard {
    probe: Box<dyn MemoryProbe>,
    threshold_mib: u64,
}

impl MemoryGuard {
    /// Creates a guard backed by the system memory probe.
    #[must_use]
    pub fn system(threshold_mib: u64) -> Self {
        Self::new(Box::new(SystemMemory), threshold_mib)
    }

    /// Creates a guard with a custom probe.
    #[must_use]
    pub fn new(probe: Box<dyn MemoryProbe>, threshold_mib: u64) -> Self {
        Self {
            probe,
            threshold_mib,
        }
    }

    /// Returns true if free memory is at or above the threshold.
    #[must_use]
    pub fn has_room(&self) -> bool {
        let free = self.probe.free_bytes();
        // Compare in bytes so a fractional MiB below the threshold still counts as full.
        let ok = free >= self.threshold_mib.saturating_mul(MIB);
        if !ok {
            warn!(
                "Free memory {} MiB is below the {} MiB threshold",
                free / MIB,
                self.threshold_mib
            );
        }
        ok
    }
}

impl std::fmt::Debug for MemoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGuard")
            .field("threshold_mib", &self.threshold_mib)
            .finish_non_exhaustive()
    }
}

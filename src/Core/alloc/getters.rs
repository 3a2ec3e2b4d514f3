use super::*;
use crate::Core::SharedMemory::SharedMemoryBackend;

/// Getter methods for HostAllocator
///
/// These expose the private bookkeeping for debugging and monitoring.
impl HostAllocator {
    /// Byte budget, if one was configured.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of allocations currently live.
    pub fn live_allocations(&self) -> usize {
        self.live.lock().len()
    }
}

/// Getter methods for AcceleratorAllocator
impl AcceleratorAllocator {
    /// Get a reference to the underlying mapped backend
    ///
    /// # Safety
    /// The returned reference must not outlive the AcceleratorAllocator, and
    /// callers must not write into extents handed out by `allocate`.
    pub unsafe fn backend(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Total arena size in bytes.
    pub fn capacity(&self) -> usize {
        self.shm.size()
    }

    /// Bytes not currently handed out (may be fragmented).
    pub fn available(&self) -> usize {
        self.state.lock().free.values().sum()
    }

    /// Number of free extents; 1 means the arena is fully coalesced.
    pub fn free_extents(&self) -> usize {
        self.state.lock().free.len()
    }
}

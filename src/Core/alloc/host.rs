use super::{AllocCounters, AllocStats, MemoryAllocator};
use crate::Datatype::{LayoutDescriptor, Residency};
use crate::error::{AdapterError, Result};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Arc;

lazy_static! {
    static ref GLOBAL_HOST: Arc<HostAllocator> = Arc::new(HostAllocator::new());
}

/// Host staging memory from the C heap (`malloc`/`free`).
///
/// Live allocations are tracked so that an optional byte budget can be
/// enforced and frees of foreign pointers are refused.
pub struct HostAllocator {
    pub(super) limit: Option<usize>,
    pub(super) live: Mutex<HashMap<usize, usize>>,
    pub(super) counters: AllocCounters,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self {
            limit: None,
            live: Mutex::new(HashMap::new()),
            counters: AllocCounters::default(),
        }
    }

    /// An allocator that refuses to hold more than `limit` bytes at once.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Process-wide host allocator shared by adapters that are not given one.
    pub fn global() -> Arc<HostAllocator> {
        GLOBAL_HOST.clone()
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAllocator for HostAllocator {
    fn residency(&self) -> Residency {
        Residency::Host
    }

    fn allocate(&self, size: usize, _descriptor: Option<&dyn LayoutDescriptor>) -> Result<NonNull<u8>> {
        let mut live = self.live.lock();

        if let Some(limit) = self.limit {
            let in_use = self.counters.bytes_in_use() as usize;
            if in_use.saturating_add(size) > limit {
                self.counters.record_failure();
                tracing::debug!(size, in_use, limit, "host allocation over budget");
                return Err(AdapterError::exhausted(size, Residency::Host));
            }
        }

        // malloc(0) may return null; never ask for zero bytes
        let raw = unsafe { libc::malloc(size.max(1)) } as *mut u8;
        let Some(ptr) = NonNull::new(raw) else {
            self.counters.record_failure();
            tracing::debug!(size, "malloc failed");
            return Err(AdapterError::exhausted(size, Residency::Host));
        };

        live.insert(ptr.as_ptr() as usize, size);
        self.counters.record_alloc(size);
        tracing::trace!(size, ptr = ?ptr, "host staging allocated");
        Ok(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        // budget checks in `allocate` read the counters under this lock
        let mut live = self.live.lock();
        let Some(size) = live.remove(&(ptr.as_ptr() as usize)) else {
            tracing::warn!(ptr = ?ptr, "refusing to free pointer not allocated here");
            return;
        };
        libc::free(ptr.as_ptr() as *mut libc::c_void);
        self.counters.record_free(size);
        drop(live);
        tracing::trace!(size, ptr = ?ptr, "host staging freed");
    }

    fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }
}

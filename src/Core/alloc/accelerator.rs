use super::{AllocCounters, AllocStats, MemoryAllocator};
use crate::Core::SharedMemory::{create_shared_memory, SharedMemoryBackend};
use crate::Datatype::{LayoutDescriptor, Residency};
use crate::error::{AdapterError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ptr::NonNull;

/// Minimum placement granularity inside the arena.
pub const ARENA_ALIGN: usize = 128;

pub(super) struct ArenaState {
    /// offset -> length of free extents, coalesced
    pub(super) free: BTreeMap<usize, usize>,
    /// offset -> length of handed-out extents
    pub(super) live: HashMap<usize, usize>,
}

/// Accelerator staging memory carved out of a mapped arena.
///
/// Placement is first-fit over a coalescing free list. The descriptor's
/// alignment hint is honoured on top of the 128-byte arena granularity.
pub struct AcceleratorAllocator {
    pub(super) shm: Box<dyn SharedMemoryBackend>,
    pub(super) state: Mutex<ArenaState>,
    pub(super) counters: AllocCounters,
}

impl AcceleratorAllocator {
    /// Map an arena of at least `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        let aligned = (capacity.max(1) + ARENA_ALIGN - 1) & !(ARENA_ALIGN - 1);
        let shm = create_shared_memory(aligned, Some("dmxp_device_arena")).map_err(|e| {
            AdapterError::backend(
                format!("failed to map {aligned} byte accelerator arena"),
                e,
            )
        })?;
        Ok(Self::from_backend(shm))
    }

    /// Build an arena over an existing mapping.
    pub fn from_backend(shm: Box<dyn SharedMemoryBackend>) -> Self {
        let mut free = BTreeMap::new();
        free.insert(0, shm.size());
        Self {
            shm,
            state: Mutex::new(ArenaState {
                free,
                live: HashMap::new(),
            }),
            counters: AllocCounters::default(),
        }
    }

    fn contains(&self, ptr: *const u8) -> bool {
        let base = self.shm.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + self.shm.size()
    }
}

impl ArenaState {
    /// First fit for `len` bytes at an address aligned to `align`.
    fn take(&mut self, base_addr: usize, len: usize, align: usize) -> Option<usize> {
        let (block_off, block_len, start) = self.free.iter().find_map(|(&off, &blen)| {
            let abs = base_addr.checked_add(off)?;
            let start = (abs.checked_add(align - 1)? & !(align - 1)) - base_addr;
            let end = start.checked_add(len)?;
            (end <= off + blen).then_some((off, blen, start))
        })?;

        self.free.remove(&block_off);
        if start > block_off {
            self.free.insert(block_off, start - block_off);
        }
        let tail = block_off + block_len - (start + len);
        if tail > 0 {
            self.free.insert(start + len, tail);
        }
        self.live.insert(start, len);
        Some(start)
    }

    /// Return an extent and merge it with its neighbours.
    fn give_back(&mut self, mut off: usize, mut len: usize) {
        if let Some((&prev_off, &prev_len)) = self.free.range(..off).next_back() {
            if prev_off + prev_len == off {
                self.free.remove(&prev_off);
                off = prev_off;
                len += prev_len;
            }
        }
        if let Some(next_len) = self.free.remove(&(off + len)) {
            len += next_len;
        }
        self.free.insert(off, len);
    }
}

impl MemoryAllocator for AcceleratorAllocator {
    fn residency(&self) -> Residency {
        Residency::Accelerator
    }

    fn allocate(&self, size: usize, descriptor: Option<&dyn LayoutDescriptor>) -> Result<NonNull<u8>> {
        let hint = descriptor.map_or(1, |d| d.alignment());
        let align = hint.max(ARENA_ALIGN).checked_next_power_of_two();
        let len = size
            .max(1)
            .checked_add(ARENA_ALIGN - 1)
            .map(|n| n & !(ARENA_ALIGN - 1));
        let (Some(align), Some(len)) = (align, len) else {
            self.counters.record_failure();
            tracing::debug!(size, hint, "accelerator request too large to place");
            return Err(AdapterError::exhausted(size, Residency::Accelerator));
        };
        let base = self.shm.as_ptr();

        let Some(offset) = self.state.lock().take(base as usize, len, align) else {
            self.counters.record_failure();
            tracing::debug!(size, align, capacity = self.shm.size(), "accelerator arena exhausted");
            return Err(AdapterError::exhausted(size, Residency::Accelerator));
        };

        self.counters.record_alloc(len);
        // offset lies inside the mapping, so the pointer is non-null
        let ptr = unsafe { NonNull::new_unchecked(base.add(offset)) };
        tracing::trace!(size, offset, align, "accelerator staging allocated");
        Ok(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        if !self.contains(ptr.as_ptr()) {
            tracing::warn!(ptr = ?ptr, "refusing to free pointer outside accelerator arena");
            return;
        }
        let offset = ptr.as_ptr() as usize - self.shm.as_ptr() as usize;
        let mut state = self.state.lock();
        let Some(len) = state.live.remove(&offset) else {
            tracing::warn!(offset, "refusing to free unknown accelerator extent");
            return;
        };
        state.give_back(offset, len);
        drop(state);
        self.counters.record_free(len);
        tracing::trace!(offset, len, "accelerator staging freed");
    }

    fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(capacity: usize) -> ArenaState {
        let mut free = BTreeMap::new();
        free.insert(0, capacity);
        ArenaState {
            free,
            live: HashMap::new(),
        }
    }

    #[test]
    fn first_fit_splits_and_coalesces() {
        let mut st = state(1024);
        let a = st.take(0, 128, 128).unwrap();
        let b = st.take(0, 256, 128).unwrap();
        let c = st.take(0, 128, 128).unwrap();
        assert_eq!((a, b, c), (0, 128, 384));

        let b_len = st.live.remove(&b).unwrap();
        st.give_back(b, b_len);
        // the hole is reused before the tail
        assert_eq!(st.take(0, 128, 128), Some(128));

        for off in [a, 128, c] {
            let len = st.live.remove(&off).unwrap();
            st.give_back(off, len);
        }
        assert_eq!(st.free.len(), 1);
        assert_eq!(st.free.get(&0), Some(&1024));
    }

    #[test]
    fn honours_alignment_relative_to_base() {
        let mut st = state(4096);
        // base at 128 modulo 1024: first 1024-aligned address is offset 896
        let off = st.take(128, 128, 1024).unwrap();
        assert_eq!((128 + off) % 1024, 0);
        assert_eq!(st.free.get(&0), Some(&896));
    }

    #[test]
    fn refuses_when_full() {
        let mut st = state(256);
        assert!(st.take(0, 256, 128).is_some());
        assert!(st.take(0, 128, 128).is_none());
    }

    #[test]
    fn refuses_alignment_past_address_space() {
        let mut st = state(256);
        assert!(st.take(usize::MAX - 64, 128, 1 << (usize::BITS - 1)).is_none());
        assert_eq!(st.free.get(&0), Some(&256));
    }
}

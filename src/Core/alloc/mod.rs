use crate::Datatype::{LayoutDescriptor, Residency};
use crate::error::Result;
use crossbeam_utils::CachePadded;
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
mod accelerator;
mod debug;
mod getters;
mod host;

pub use accelerator::AcceleratorAllocator;
pub use host::HostAllocator;

/// `{allocate, free}` pair for one kind of memory.
pub trait MemoryAllocator: Send + Sync + fmt::Debug {
    /// Kind of memory this allocator hands out.
    fn residency(&self) -> Residency;

    /// Allocate `size` bytes. The descriptor, when given, is a placement
    /// hint; host allocators ignore it. Failure is `ResourceExhausted`.
    fn allocate(&self, size: usize, descriptor: Option<&dyn LayoutDescriptor>) -> Result<NonNull<u8>>;

    /// Release memory obtained from `allocate` on this same allocator.
    ///
    /// # Safety
    /// `ptr` must come from `self.allocate` and must not be freed twice.
    unsafe fn free(&self, ptr: NonNull<u8>);

    /// Snapshot of the allocation counters.
    fn stats(&self) -> AllocStats;
}

/// Counter snapshot for an allocator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocations: u64,
    pub frees: u64,
    pub failures: u64,
    pub bytes_in_use: u64,
}

impl AllocStats {
    /// Allocations not yet released.
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}

/// Shared counters, padded so concurrent allocators do not false-share.
#[derive(Default)]
pub(crate) struct AllocCounters {
    allocations: CachePadded<AtomicU64>,
    frees: CachePadded<AtomicU64>,
    failures: CachePadded<AtomicU64>,
    bytes_in_use: CachePadded<AtomicU64>,
}

impl AllocCounters {
    pub(crate) fn record_alloc(&self, size: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_in_use.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, size: usize) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.bytes_in_use.fetch_sub(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bytes_in_use(&self) -> u64 {
        self.bytes_in_use.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_in_use: self.bytes_in_use.load(Ordering::Relaxed),
        }
    }
}

/// The host and accelerator allocators, selected by residency.
#[derive(Clone, Debug)]
pub struct AllocatorSet {
    host: Arc<dyn MemoryAllocator>,
    accelerator: Arc<dyn MemoryAllocator>,
}

impl AllocatorSet {
    pub fn new(host: Arc<dyn MemoryAllocator>, accelerator: Arc<dyn MemoryAllocator>) -> Self {
        debug_assert_eq!(host.residency(), Residency::Host);
        debug_assert_eq!(accelerator.residency(), Residency::Accelerator);
        Self { host, accelerator }
    }

    /// Allocator matching `residency`.
    pub fn select(&self, residency: Residency) -> &Arc<dyn MemoryAllocator> {
        match residency {
            Residency::Host => &self.host,
            Residency::Accelerator => &self.accelerator,
        }
    }

    pub fn host(&self) -> &Arc<dyn MemoryAllocator> {
        &self.host
    }

    pub fn accelerator(&self) -> &Arc<dyn MemoryAllocator> {
        &self.accelerator
    }
}

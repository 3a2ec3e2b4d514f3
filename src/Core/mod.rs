pub mod SharedMemory;
pub mod alloc;

pub use SharedMemory::{create_shared_memory, RawHandle, SharedMemoryBackend};
pub use alloc::{
    AcceleratorAllocator, AllocStats, AllocatorSet, HostAllocator, MemoryAllocator,
};

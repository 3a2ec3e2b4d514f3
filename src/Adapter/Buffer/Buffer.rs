// Buffers handed to the transport around one send or receive

use crate::Core::alloc::MemoryAllocator;
use std::ptr::NonNull;
use std::sync::Arc;

/// A staging allocation owned by the adapter.
///
/// Released through the allocator that produced it when dropped, which
/// happens exactly once.
pub(crate) struct StagedRegion {
    pub(crate) ptr: NonNull<u8>,
    pub(crate) len: usize,
    pub(crate) allocator: Arc<dyn MemoryAllocator>,
}

/// A ready-to-transmit contiguous buffer.
///
/// Either aliases the user's memory (zero-copy, not owned) or holds a packed
/// staging copy (owned by the adapter and released on drop).
pub struct SendBuffer {
    /// Start of the bytes to transmit; null for an empty message.
    pub(crate) ptr: *const u8,

    /// Number of bytes to transmit.
    pub(crate) len: usize,

    /// Present iff the adapter owns the memory.
    pub(crate) staged: Option<StagedRegion>,
}

/// Destination for an incoming message of known packed size.
///
/// Either points straight into the user's layout (direct write) or holds a
/// staging buffer that `complete_receive` unpacks and releases. Dropping a
/// staged `RecvBuffer` without completing it releases the staging memory,
/// which is the failed-receive path.
pub struct RecvBuffer {
    /// Where the transport should write; null for an empty message.
    pub(crate) ptr: *mut u8,

    /// Bytes the transport may write.
    pub(crate) capacity: usize,

    /// Present iff the buffer is an adapter-owned staging allocation.
    pub(crate) staged: Option<StagedRegion>,
}

// Buffers are plain byte regions; moving them across threads is the
// transport's business and no interior state is shared.
unsafe impl Send for SendBuffer {}
unsafe impl Send for RecvBuffer {}
unsafe impl Send for StagedRegion {}

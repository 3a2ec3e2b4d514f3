use std::fmt;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::Arc;

use super::Buffer::{RecvBuffer, SendBuffer, StagedRegion};
use crate::Core::alloc::MemoryAllocator;
use crate::Datatype::Residency;

impl StagedRegion {
    pub(crate) fn new(ptr: NonNull<u8>, len: usize, allocator: Arc<dyn MemoryAllocator>) -> Self {
        Self {
            ptr,
            len,
            allocator,
        }
    }

    pub(crate) fn residency(&self) -> Residency {
        self.allocator.residency()
    }
}

impl Drop for StagedRegion {
    fn drop(&mut self) {
        tracing::debug!(
            len = self.len,
            residency = %self.allocator.residency(),
            "releasing staging buffer"
        );
        unsafe { self.allocator.free(self.ptr) };
    }
}

impl SendBuffer {
    /// The empty message: null pointer, zero length, nothing owned.
    pub(crate) fn empty() -> Self {
        Self {
            ptr: ptr::null(),
            len: 0,
            staged: None,
        }
    }

    /// Alias user memory without taking ownership. Zero bytes is the empty message.
    pub(crate) fn borrowed(ptr: *const u8, len: usize) -> Self {
        if len == 0 {
            return Self::empty();
        }
        Self {
            ptr,
            len,
            staged: None,
        }
    }

    /// Wrap a packed staging buffer of which the first `len` bytes are valid.
    pub(crate) fn staged(region: StagedRegion, len: usize) -> Self {
        Self {
            ptr: region.ptr.as_ptr(),
            len,
            staged: Some(region),
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    /// True when the adapter allocated this buffer and will release it.
    pub fn owned_by_adapter(&self) -> bool {
        self.staged.is_some()
    }

    /// Residency of the staging allocation, if any.
    pub fn staging_residency(&self) -> Option<Residency> {
        self.staged.as_ref().map(StagedRegion::residency)
    }

    /// View the bytes to transmit.
    ///
    /// # Safety
    /// The memory must be host-addressable, and when the buffer aliases user
    /// memory that memory must still be alive and not mutated.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.is_empty() {
            return &[];
        }
        slice::from_raw_parts(self.ptr, self.len)
    }
}

impl RecvBuffer {
    pub(crate) fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            capacity: 0,
            staged: None,
        }
    }

    /// Write straight into user memory.
    pub(crate) fn direct(ptr: *mut u8, capacity: usize) -> Self {
        if capacity == 0 {
            return Self::empty();
        }
        Self {
            ptr,
            capacity,
            staged: None,
        }
    }

    pub(crate) fn staged(region: StagedRegion) -> Self {
        Self {
            ptr: region.ptr.as_ptr(),
            capacity: region.len,
            staged: Some(region),
        }
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.capacity == 0
    }

    /// True when the caller must release this buffer if the receive fails
    /// before `complete_receive` runs. Dropping the buffer does exactly that.
    pub fn free_on_error(&self) -> bool {
        self.staged.is_some()
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    pub fn staging_residency(&self) -> Option<Residency> {
        self.staged.as_ref().map(StagedRegion::residency)
    }

    /// Mutable view of the receive area.
    ///
    /// # Safety
    /// The memory must be host-addressable, and when the buffer points into
    /// user memory that memory must still be alive and not otherwise borrowed.
    pub unsafe fn as_bytes_mut(&mut self) -> &mut [u8] {
        if self.is_empty() {
            return &mut [];
        }
        slice::from_raw_parts_mut(self.ptr, self.capacity)
    }
}

impl fmt::Debug for SendBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_send_buffer(self, f)
    }
}

impl fmt::Debug for RecvBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_recv_buffer(self, f)
    }
}

use std::fmt;
use crate::Adapter::Buffer::{RecvBuffer, SendBuffer};
use crate::Core::alloc::{AcceleratorAllocator, HostAllocator, MemoryAllocator};
use crate::Datatype::StridedLayout;

/// Debug function for HostAllocator
///
/// Shows the budget and live counters without listing individual pointers.
pub fn debug_host_allocator(allocator: &HostAllocator, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let stats = allocator.stats();
    f.debug_struct("HostAllocator")
        .field("limit", &allocator.limit())
        .field("live", &allocator.live_allocations())
        .field("bytes_in_use", &stats.bytes_in_use)
        .field("failures", &stats.failures)
        .finish()
}

/// Debug function for AcceleratorAllocator
///
/// Shows:
/// - Arena base address and capacity
/// - Free bytes and fragmentation
pub fn debug_accelerator_allocator(allocator: &AcceleratorAllocator, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let base = unsafe { allocator.backend().as_ptr() };
    f.debug_struct("AcceleratorAllocator")
        .field("arena", &format_args!("{:p}", base))
        .field("capacity", &allocator.capacity())
        .field("available", &allocator.available())
        .field("free_extents", &allocator.free_extents())
        .finish()
}

/// Debug function for StridedLayout
///
/// Safely displays the region address without dereferencing
pub fn debug_strided_layout(layout: &StridedLayout<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StridedLayout")
        .field("base", &format_args!("0x{:x}", layout.base as usize))
        .field("region_len", &layout.region_len)
        .field("shape", &layout.shape)
        .field("residency", &layout.residency)
        .field("cursor", &layout.cursor)
        .field("completed", &layout.completed)
        .finish()
}

pub fn debug_send_buffer(buffer: &SendBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SendBuffer")
        .field("ptr", &format_args!("0x{:x}", buffer.as_ptr() as usize))
        .field("len", &buffer.len())
        .field("owned_by_adapter", &buffer.owned_by_adapter())
        .field("staging", &buffer.staging_residency())
        .finish()
}

pub fn debug_recv_buffer(buffer: &RecvBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecvBuffer")
        .field("ptr", &format_args!("0x{:x}", buffer.as_mut_ptr() as usize))
        .field("capacity", &buffer.capacity())
        .field("free_on_error", &buffer.free_on_error())
        .field("staging", &buffer.staging_residency())
        .finish()
}

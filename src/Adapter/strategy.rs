use super::Buffer::{RecvBuffer, SendBuffer, StagedRegion};
use super::AdapterConfig;
use crate::Core::alloc::MemoryAllocator;
use crate::Datatype::{LayoutDescriptor, Residency, Segment};
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Buffer preparation around one point-to-point message.
///
/// `prepare_send_buffer` runs before a send, `prepare_receive_buffer` before
/// a receive, and `complete_receive` after the receive has landed its bytes
/// in the buffer returned by `prepare_receive_buffer`.
pub trait BufferStrategy: Send + Sync + fmt::Debug {
    /// Residency of the staging memory this strategy allocates.
    fn residency(&self) -> Residency;

    fn prepare_send_buffer(&self, descriptor: &mut dyn LayoutDescriptor) -> Result<SendBuffer>;

    fn prepare_receive_buffer(&self, descriptor: &dyn LayoutDescriptor) -> Result<RecvBuffer>;

    fn complete_receive(
        &self,
        descriptor: &mut dyn LayoutDescriptor,
        buffer: RecvBuffer,
        length: usize,
    ) -> Result<()>;
}

/// Fast-path eligibility: the descriptor's own memory can be sent as-is.
pub fn is_contiguous(descriptor: &dyn LayoutDescriptor, config: &AdapterConfig) -> bool {
    !config.heterogeneous && !descriptor.is_completed() && descriptor.is_contiguous_layout()
}

/// Whether a staging buffer is structurally required. Depends on layout and
/// representation only; residency merely picks the allocator.
pub fn requires_staging(descriptor: &dyn LayoutDescriptor, config: &AdapterConfig) -> bool {
    config.heterogeneous || descriptor.needs_staging_buffer()
}

/// Staging strategy bound to one allocator.
#[derive(Clone)]
pub struct StagingStrategy {
    pub(super) allocator: Arc<dyn MemoryAllocator>,
    pub(super) config: AdapterConfig,
}

impl StagingStrategy {
    pub fn new(allocator: Arc<dyn MemoryAllocator>, config: AdapterConfig) -> Self {
        Self { allocator, config }
    }

    pub fn allocator(&self) -> &Arc<dyn MemoryAllocator> {
        &self.allocator
    }

    pub(super) fn allocate_staging(
        &self,
        size: usize,
        descriptor: &dyn LayoutDescriptor,
    ) -> Result<StagedRegion> {
        let ptr = self.allocator.allocate(size, Some(descriptor))?;
        tracing::debug!(
            size,
            residency = %self.allocator.residency(),
            "allocated staging buffer"
        );
        Ok(StagedRegion::new(ptr, size, Arc::clone(&self.allocator)))
    }
}

impl BufferStrategy for StagingStrategy {
    fn residency(&self) -> Residency {
        self.allocator.residency()
    }

    fn prepare_send_buffer(&self, descriptor: &mut dyn LayoutDescriptor) -> Result<SendBuffer> {
        self.pack_for_send(descriptor)
    }

    fn prepare_receive_buffer(&self, descriptor: &dyn LayoutDescriptor) -> Result<RecvBuffer> {
        self.stage_for_receive(descriptor)
    }

    fn complete_receive(
        &self,
        descriptor: &mut dyn LayoutDescriptor,
        buffer: RecvBuffer,
        length: usize,
    ) -> Result<()> {
        self.unpack_received(descriptor, buffer, length)
    }
}

impl fmt::Debug for StagingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingStrategy")
            .field("residency", &self.allocator.residency())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Feed `[base, base+len)` to `step` one segment at a time, each at most
/// `max_chunk` bytes, until the range is covered or `step` makes no progress.
/// Returns the bytes covered.
pub(super) fn drive_segments(
    base: *mut u8,
    len: usize,
    max_chunk: Option<usize>,
    mut step: impl FnMut(Segment) -> usize,
) -> usize {
    let chunk = max_chunk.filter(|&c| c > 0).unwrap_or(len);
    let mut done = 0;
    while done < len {
        let want = chunk.min(len - done);
        let moved = step(Segment::new(base.wrapping_add(done), want));
        if moved == 0 {
            break;
        }
        done += moved.min(want);
    }
    done
}

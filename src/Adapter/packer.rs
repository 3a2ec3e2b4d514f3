// Send side: zero-copy reference or packed staging copy

use super::Buffer::SendBuffer;
use super::strategy::{drive_segments, is_contiguous, requires_staging, StagingStrategy};
use crate::Datatype::LayoutDescriptor;
use crate::error::Result;

impl StagingStrategy {
    pub(super) fn pack_for_send(&self, descriptor: &mut dyn LayoutDescriptor) -> Result<SendBuffer> {
        if is_contiguous(descriptor, &self.config) {
            let len = descriptor.local_size();
            tracing::trace!(len, "zero-copy send from user memory");
            return Ok(SendBuffer::borrowed(descriptor.base_pointer(), len));
        }

        let packed = descriptor.packed_size();
        if packed == 0 {
            tracing::trace!("empty send");
            return Ok(SendBuffer::empty());
        }

        if !requires_staging(descriptor, &self.config) {
            // the transport reads in place; the cursor still moves past the data
            let skipped = descriptor.advance(packed);
            tracing::trace!(len = packed, skipped, "direct send from first element");
            return Ok(SendBuffer::borrowed(descriptor.base_pointer_offset(), packed));
        }

        let region = self.allocate_staging(packed, descriptor)?;
        let produced = drive_segments(region.ptr.as_ptr(), packed, self.config.max_pack_chunk, |seg| {
            // the segment lies inside the staging allocation we just made
            unsafe { descriptor.pack(&[seg]) }
        });
        if produced < packed {
            tracing::warn!(packed, produced, "descriptor stalled while packing");
        }
        tracing::trace!(len = produced, "packed send into staging buffer");
        Ok(SendBuffer::staged(region, produced))
    }
}

// Completion of a receive: unpack staged bytes and release the staging buffer

use super::Buffer::RecvBuffer;
use super::strategy::{drive_segments, StagingStrategy};
use crate::Datatype::LayoutDescriptor;
use crate::error::Result;

impl StagingStrategy {
    pub(super) fn unpack_received(
        &self,
        descriptor: &mut dyn LayoutDescriptor,
        buffer: RecvBuffer,
        length: usize,
    ) -> Result<()> {
        // An empty or direct buffer has nothing to unpack. A staged one is
        // released when `buffer` goes out of scope at the end of this call.
        if length == 0 || buffer.is_empty() {
            return Ok(());
        }
        if !buffer.is_staged() {
            tracing::trace!(length, "direct receive already in place");
            return Ok(());
        }

        let length = if length > buffer.capacity() {
            tracing::warn!(
                length,
                capacity = buffer.capacity(),
                "received length exceeds staging capacity, clamping"
            );
            buffer.capacity()
        } else {
            length
        };

        let consumed = drive_segments(buffer.as_mut_ptr(), length, self.config.max_pack_chunk, |seg| {
            // the segment lies inside the staging allocation owned by `buffer`
            unsafe { descriptor.unpack(&[seg]) }
        });
        if consumed < length {
            tracing::warn!(length, consumed, "descriptor stalled while unpacking");
        }
        tracing::trace!(consumed, "unpacked staging buffer");

        drop(buffer);
        Ok(())
    }
}

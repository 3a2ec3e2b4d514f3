// Receive side: direct write into the user layout or a staging buffer

use super::Buffer::RecvBuffer;
use super::strategy::{requires_staging, StagingStrategy};
use crate::Datatype::LayoutDescriptor;
use crate::error::Result;

impl StagingStrategy {
    pub(super) fn stage_for_receive(&self, descriptor: &dyn LayoutDescriptor) -> Result<RecvBuffer> {
        let packed = descriptor.packed_size();
        if packed == 0 {
            tracing::trace!("empty receive");
            return Ok(RecvBuffer::empty());
        }

        if requires_staging(descriptor, &self.config) {
            let region = self.allocate_staging(packed, descriptor)?;
            tracing::trace!(capacity = packed, "receive into staging buffer");
            return Ok(RecvBuffer::staged(region));
        }

        tracing::trace!(capacity = packed, "direct receive into user memory");
        Ok(RecvBuffer::direct(descriptor.base_pointer_offset(), packed))
    }
}

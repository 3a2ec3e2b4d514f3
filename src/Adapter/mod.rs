mod builder;
mod packer;
mod stager;
mod strategy;
mod unpacker;

pub use builder::{AdapterBuilder, AdapterConfig};
pub use strategy::{is_contiguous, requires_staging, BufferStrategy, StagingStrategy};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub use Buffer::{RecvBuffer, SendBuffer}; // re-export for stable path
    pub(crate) use Buffer::StagedRegion;
}

use crate::Core::alloc::AllocatorSet;
use crate::Datatype::{LayoutDescriptor, Residency};
use crate::error::Result;
use Buffer::{RecvBuffer, SendBuffer};

/// Entry point used by transport send/receive primitives.
///
/// Holds one staging strategy per residency and dispatches each call to the
/// strategy matching the descriptor it is given.
#[derive(Debug)]
pub struct MessageAdapter {
    pub(crate) config: AdapterConfig,
    pub(crate) allocators: AllocatorSet,
    pub(crate) host: StagingStrategy,
    pub(crate) accelerator: StagingStrategy,
}

impl MessageAdapter {
    /// Adapter with default configuration, the global host allocator and a
    /// freshly mapped accelerator arena.
    pub fn new() -> Result<Self> {
        AdapterBuilder::new().build()
    }

    pub fn builder() -> AdapterBuilder {
        AdapterBuilder::new()
    }

    /// Strategy for memory of the given residency.
    pub fn strategy_for(&self, residency: Residency) -> &dyn BufferStrategy {
        match residency {
            Residency::Host => &self.host,
            Residency::Accelerator => &self.accelerator,
        }
    }

    /// Produce a contiguous buffer to transmit for `descriptor`.
    ///
    /// Returns `ResourceExhausted` if a staging buffer was needed and could
    /// not be allocated; nothing is left allocated in that case.
    pub fn prepare_send_buffer(&self, descriptor: &mut dyn LayoutDescriptor) -> Result<SendBuffer> {
        self.strategy_for(descriptor.residency())
            .prepare_send_buffer(descriptor)
    }

    /// Produce the destination for an incoming message described by `descriptor`.
    pub fn prepare_receive_buffer(&self, descriptor: &dyn LayoutDescriptor) -> Result<RecvBuffer> {
        self.strategy_for(descriptor.residency())
            .prepare_receive_buffer(descriptor)
    }

    /// Finish a receive of `length` bytes into `buffer`, unpacking and
    /// releasing staging memory when there is any.
    pub fn complete_receive(
        &self,
        descriptor: &mut dyn LayoutDescriptor,
        buffer: RecvBuffer,
        length: usize,
    ) -> Result<()> {
        self.strategy_for(descriptor.residency())
            .complete_receive(descriptor, buffer, length)
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn allocators(&self) -> &AllocatorSet {
        &self.allocators
    }
}

// Module naming follows project convention (Core = allocators and memory backends)
#[allow(non_snake_case)]
pub mod Core;

// Layout descriptor contract and the reference strided layout
#[allow(non_snake_case)]
pub mod Datatype;

// Send/receive buffer preparation on top of a layout descriptor
#[allow(non_snake_case)]
pub mod Adapter;

pub mod error;

#[allow(non_snake_case)]
mod Debug {
    pub mod StructDebug;
}

pub use Adapter::{AdapterBuilder, AdapterConfig, BufferStrategy, MessageAdapter};
pub use Adapter::Buffer::{RecvBuffer, SendBuffer};
pub use Datatype::{LayoutDescriptor, Residency, Segment, StridedLayout};
pub use error::{AdapterError, Result};

mod descriptor;
mod strided;

pub use descriptor::LayoutDescriptor;
pub use strided::{StridedLayout, VectorShape};

pub mod Structs {
    pub mod Segment_Structs;
    pub use Segment_Structs::{Residency, Segment}; // re-export for stable path
}

pub use Structs::{Residency, Segment};

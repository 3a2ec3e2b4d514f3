use super::{Residency, Segment};

/// Public contract of a layout descriptor as consumed by the adapter.
///
/// A descriptor describes a typed, possibly non-contiguous memory region and
/// carries a progress cursor that `pack`/`unpack` advance. One descriptor
/// services exactly one in-flight message; the adapter takes it by `&mut`
/// whenever the cursor can move.
pub trait LayoutDescriptor {
    /// Residency of the described memory.
    fn residency(&self) -> Residency;

    /// Bytes needed to represent the data as a flat contiguous stream.
    /// Stable for a given descriptor state.
    fn packed_size(&self) -> usize;

    /// Bytes the data occupies in its local (in-memory) representation.
    fn local_size(&self) -> usize;

    /// True when the described data is one dense run starting at
    /// `base_pointer()`.
    fn is_contiguous_layout(&self) -> bool;

    /// True once a previous pack/unpack has consumed all of the data.
    fn is_completed(&self) -> bool;

    /// True when the layout itself cannot be handed to a transport directly
    /// and must go through a staging buffer. Reflects layout only; residency
    /// is never folded into this answer.
    fn needs_staging_buffer(&self) -> bool;

    /// Start of the described region.
    fn base_pointer(&self) -> *mut u8;

    /// Address of the first addressable element, used as the direct write
    /// target when no staging is needed.
    fn base_pointer_offset(&self) -> *mut u8;

    /// Preferred alignment for staging memory holding this data.
    fn alignment(&self) -> usize {
        1
    }

    /// Move the cursor over `len` bytes that the transport reads straight
    /// from `base_pointer_offset()`, as if they had been packed. Returns the
    /// bytes skipped. Descriptors without a cursor keep the default.
    fn advance(&mut self, _len: usize) -> usize {
        0
    }

    /// Serialize from the described layout into `segments`, starting at the
    /// current cursor. Returns the number of bytes written.
    ///
    /// # Safety
    /// Every segment must point to writable memory of at least `len` bytes
    /// that does not overlap the described region.
    unsafe fn pack(&mut self, segments: &[Segment]) -> usize;

    /// Deserialize from `segments` into the described layout, starting at the
    /// current cursor. Returns the number of bytes consumed.
    ///
    /// # Safety
    /// Every segment must point to readable memory of at least `len` bytes
    /// that does not overlap the described region.
    unsafe fn unpack(&mut self, segments: &[Segment]) -> usize;
}

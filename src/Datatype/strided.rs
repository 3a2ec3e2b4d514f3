// Reference vector-style layout: `count` blocks of `block_len` elements,
// `stride` elements apart, starting `displacement` bytes into the region.

use super::{LayoutDescriptor, Residency, Segment};
use crate::error::{AdapterError, Result};
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

/// Shape of a strided layout. All counts are in elements except
/// `displacement`, which is in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VectorShape {
    pub count: usize,
    pub block_len: usize,
    pub stride: usize,
    pub elem_size: usize,
    pub displacement: usize,
}

impl VectorShape {
    /// A single dense run of `len` bytes.
    pub fn dense(len: usize) -> Self {
        Self {
            count: 1,
            block_len: len,
            stride: len,
            elem_size: 1,
            displacement: 0,
        }
    }

    pub fn vector(count: usize, block_len: usize, stride: usize, elem_size: usize) -> Self {
        Self {
            count,
            block_len,
            stride,
            elem_size,
            displacement: 0,
        }
    }

    pub fn with_displacement(mut self, displacement: usize) -> Self {
        self.displacement = displacement;
        self
    }

    #[inline]
    fn block_bytes(&self) -> usize {
        self.block_len * self.elem_size
    }

    #[inline]
    fn stride_bytes(&self) -> usize {
        self.stride * self.elem_size
    }

    /// Bytes from the first to one past the last described byte.
    fn extent(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        (self.count - 1) * self.stride_bytes() + self.block_bytes()
    }

    fn is_dense(&self) -> bool {
        self.count <= 1 || self.stride == self.block_len
    }

    fn validate(&self, region_len: usize) -> Result<()> {
        if self.elem_size == 0 {
            return Err(AdapterError::invalid_layout("element size must be non-zero"));
        }
        if self.count > 1 && self.stride < self.block_len {
            return Err(AdapterError::invalid_layout(format!(
                "stride {} overlaps block length {}",
                self.stride, self.block_len
            )));
        }
        let end = self
            .count
            .checked_sub(1)
            .map_or(Some(0), |n| {
                n.checked_mul(self.stride_bytes())
                    .and_then(|v| v.checked_add(self.block_bytes()))
            })
            .and_then(|extent| extent.checked_add(self.displacement))
            .ok_or_else(|| AdapterError::invalid_layout("layout extent overflows usize"))?;
        if end > region_len {
            return Err(AdapterError::invalid_layout(format!(
                "layout spans {end} bytes but region holds {region_len}"
            )));
        }
        Ok(())
    }
}

#[derive(Copy, Clone)]
enum Direction {
    Pack,
    Unpack,
}

/// A strided layout over a borrowed memory region, with a progress cursor.
pub struct StridedLayout<'a> {
    pub(crate) base: *mut u8,
    pub(crate) region_len: usize,
    pub(crate) shape: VectorShape,
    pub(crate) residency: Residency,
    pub(crate) cursor: usize,
    pub(crate) completed: bool,
    _region: PhantomData<&'a mut [u8]>,
}

impl<'a> StridedLayout<'a> {
    /// Describe the whole of `bytes` as one dense run.
    pub fn contiguous(bytes: &'a mut [u8]) -> Self {
        let len = bytes.len();
        Self {
            base: bytes.as_mut_ptr(),
            region_len: len,
            shape: VectorShape::dense(len),
            residency: Residency::Host,
            cursor: 0,
            completed: false,
            _region: PhantomData,
        }
    }

    /// Describe `shape` inside `bytes`. Fails if the shape does not fit.
    pub fn new(bytes: &'a mut [u8], shape: VectorShape) -> Result<Self> {
        shape.validate(bytes.len())?;
        Ok(Self {
            base: bytes.as_mut_ptr(),
            region_len: bytes.len(),
            shape,
            residency: Residency::Host,
            cursor: 0,
            completed: false,
            _region: PhantomData,
        })
    }

    /// Describe `shape` inside a raw region, e.g. accelerator memory.
    ///
    /// # Safety
    /// `base` must be valid for reads and writes of `region_len` bytes for
    /// `'a`, and nothing else may access the region while the layout is used.
    pub unsafe fn from_raw_parts(
        base: *mut u8,
        region_len: usize,
        shape: VectorShape,
        residency: Residency,
    ) -> Result<Self> {
        if base.is_null() && region_len != 0 {
            return Err(AdapterError::invalid_layout("null base for non-empty region"));
        }
        shape.validate(region_len)?;
        Ok(Self {
            base,
            region_len,
            shape,
            residency,
            cursor: 0,
            completed: false,
            _region: PhantomData,
        })
    }

    pub fn with_residency(mut self, residency: Residency) -> Self {
        self.residency = residency;
        self
    }

    pub fn shape(&self) -> VectorShape {
        self.shape
    }

    /// Bytes already moved by pack/unpack.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Rewind the progress cursor so the layout can be packed or unpacked again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.completed = false;
    }

    unsafe fn transfer(&mut self, segments: &[Segment], direction: Direction) -> usize {
        let total = self.packed_size();
        let block_bytes = self.shape.block_bytes();
        let stride_bytes = self.shape.stride_bytes();
        let mut moved = 0;

        for segment in segments {
            if self.cursor >= total {
                break;
            }
            if segment.is_empty() {
                continue;
            }
            let mut seg_off = 0;
            while seg_off < segment.len && self.cursor < total {
                let block = self.cursor / block_bytes;
                let within = self.cursor % block_bytes;
                let chunk = (block_bytes - within).min(segment.len - seg_off);
                let user = self
                    .base
                    .add(self.shape.displacement + block * stride_bytes + within);
                let flat = segment.base.add(seg_off);
                match direction {
                    Direction::Pack => ptr::copy_nonoverlapping(user as *const u8, flat, chunk),
                    Direction::Unpack => ptr::copy_nonoverlapping(flat as *const u8, user, chunk),
                }
                seg_off += chunk;
                self.cursor += chunk;
                moved += chunk;
            }
        }

        if self.cursor >= total && total > 0 {
            self.completed = true;
        }
        moved
    }
}

impl LayoutDescriptor for StridedLayout<'_> {
    fn residency(&self) -> Residency {
        self.residency
    }

    fn packed_size(&self) -> usize {
        self.shape.count * self.shape.block_bytes()
    }

    fn local_size(&self) -> usize {
        self.packed_size()
    }

    fn is_contiguous_layout(&self) -> bool {
        self.shape.displacement == 0 && self.shape.is_dense()
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn needs_staging_buffer(&self) -> bool {
        !self.shape.is_dense()
    }

    fn base_pointer(&self) -> *mut u8 {
        self.base
    }

    fn base_pointer_offset(&self) -> *mut u8 {
        self.base.wrapping_add(self.shape.displacement)
    }

    fn alignment(&self) -> usize {
        // largest power of two dividing the element size, capped at a cache line
        1 << self.shape.elem_size.trailing_zeros().min(6)
    }

    fn advance(&mut self, len: usize) -> usize {
        let total = self.packed_size();
        let skipped = len.min(total - self.cursor.min(total));
        self.cursor += skipped;
        if self.cursor >= total && total > 0 {
            self.completed = true;
        }
        skipped
    }

    unsafe fn pack(&mut self, segments: &[Segment]) -> usize {
        self.transfer(segments, Direction::Pack)
    }

    unsafe fn unpack(&mut self, segments: &[Segment]) -> usize {
        self.transfer(segments, Direction::Unpack)
    }
}

impl fmt::Debug for StridedLayout<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_strided_layout(self, f)
    }
}

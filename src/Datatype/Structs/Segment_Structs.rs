// Plain data exchanged between the adapter and a layout descriptor

use std::fmt;
use std::ptr;

/// Where a memory region lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Residency {
    /// Ordinary host memory.
    #[default]
    Host,
    /// Accelerator (device) memory.
    Accelerator,
}

impl Residency {
    pub fn is_accelerator(self) -> bool {
        matches!(self, Residency::Accelerator)
    }
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residency::Host => f.write_str("host"),
            Residency::Accelerator => f.write_str("accelerator"),
        }
    }
}

/// One scatter/gather unit handed to `pack`/`unpack`.
///
/// ABI-compatible with `struct iovec` so a segment list can be passed
/// straight to vectored I/O calls.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub base: *mut u8,
    pub len: usize,
}

impl Segment {
    pub fn new(base: *mut u8, len: usize) -> Self {
        Self { base, len }
    }

    pub fn empty() -> Self {
        Self {
            base: ptr::null_mut(),
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_null() || self.len == 0
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::empty()
    }
}

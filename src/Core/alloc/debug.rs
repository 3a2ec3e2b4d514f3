use super::*;
use std::fmt;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for HostAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_host_allocator(self, f)
    }
}

impl fmt::Debug for AcceleratorAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_accelerator_allocator(self, f)
    }
}

// Staging ownership, allocator selection and failure behaviour.
use dmxp_msgbuf::Adapter::{is_contiguous, requires_staging};
use dmxp_msgbuf::Core::{AcceleratorAllocator, AllocStats, HostAllocator, MemoryAllocator};
use dmxp_msgbuf::Datatype::VectorShape;
use dmxp_msgbuf::{
    AdapterBuilder, AdapterConfig, AdapterError, LayoutDescriptor, Residency, StridedLayout,
};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Allocator that refuses every request.
#[derive(Debug)]
struct RefusingAllocator {
    residency: Residency,
    attempts: AtomicU64,
    frees: AtomicU64,
}

impl RefusingAllocator {
    fn new(residency: Residency) -> Arc<Self> {
        Arc::new(Self {
            residency,
            attempts: AtomicU64::new(0),
            frees: AtomicU64::new(0),
        })
    }
}

impl MemoryAllocator for RefusingAllocator {
    fn residency(&self) -> Residency {
        self.residency
    }

    fn allocate(
        &self,
        size: usize,
        _descriptor: Option<&dyn LayoutDescriptor>,
    ) -> dmxp_msgbuf::Result<NonNull<u8>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AdapterError::exhausted(size, self.residency))
    }

    unsafe fn free(&self, _ptr: NonNull<u8>) {
        self.frees.fetch_add(1, Ordering::SeqCst);
    }

    fn stats(&self) -> AllocStats {
        AllocStats {
            failures: self.attempts.load(Ordering::SeqCst),
            frees: self.frees.load(Ordering::SeqCst),
            ..AllocStats::default()
        }
    }
}

/// Descriptor claiming more packed bytes than any allocator can place.
struct OversizedLayout {
    residency: Residency,
}

impl LayoutDescriptor for OversizedLayout {
    fn residency(&self) -> Residency {
        self.residency
    }

    fn packed_size(&self) -> usize {
        usize::MAX - 10
    }

    fn local_size(&self) -> usize {
        usize::MAX - 10
    }

    fn is_contiguous_layout(&self) -> bool {
        false
    }

    fn is_completed(&self) -> bool {
        false
    }

    fn needs_staging_buffer(&self) -> bool {
        true
    }

    fn base_pointer(&self) -> *mut u8 {
        std::ptr::null_mut()
    }

    fn base_pointer_offset(&self) -> *mut u8 {
        std::ptr::null_mut()
    }

    fn alignment(&self) -> usize {
        usize::MAX
    }

    unsafe fn pack(&mut self, _segments: &[dmxp_msgbuf::Segment]) -> usize {
        unreachable!("nothing can be staged for this layout")
    }

    unsafe fn unpack(&mut self, _segments: &[dmxp_msgbuf::Segment]) -> usize {
        unreachable!("nothing can be staged for this layout")
    }
}

fn strided(region: &mut [u8]) -> StridedLayout<'_> {
    StridedLayout::new(region, VectorShape::vector(4, 2, 4, 1)).unwrap()
}

#[test]
fn test_send_allocation_failure_is_resource_exhausted() {
    let refusing = RefusingAllocator::new(Residency::Host);
    let adapter = AdapterBuilder::new()
        .with_host_allocator(refusing.clone())
        .with_arena_size(4096)
        .build()
        .unwrap();

    let mut region = vec![0u8; 16];
    let mut layout = strided(&mut region);
    let err = adapter.prepare_send_buffer(&mut layout).unwrap_err();

    assert!(err.is_resource_exhausted());
    assert!(matches!(
        err,
        AdapterError::ResourceExhausted { requested: 8, residency: Residency::Host }
    ));
    assert_eq!(refusing.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(refusing.frees.load(Ordering::SeqCst), 0);
    // nothing was packed
    assert_eq!(layout.position(), 0);
}

#[test]
fn test_receive_allocation_failure_is_resource_exhausted() {
    let refusing = RefusingAllocator::new(Residency::Host);
    let adapter = AdapterBuilder::new()
        .with_host_allocator(refusing.clone())
        .with_arena_size(4096)
        .build()
        .unwrap();

    let mut region = vec![0u8; 16];
    let layout = strided(&mut region);
    let err = adapter.prepare_receive_buffer(&layout).unwrap_err();

    assert!(err.is_resource_exhausted());
    assert_eq!(refusing.frees.load(Ordering::SeqCst), 0);

    let io: std::io::Error = err.into();
    assert_eq!(io.kind(), std::io::ErrorKind::OutOfMemory);
}

#[test]
fn test_failure_does_not_fall_back_to_other_residency() {
    let host = Arc::new(HostAllocator::new());
    let refusing = RefusingAllocator::new(Residency::Accelerator);
    let adapter = AdapterBuilder::new()
        .with_host_allocator(host.clone())
        .with_accelerator_allocator(refusing.clone())
        .build()
        .unwrap();

    let mut region = vec![0u8; 16];
    let mut layout = strided(&mut region).with_residency(Residency::Accelerator);
    let err = adapter.prepare_send_buffer(&mut layout).unwrap_err();

    assert!(matches!(
        err,
        AdapterError::ResourceExhausted { residency: Residency::Accelerator, .. }
    ));
    assert_eq!(host.stats(), AllocStats::default());
}

#[test]
fn test_host_budget_exhaustion_leaves_nothing_behind() {
    let host = Arc::new(HostAllocator::with_limit(12));
    let adapter = AdapterBuilder::new()
        .with_host_allocator(host.clone())
        .with_arena_size(4096)
        .build()
        .unwrap();

    let mut a = vec![0u8; 16];
    let mut b = vec![0u8; 16];
    let mut first = strided(&mut a);
    let mut second = strided(&mut b);

    let held = adapter.prepare_send_buffer(&mut first).unwrap();
    let err = adapter.prepare_send_buffer(&mut second).unwrap_err();
    assert!(err.is_resource_exhausted());

    let stats = host.stats();
    assert_eq!(stats.allocations, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.bytes_in_use, 8);

    // room again once the first buffer is released
    drop(held);
    let again = adapter.prepare_send_buffer(&mut second).unwrap();
    assert!(again.owned_by_adapter());
    drop(again);
    assert_eq!(host.stats().outstanding(), 0);
}

#[test]
fn test_every_staging_buffer_is_freed_exactly_once() {
    let host = Arc::new(HostAllocator::new());
    let accelerator = Arc::new(AcceleratorAllocator::new(64 * 1024).unwrap());
    let adapter = AdapterBuilder::new()
        .with_host_allocator(host.clone())
        .with_accelerator_allocator(accelerator.clone())
        .build()
        .unwrap();

    for round in 0..50 {
        let residency = if round % 2 == 0 { Residency::Host } else { Residency::Accelerator };
        let mut src = vec![round as u8; 16];
        let mut dst = vec![0u8; 16];
        let mut send_layout = strided(&mut src).with_residency(residency);
        let mut recv_layout = strided(&mut dst).with_residency(residency);

        let sent = adapter.prepare_send_buffer(&mut send_layout).unwrap();
        let mut recv = adapter.prepare_receive_buffer(&recv_layout).unwrap();
        unsafe { recv.as_bytes_mut() }.copy_from_slice(unsafe { sent.as_bytes() });
        drop(sent);

        if round % 5 == 0 {
            // failed receive
            drop(recv);
        } else {
            adapter.complete_receive(&mut recv_layout, recv, 8).unwrap();
        }
    }

    for stats in [host.stats(), accelerator.stats()] {
        assert_eq!(stats.allocations, 50);
        assert_eq!(stats.frees, 50);
        assert_eq!(stats.bytes_in_use, 0);
    }
    assert_eq!(host.live_allocations(), 0);
    assert_eq!(accelerator.free_extents(), 1);
}

#[test]
fn test_strategy_selection_follows_residency() {
    let adapter = AdapterBuilder::new().with_arena_size(4096).build().unwrap();
    assert_eq!(adapter.strategy_for(Residency::Host).residency(), Residency::Host);
    assert_eq!(
        adapter.strategy_for(Residency::Accelerator).residency(),
        Residency::Accelerator
    );
    assert_eq!(adapter.allocators().select(Residency::Host).residency(), Residency::Host);
    assert_eq!(
        adapter.allocators().select(Residency::Accelerator).residency(),
        Residency::Accelerator
    );
}

#[test]
fn test_predicates_ignore_residency() {
    let plain = AdapterConfig::default();
    let hetero = AdapterConfig {
        heterogeneous: true,
        ..AdapterConfig::default()
    };

    for residency in [Residency::Host, Residency::Accelerator] {
        let mut dense = vec![0u8; 32];
        let layout = StridedLayout::contiguous(&mut dense).with_residency(residency);
        assert!(is_contiguous(&layout, &plain));
        assert!(!requires_staging(&layout, &plain));
        assert!(!is_contiguous(&layout, &hetero));
        assert!(requires_staging(&layout, &hetero));

        let mut gappy = vec![0u8; 16];
        let layout = strided(&mut gappy).with_residency(residency);
        assert!(!is_contiguous(&layout, &plain));
        assert!(requires_staging(&layout, &plain));
    }
}

#[test]
fn test_oversized_message_is_resource_exhausted() {
    let host = Arc::new(HostAllocator::new());
    let accelerator = Arc::new(AcceleratorAllocator::new(4096).unwrap());
    let adapter = AdapterBuilder::new()
        .with_host_allocator(host.clone())
        .with_accelerator_allocator(accelerator.clone())
        .build()
        .unwrap();

    for residency in [Residency::Host, Residency::Accelerator] {
        let mut layout = OversizedLayout { residency };
        let err = adapter.prepare_receive_buffer(&layout).unwrap_err();
        assert!(err.is_resource_exhausted(), "{residency}: {err:?}");
        let err = adapter.prepare_send_buffer(&mut layout).unwrap_err();
        assert!(err.is_resource_exhausted(), "{residency}: {err:?}");
    }

    assert_eq!(accelerator.stats().failures, 2);
    assert_eq!(accelerator.stats().allocations, 0);
    assert_eq!(host.stats().allocations, 0);
    assert_eq!(accelerator.available(), accelerator.capacity());
}

#[test]
fn test_strategy_can_be_driven_directly_for_any_descriptor() {
    let host = Arc::new(HostAllocator::new());
    let accelerator = Arc::new(AcceleratorAllocator::new(4096).unwrap());
    let adapter = AdapterBuilder::new()
        .with_host_allocator(host.clone())
        .with_accelerator_allocator(accelerator.clone())
        .build()
        .unwrap();

    // an accelerator descriptor staged through the host strategy lands in host memory
    let mut region = vec![0u8; 16];
    let layout = strided(&mut region).with_residency(Residency::Accelerator);
    let recv = adapter
        .strategy_for(Residency::Host)
        .prepare_receive_buffer(&layout)
        .unwrap();
    assert_eq!(recv.staging_residency(), Some(Residency::Host));
    assert_eq!(accelerator.stats().allocations, 0);
    drop(recv);
    assert_eq!(host.stats().outstanding(), 0);
}

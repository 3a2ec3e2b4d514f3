// In demos/msgbuf_soak.rs
//
// Pushes messages through the adapter with an in-process "wire" (a memcpy
// between the send and receive buffers) and checks that what lands in the
// strided destination hashes the same as the strided source.
//
//   cargo run --bin msgbuf-soak -- <num_messages> [--accelerator] [--heterogeneous]
//
// Ctrl+C stops early and prints the counters gathered so far.
use dmxp_msgbuf::Core::MemoryAllocator;
use dmxp_msgbuf::Datatype::VectorShape;
use dmxp_msgbuf::{AdapterBuilder, MessageAdapter, Residency, StridedLayout};
use sha2::{Digest, Sha256};
use std::env;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const REGION_LEN: usize = 64 * 1024;

/// Digest of the bytes a layout describes, in packed order.
fn layout_digest(region: &[u8], shape: VectorShape) -> String {
    let mut hasher = Sha256::new();
    let block = shape.block_len * shape.elem_size;
    let stride = shape.stride * shape.elem_size;
    for i in 0..shape.count {
        let start = shape.displacement + i * stride;
        hasher.update(&region[start..start + block]);
    }
    format!("{:x}", hasher.finalize())
}

/// A user region in the requested residency. Accelerator regions come from
/// the adapter's own arena so they are device memory as far as it knows.
struct Region {
    ptr: std::ptr::NonNull<u8>,
    len: usize,
    allocator: Option<Arc<dyn MemoryAllocator>>,
    host: Vec<u8>,
}

impl Region {
    fn new(adapter: &MessageAdapter, residency: Residency, len: usize) -> std::io::Result<Self> {
        match residency {
            Residency::Host => {
                let mut host = vec![0u8; len];
                let ptr = std::ptr::NonNull::new(host.as_mut_ptr())
                    .ok_or_else(|| std::io::Error::other("empty host region"))?;
                Ok(Self { ptr, len, allocator: None, host })
            }
            Residency::Accelerator => {
                let allocator = Arc::clone(adapter.allocators().accelerator());
                let ptr = allocator.allocate(len, None)?;
                unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };
                Ok(Self { ptr, len, allocator: Some(allocator), host: Vec::new() })
            }
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        if self.allocator.is_none() {
            return &mut self.host;
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Some(allocator) = &self.allocator {
            unsafe { allocator.free(self.ptr) };
        }
    }
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <num_messages> [--accelerator] [--heterogeneous]",
            args[0]
        );
        std::process::exit(1);
    }

    let num_messages: usize = args[1]
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{e}")))?;
    let residency = if args.iter().any(|a| a == "--accelerator") {
        Residency::Accelerator
    } else {
        Residency::Host
    };
    let heterogeneous = args.iter().any(|a| a == "--heterogeneous");

    let adapter = AdapterBuilder::from_env()
        .with_heterogeneous(heterogeneous)
        .with_arena_size(8 * REGION_LEN)
        .build()?;
    println!("Soak: {:?}", adapter.config());

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_for_handler = Arc::clone(&keep_running);
    ctrlc::set_handler(move || {
        keep_running_for_handler.store(false, Ordering::SeqCst);
    })
    .map_err(|e| std::io::Error::other(format!("Error setting Ctrl+C handler: {e}")))?;

    let mut source = Region::new(&adapter, residency, REGION_LEN)?;
    let mut dest = Region::new(&adapter, residency, REGION_LEN)?;

    let start = std::time::Instant::now();
    let mut verified = 0usize;
    let mut staged_sends = 0usize;
    let mut bytes = 0usize;

    for i in 0..num_messages {
        if !keep_running.load(Ordering::SeqCst) {
            println!("Soak: interrupted");
            break;
        }

        // vary the shape: dense runs hit the zero-copy path, gaps force staging
        let elem_size = 1usize << spread(i, 4);
        let block_len = 1 + spread(i + 7, 64);
        let stride = block_len + spread(i + 13, 3);
        let max_count = REGION_LEN / (stride * elem_size);
        let count = 1 + spread(i + 29, max_count.max(1));
        let shape = VectorShape::vector(count, block_len, stride, elem_size);

        let src_bytes = source.bytes_mut();
        for (j, b) in src_bytes.iter_mut().enumerate() {
            *b = (i.wrapping_mul(31) ^ j) as u8;
        }
        let expected = layout_digest(src_bytes, shape);

        let mut send_layout = unsafe {
            StridedLayout::from_raw_parts(source.ptr.as_ptr(), REGION_LEN, shape, residency)
        }?;
        let mut recv_layout = unsafe {
            StridedLayout::from_raw_parts(dest.ptr.as_ptr(), REGION_LEN, shape, residency)
        }?;

        let sent = adapter.prepare_send_buffer(&mut send_layout)?;
        let recv = adapter.prepare_receive_buffer(&recv_layout)?;
        if sent.owned_by_adapter() {
            staged_sends += 1;
        }

        // the wire
        let wire_len = sent.len().min(recv.capacity());
        if wire_len > 0 {
            unsafe { ptr::copy_nonoverlapping(sent.as_ptr(), recv.as_mut_ptr(), wire_len) };
        }
        drop(sent);
        adapter.complete_receive(&mut recv_layout, recv, wire_len)?;
        bytes += wire_len;

        let actual = layout_digest(dest.bytes_mut(), shape);
        if actual != expected {
            eprintln!("Soak: digest mismatch on message {i} ({shape:?})");
            std::process::exit(2);
        }
        verified += 1;

        if verified % 1000 == 0 {
            println!("Verified {} messages", verified);
        }
    }

    let elapsed = start.elapsed();
    let host = adapter.allocators().host().stats();
    let accel = adapter.allocators().accelerator().stats();
    println!(
        "Soak: verified {} messages ({} staged, {} bytes) in {:.2?}",
        verified, staged_sends, bytes, elapsed
    );
    println!("Soak: host allocator {:?}", host);
    println!("Soak: accelerator allocator {:?}", accel);
    Ok(())
}

/// Cheap deterministic spread so runs are reproducible.
fn spread(seed: usize, bound: usize) -> usize {
    let mut x = (seed as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 29;
    (x % bound.max(1) as u64) as usize
}

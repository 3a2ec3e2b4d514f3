// Mapped memory backend for Linux
// Uses memfd_create + mmap; backs the simulated accelerator arena

use std::fmt::Debug;
use std::io;
use std::ptr;
use std::ptr::NonNull;

/// Backing memory for an arena.
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the underlying file descriptor
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
}

/// Map a fresh anonymous region of `size` bytes, 128-byte aligned.
///
/// `name` only labels the memfd (visible under /proc/<pid>/fd); nothing is
/// created in the filesystem.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(size: usize, name: Option<&str>) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_size: usize, _name: Option<&str>) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Mapped arena memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    mapping: (*mut u8, usize),
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    pub fn create(size: usize, name: Option<&str>) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "mapped region size must be non-zero",
            ));
        }
        let label = std::ffi::CString::new(name.unwrap_or("dmxp_arena")).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid memfd name: {e}"))
        })?;

        let fd = unsafe { libc::memfd_create(label.as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // Extra space for alignment
        let total_size = size + 127;
        if unsafe { libc::ftruncate(fd, total_size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // Align the pointer to 128 bytes
        let aligned = ((raw as usize + 127) & !127) as *mut u8;
        let ptr = match NonNull::new(aligned) {
            Some(p) => p,
            None => {
                unsafe {
                    libc::munmap(raw, total_size);
                    libc::close(fd);
                }
                return Err(io::Error::new(io::ErrorKind::Other, "mmap returned null"));
            }
        };

        Ok(Self {
            ptr,
            size,
            fd,
            mapping: (raw as *mut u8, total_size),
        })
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            let (raw, len) = self.mapping;
            libc::munmap(raw as *mut libc::c_void, len);
            libc::close(self.fd);
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }
}

//! Shared memory backend abstraction for Linux, using `memfd_create` + `mmap`.
//!
//! This is an optional backing for [`AtomicBuffer`](crate::abr::AtomicBuffer):
//! the ABR's contract (spec.md §4.1) never requires cross-process visibility,
//! but it never forbids it either, so a caller that wants a ring visible to
//! another process can hand an `AtomicBuffer` a region obtained here instead
//! of the default heap allocation.

use std::io;
use std::ptr;
use std::ptr::NonNull;

/// Shared memory backend trait for cross-platform memory mapping.
pub trait SharedMemoryBackend: Send + Sync {
    /// Pointer to the start of the mapped region.
    fn as_ptr(&self) -> *mut u8;

    /// Size of the mapped region in bytes.
    fn size(&self) -> usize;

    /// The underlying OS handle.
    fn raw_handle(&self) -> RawHandle;
}

/// Platform-specific handle type.
#[derive(Debug, Clone, Copy)]
pub enum RawHandle {
    /// Unix file descriptor (Linux).
    Fd(i32),
}

/// Create a new anonymous shared memory region of `size` bytes.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(
    size: usize,
    name: Option<&str>,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Ok(Box::new(LinuxSharedMemory::create(size, name)?))
}

/// Attach to an existing named shared memory region.
///
/// Cross-process attachment via `memfd_create` requires file descriptor
/// passing (e.g. over a Unix domain socket or `/proc/self/fd/`); this crate
/// does not implement that transport, so this always fails today. It is
/// kept as an explicit extension point rather than omitted, matching the
/// shape callers expect from [`create_shared_memory`].
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(
    name: &str,
    size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    LinuxSharedMemory::attach(name, size).map(|shm| Box::new(shm) as Box<dyn SharedMemoryBackend>)
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(
    _size: usize,
    _name: Option<&str>,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "shared memory backing is only implemented for Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(
    _name: &str,
    _size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "shared memory backing is only implemented for Linux",
    ))
}

#[cfg(target_os = "linux")]
use libc::{c_void, syscall, SYS_memfd_create};
#[cfg(target_os = "linux")]
use std::ffi::CString;
#[cfg(target_os = "linux")]
use std::os::unix::io::RawFd;

#[cfg(target_os = "linux")]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: RawFd,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    pub fn create(size: usize, name: Option<&str>) -> io::Result<Self> {
        let c_name = CString::new(name.unwrap_or("p_core_shm")).unwrap();
        let flags = 0u64; // MFD_CLOEXEC would be 1

        let fd = unsafe { syscall(SYS_memfd_create, c_name.as_ptr(), flags) as RawFd };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::ftruncate(fd, size as i64) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            ) as *mut u8
        };

        if ptr as *mut c_void == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        tracing::debug!(size, fd, "mapped anonymous shared memory region");

        Ok(Self {
            ptr: NonNull::new(ptr).unwrap(),
            size,
            fd,
        })
    }

    pub fn attach(_name: &str, _size: usize) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "attach not yet implemented for Linux memfd; requires fd passing via /proc/self/fd/",
        ))
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut c_void, self.size);
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

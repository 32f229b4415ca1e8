//! Thin wrapper over the syscalls the bus drivers issue against a
//! character device, so a test can stand in for the kernel.

use std::ffi::CString;
use std::io;
use std::os::raw::{c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::Arc;

use libc::Ioctl;
use tracing::warn;

/// Syscall surface used by the I2C, SPI and UART drivers.
pub trait CharDevice: Send {
    fn open(&mut self, path: &Path, flags: c_int) -> io::Result<RawFd>;

    fn close(&mut self, fd: RawFd) -> io::Result<()>;

    /// Issue `request` on `fd`.
    ///
    /// # Safety
    ///
    /// `arg` must be whatever `request` expects: either a pointer to a live,
    /// correctly laid out value, or a plain integer smuggled through the
    /// pointer (as `I2C_SLAVE` does).
    unsafe fn ioctl(
        &mut self,
        fd: RawFd,
        request: Ioctl,
        arg: *mut c_void,
    ) -> io::Result<c_int>;

    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize>;
}

/// Builds one [`CharDevice`] per driver instance.
pub trait CharDeviceFactory: Send + Sync {
    fn new_char_device(&self) -> Box<dyn CharDevice>;
}

/// Shared factory handed to driver registrations. `None` selects
/// [`SysCharDevice`].
pub type CharDeviceSource = Option<Arc<dyn CharDeviceFactory>>;

pub(crate) fn new_char_device(source: &CharDeviceSource) -> Box<dyn CharDevice> {
    match source {
        Some(factory) => factory.new_char_device(),
        None => Box::new(SysCharDevice),
    }
}

/// The real thing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysCharDevice;

fn cvt(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn cvt_size(ret: libc::ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

impl CharDevice for SysCharDevice {
    fn open(&mut self, path: &Path, flags: c_int) -> io::Result<RawFd> {
        let path = CString::new(path.as_os_str().as_bytes())?;
        // SAFETY: `path` is a valid NUL-terminated string for the call.
        cvt(unsafe { libc::open(path.as_ptr(), flags | libc::O_CLOEXEC) })
    }

    fn close(&mut self, fd: RawFd) -> io::Result<()> {
        // SAFETY: the caller owns `fd` and does not use it afterwards.
        cvt(unsafe { libc::close(fd) }).map(drop)
    }

    unsafe fn ioctl(
        &mut self,
        fd: RawFd,
        request: Ioctl,
        arg: *mut c_void,
    ) -> io::Result<c_int> {
        cvt(libc::ioctl(fd, request, arg))
    }

    fn read(&mut self, fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for `buf.len()` bytes of writes.
        cvt_size(unsafe {
            libc::read(fd, buf.as_mut_ptr() as *mut c_void, buf.len())
        })
    }

    fn write(&mut self, fd: RawFd, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for `buf.len()` bytes of reads.
        cvt_size(unsafe {
            libc::write(fd, buf.as_ptr() as *const c_void, buf.len())
        })
    }
}

/// A descriptor opened through a [`CharDevice`], closed on drop.
pub(crate) struct OpenDevice {
    dev: Box<dyn CharDevice>,
    fd: RawFd,
}

impl OpenDevice {
    pub(crate) fn open(
        mut dev: Box<dyn CharDevice>,
        path: &Path,
        flags: c_int,
    ) -> io::Result<Self> {
        let fd = dev.open(path, flags)?;
        Ok(Self { dev, fd })
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    /// # Safety
    ///
    /// Same contract as [`CharDevice::ioctl`].
    pub(crate) unsafe fn ioctl(
        &mut self,
        request: Ioctl,
        arg: *mut c_void,
    ) -> io::Result<c_int> {
        self.dev.ioctl(self.fd, request, arg)
    }

    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.dev.read(self.fd, buf)
    }

    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.dev.write(self.fd, buf)
    }
}

impl Drop for OpenDevice {
    fn drop(&mut self) {
        if let Err(e) = self.dev.close(self.fd) {
            warn!(fd = self.fd, error = %e, "close failed");
        }
    }
}

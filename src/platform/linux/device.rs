use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::io;

use libc::{O_CLOEXEC, O_RDWR};

use crate::device::RawDevice;
use crate::error::{Error, Result, SyscallOp};
use crate::platform::linux::sys::configure;
use crate::platform::posix::Fd;

/// A configured descriptor of the Linux TUN/TAP driver.
pub struct TunDevice {
    fd: Fd,
    name: String,
}

impl TunDevice {
    /// Open `path` and bind it to the tun interface `name`.
    ///
    /// The descriptor is closed again if configuration fails.
    pub fn open(path: &Path, name: &str) -> Result<Self> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::Open {
            path: path.to_path_buf(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;
        let fd = unsafe { libc::open(c_path.as_ptr(), O_RDWR | O_CLOEXEC, 0) };
        let fd = Fd::new(fd).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let name = configure(fd.as_raw_fd(), name)?;
        log::info!("tun interface {name} attached to {}", path.display());
        Ok(Self { fd, name })
    }

    /// Name of the kernel interface this descriptor is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RawDevice for TunDevice {
    fn read_raw(&self, buf: &mut [u8]) -> Result<usize> {
        self.fd
            .read(buf)
            .map_err(|err| Error::syscall(SyscallOp::Read, err))
    }

    fn write_raw(&self, buf: &[u8]) -> Result<usize> {
        self.fd
            .write(buf)
            .map_err(|err| Error::syscall(SyscallOp::Write, err))
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    #[cfg(feature = "interruptible")]
    fn interrupt(&self) -> Result<()> {
        self.fd.shutdown().map_err(Error::from)
    }
}

impl AsRawFd for TunDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::fmt::Debug for TunDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDevice")
            .field("fd", &self.fd.as_raw_fd())
            .field("name", &self.name)
            .finish()
    }
}

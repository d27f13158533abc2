use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
#[cfg(feature = "interruptible")]
use std::os::fd::{FromRawFd, OwnedFd};
#[cfg(feature = "interruptible")]
use std::sync::atomic::{AtomicBool, Ordering};

/// Owned POSIX file descriptor with blocking read/write.
pub(crate) struct Fd {
    pub(crate) inner: RawFd,
    #[cfg(feature = "interruptible")]
    is_shutdown: AtomicBool,
    #[cfg(feature = "interruptible")]
    event_fd: EventFd,
}

impl Fd {
    pub fn new(value: RawFd) -> io::Result<Self> {
        if value < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Fd {
            inner: value,
            #[cfg(feature = "interruptible")]
            is_shutdown: AtomicBool::new(false),
            #[cfg(feature = "interruptible")]
            event_fd: match EventFd::new() {
                Ok(event_fd) => event_fd,
                Err(err) => {
                    unsafe { libc::close(value) };
                    return Err(err);
                }
            },
        })
    }

    #[inline]
    fn read0(&self, buf: &mut [u8]) -> io::Result<usize> {
        let amount = unsafe { libc::read(self.inner, buf.as_mut_ptr() as *mut _, buf.len()) };
        if amount < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(amount as usize)
    }

    #[inline]
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let amount = unsafe { libc::write(self.inner, buf.as_ptr() as *const _, buf.len()) };
        if amount < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(amount as usize)
    }
}

#[cfg(not(feature = "interruptible"))]
impl Fd {
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.read0(buf)
    }
}

#[cfg(feature = "interruptible")]
fn interrupted() -> io::Error {
    io::Error::new(
        io::ErrorKind::ConnectionAborted,
        "device read interrupted by shutdown",
    )
}

#[cfg(feature = "interruptible")]
impl Fd {
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_shutdown.load(Ordering::Acquire) {
            return Err(interrupted());
        }
        self.wait_readable()?;
        self.read0(buf)
    }

    /// Park in `poll(2)` until the device or the wake-up eventfd is readable.
    fn wait_readable(&self) -> io::Result<()> {
        let mut fds = [
            libc::pollfd {
                fd: self.inner,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.event_fd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        loop {
            let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if self.is_shutdown.load(Ordering::Acquire) {
                return Err(interrupted());
            }
            if ready >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Fail the in-flight read and every read after it.
    pub fn shutdown(&self) -> io::Result<()> {
        self.is_shutdown.store(true, Ordering::Release);
        self.event_fd.wake()
    }
}

/// Counter descriptor whose only job is to become readable on shutdown.
#[cfg(feature = "interruptible")]
struct EventFd(OwnedFd);

#[cfg(feature = "interruptible")]
impl EventFd {
    fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(unsafe { OwnedFd::from_raw_fd(fd) }))
    }

    fn wake(&self) -> io::Result<()> {
        let one = 1u64.to_ne_bytes();
        let n = unsafe { libc::write(self.0.as_raw_fd(), one.as_ptr() as *const _, one.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            // A saturated counter is still readable.
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }

    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl AsRawFd for Fd {
    fn as_raw_fd(&self) -> RawFd {
        self.inner
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        if self.inner >= 0 {
            unsafe { libc::close(self.inner) };
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pipe() -> (Fd, Fd) {
        let mut fds: [libc::c_int; 2] = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (Fd::new(fds[0]).unwrap(), Fd::new(fds[1]).unwrap())
    }

    #[test]
    fn negative_descriptor() {
        assert!(Fd::new(-1).is_err());
    }

    #[test]
    fn blocking_read_write() {
        let (rx, tx) = pipe();
        assert_eq!(tx.write(b"hello").unwrap(), 5);
        let mut buf = [0u8; 16];
        let n = rx.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn write_error_is_os_error() {
        let (rx, tx) = pipe();
        drop(rx);
        unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN) };
        let err = tx.write(b"x").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPIPE));
    }

    #[cfg(feature = "interruptible")]
    #[test]
    fn shutdown_wakes_blocked_read() {
        use std::sync::Arc;
        let (rx, _tx) = pipe();
        let rx = Arc::new(rx);
        let reader = rx.clone();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read(&mut buf)
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        rx.shutdown().unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }
}

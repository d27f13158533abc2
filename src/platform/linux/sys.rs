use libc::{c_int, c_short, IFNAMSIZ};
use nix::ioctl_write_ptr;
use std::os::unix::io::RawFd;
use std::{io, mem};

use crate::error::{Error, Result};

ioctl_write_ptr!(tunsetiff, b'T', 202, c_int);

bitflags::bitflags! {
    /// Flags carried by `TUNSETIFF`.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct InterfaceFlags: c_short {
        const TUN = libc::IFF_TUN as c_short;
        const NO_PI = libc::IFF_NO_PI as c_short;
    }
}

const IFREQ_PAD: usize = mem::size_of::<libc::ifreq>() - IFNAMSIZ - mem::size_of::<c_short>();

/// The `struct ifreq` view used by `TUNSETIFF`: a NUL-padded name followed by
/// the flags member of the request union.
///
/// Padded to the full size of `struct ifreq` since the kernel copies the whole
/// struct in and out.
#[repr(C)]
pub struct InterfaceRequest {
    name: [u8; IFNAMSIZ],
    flags: c_short,
    _pad: [u8; IFREQ_PAD],
}

const _: () = assert!(mem::size_of::<InterfaceRequest>() == mem::size_of::<libc::ifreq>());

impl InterfaceRequest {
    /// Build a request for `name` (at most 15 bytes, no NUL) with `flags`.
    pub fn new(name: &str, flags: InterfaceFlags) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() >= IFNAMSIZ {
            return Err(Error::NameTooLong);
        }
        if bytes.contains(&0) {
            return Err(Error::InvalidName);
        }
        let mut req = InterfaceRequest {
            name: [0; IFNAMSIZ],
            flags: flags.bits(),
            _pad: [0; IFREQ_PAD],
        };
        req.name[..bytes.len()].copy_from_slice(bytes);
        Ok(req)
    }

    /// The name up to the first NUL.
    pub fn name(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(IFNAMSIZ);
        &self.name[..end]
    }

    pub fn flags(&self) -> InterfaceFlags {
        InterfaceFlags::from_bits_retain(self.flags)
    }
}

/// Bind `fd` to the tun interface `name` in point-to-point IP mode without
/// the packet-information prefix.
///
/// Returns the interface name the kernel settled on, which differs from
/// `name` when `name` is empty or a `%d` template.
pub fn configure(fd: RawFd, name: &str) -> Result<String> {
    let mut req = InterfaceRequest::new(name, InterfaceFlags::TUN | InterfaceFlags::NO_PI)?;
    if let Err(err) = unsafe { tunsetiff(fd, &mut req as *mut _ as *mut _) } {
        return Err(Error::Configuration {
            name: name.to_string(),
            source: io::Error::from(err),
        });
    }
    Ok(String::from_utf8_lossy(req.name()).into_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn request_layout() {
        let req = InterfaceRequest::new("tun0", InterfaceFlags::TUN | InterfaceFlags::NO_PI).unwrap();
        assert_eq!(req.name(), b"tun0");
        assert_eq!(req.flags().bits(), 0x1001);

        let raw = &req as *const InterfaceRequest as *const u8;
        let bytes = unsafe { std::slice::from_raw_parts(raw, mem::size_of::<InterfaceRequest>()) };
        assert_eq!(&bytes[..5], b"tun0\0");
        assert!(bytes[5..IFNAMSIZ].iter().all(|&b| b == 0));
        assert_eq!(
            c_short::from_ne_bytes([bytes[IFNAMSIZ], bytes[IFNAMSIZ + 1]]),
            0x1001
        );
    }

    #[test]
    fn name_bounds() {
        assert!(InterfaceRequest::new("fifteen-bytes-x", InterfaceFlags::TUN).is_ok());
        assert!(matches!(
            InterfaceRequest::new("sixteen-bytes-xx", InterfaceFlags::TUN),
            Err(Error::NameTooLong)
        ));
        assert!(matches!(
            InterfaceRequest::new("tun\00", InterfaceFlags::TUN),
            Err(Error::InvalidName)
        ));
        assert_eq!(InterfaceRequest::new("", InterfaceFlags::TUN).unwrap().name(), b"");
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn tunsetiff_request_code() {
        let code = nix::request_code_write!(b'T', 202, mem::size_of::<c_int>());
        assert_eq!(code as u64, 0x400454ca);
    }

    #[test]
    fn configure_rejects_non_tun_descriptor() {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/null")
            .unwrap();
        let err = configure(file.as_raw_fd(), "tun0").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    }
}

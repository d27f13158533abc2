use bytes::{Bytes, BytesMut};
use std::fmt;
use std::ops::Deref;

use crate::error::{Error, Result};

/// An owned packet buffer together with the number of valid bytes in it.
///
/// Only the prefix `[0, len)` is meaningful; the rest of the buffer is the
/// unused tail of the fixed-size allocation the ingress pump reads into.
#[derive(Clone)]
pub struct Packet {
    buf: BytesMut,
    len: usize,
}

impl Packet {
    /// Wrap `buf`, of which the first `len` bytes are valid.
    pub fn new(buf: BytesMut, len: usize) -> Result<Self> {
        if len > buf.len() {
            return Err(Error::PacketTooLarge {
                len,
                capacity: buf.len(),
            });
        }
        Ok(Self { buf, len })
    }

    /// Copy `data` into a buffer of exactly its size.
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
            len: data.len(),
        }
    }

    pub(crate) fn zeroed(capacity: usize) -> BytesMut {
        BytesMut::zeroed(capacity)
    }

    /// The valid prefix of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the underlying allocation.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Freeze the valid prefix, discarding the unused tail.
    pub fn into_bytes(mut self) -> Bytes {
        self.buf.truncate(self.len);
        self.buf.freeze()
    }
}

impl Deref for Packet {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Bytes> for Packet {
    fn from(value: Bytes) -> Self {
        let len = value.len();
        Self {
            buf: BytesMut::from(&value[..]),
            len,
        }
    }
}

// Equality ignores the unused tail and the allocation size.
impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.len)
            .field("capacity", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_prefix_only() {
        let mut buf = Packet::zeroed(8);
        buf[..3].copy_from_slice(&[1, 2, 3]);
        let packet = Packet::new(buf, 3).unwrap();
        assert_eq!(packet.as_bytes(), &[1, 2, 3]);
        assert_eq!(packet.capacity(), 8);
        assert_eq!(&packet.into_bytes()[..], &[1, 2, 3]);
    }

    #[test]
    fn length_beyond_capacity() {
        let err = Packet::new(Packet::zeroed(4), 5).unwrap_err();
        assert!(matches!(
            err,
            Error::PacketTooLarge {
                len: 5,
                capacity: 4
            }
        ));
    }

    #[test]
    fn equality_covers_valid_prefix_only() {
        let mut buf = Packet::zeroed(2048);
        buf[..3].copy_from_slice(&[1, 2, 3]);
        buf[3] = 0xff;
        let read = Packet::new(buf, 3).unwrap();
        assert_eq!(read, Packet::from_slice(&[1, 2, 3]));
        assert_ne!(read, Packet::from_slice(&[1, 2, 3, 0xff]));
    }

    #[test]
    fn empty_packet() {
        let packet = Packet::new(Packet::zeroed(16), 0).unwrap();
        assert!(packet.is_empty());
        assert_eq!(packet.len(), 0);
    }
}

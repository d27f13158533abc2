use std::path::PathBuf;

use crate::device::{NetDevice, RawDevice};
use crate::error::{Error, Result};
use crate::{PACKET_SIZE, QUEUE_SIZE};

/// Interface name used when none is given.
pub const DEFAULT_NAME: &str = "tun0";

/// Builder for a [`NetDevice`].
#[derive(Clone, Default, Debug)]
pub struct DeviceBuilder {
    dev_name: Option<String>,
    path: Option<PathBuf>,
    packet_size: Option<usize>,
    queue_capacity: Option<usize>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    /// Interface name, at most 15 bytes. An empty name lets the kernel pick one.
    pub fn name<S: Into<String>>(mut self, dev_name: S) -> Self {
        self.dev_name = Some(dev_name.into());
        self
    }
    /// Device node to open instead of `/dev/net/tun`.
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }
    /// Bytes allocated per device read. Longer packets are truncated by the driver.
    pub fn packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = Some(packet_size);
        self
    }
    /// Packets each direction may hold before producers block.
    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = Some(queue_capacity);
        self
    }

    fn sizes(&self) -> Result<(usize, usize)> {
        let packet_size = self.packet_size.unwrap_or(PACKET_SIZE);
        let queue_capacity = self.queue_capacity.unwrap_or(QUEUE_SIZE);
        if packet_size == 0 {
            return Err(Error::InvalidConfig("packet size must be positive"));
        }
        if queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be positive"));
        }
        Ok((packet_size, queue_capacity))
    }

    /// Open and configure the tun device. No pumps are started until
    /// [`NetDevice::bind`].
    #[cfg(target_os = "linux")]
    pub fn build(self) -> Result<NetDevice<crate::platform::TunDevice>> {
        use crate::platform::{TunDevice, DEFAULT_PATH};
        use std::path::Path;

        let (packet_size, queue_capacity) = self.sizes()?;
        let path = self.path.as_deref().unwrap_or(Path::new(DEFAULT_PATH));
        let name = self.dev_name.as_deref().unwrap_or(DEFAULT_NAME);
        let device = TunDevice::open(path, name)?;
        Ok(NetDevice::from_device(device, packet_size, queue_capacity))
    }

    /// Wrap an already configured device. The name and path settings are
    /// ignored.
    pub fn build_with<D: RawDevice>(self, device: D) -> Result<NetDevice<D>> {
        let (packet_size, queue_capacity) = self.sizes()?;
        Ok(NetDevice::from_device(device, packet_size, queue_capacity))
    }
}

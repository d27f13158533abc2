/*!
A Linux TUN device exposed as a full-duplex pair of bounded packet queues.

[`NetDevice`] opens `/dev/net/tun`, binds it to a point-to-point IP interface
(`IFF_TUN | IFF_NO_PI`), and after [`NetDevice::bind`] runs two pump threads:
one moving packets from the device into an incoming queue, one moving packets
from an outgoing queue to the device. Both queues are bounded, so a slow
reader stalls device reads and a slow device stalls writers.

# Example:
```no_run
use tun_duplex::DeviceBuilder;

let dev = DeviceBuilder::new().name("tun0").build()?;
dev.bind()?;
loop {
    let packet = dev.read()?;
    println!("{:?}", packet.as_bytes());
    dev.write(packet)?;
}
# Ok::<(), tun_duplex::Error>(())
```
*/

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::builder::{DeviceBuilder, DEFAULT_NAME};
pub use crate::cancel::CancellationToken;
pub use crate::device::{NetDevice, RawDevice, State};
pub use crate::error::{BoxError, Error, Result, SyscallOp};
pub use crate::packet::Packet;
pub use crate::pump::Statistics;

#[cfg(target_os = "linux")]
pub use crate::platform::TunDevice;

mod builder;
mod cancel;
mod device;
mod error;
mod packet;
pub mod platform;
mod pump;

/// Bytes allocated for each device read.
pub const PACKET_SIZE: usize = 2048;
/// Packets each queue holds before producers block.
pub const QUEUE_SIZE: usize = 100;

pub mod sys;

mod device;

pub use self::device::TunDevice;

/// Device node of the TUN/TAP driver.
pub const DEFAULT_PATH: &str = "/dev/net/tun";

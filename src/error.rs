use std::fmt;
use std::io;
use std::path::PathBuf;

/// Direction of a failed device syscall.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyscallOp {
    Read,
    Write,
}

impl fmt::Display for SyscallOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyscallOp::Read => f.write_str("read"),
            SyscallOp::Write => f.write_str("write"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure interface {name:?}: {source}")]
    Configuration {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to {op}: {source}")]
    Syscall {
        op: SyscallOp,
        #[source]
        source: io::Error,
    },

    #[error("packet queue closed")]
    QueueClosed,

    #[error("device cancelled")]
    Cancelled,

    #[error("device already bound")]
    AlreadyBound,

    #[error("device not bound")]
    NotBound,

    #[error("device tun name too long")]
    NameTooLong,

    #[error("invalid device tun name")]
    InvalidName,

    #[error("packet length {len} exceeds buffer capacity {capacity}")]
    PacketTooLarge { len: usize, capacity: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn syscall(op: SyscallOp, source: io::Error) -> Self {
        Error::Syscall { op, source }
    }

    /// The OS error code behind an `Open`, `Configuration`, `Syscall` or `Io` error.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Open { source, .. }
            | Error::Configuration { source, .. }
            | Error::Syscall { source, .. }
            | Error::Io(source) => source.raw_os_error(),
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(err) => err,
            Error::Syscall { source, .. } => source,
            Error::QueueClosed => io::Error::new(io::ErrorKind::BrokenPipe, value),
            Error::Cancelled => io::Error::new(io::ErrorKind::ConnectionAborted, value),
            _ => io::Error::new(io::ErrorKind::Other, value),
        }
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

#![allow(dead_code)]

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::time::{Duration, Instant};

use tun_duplex::{Error, RawDevice, Result, SyscallOp};

/// What the next `read_raw` call produces.
pub enum Step {
    Packet(Vec<u8>),
    Fail(i32),
}

/// In-memory device driven by a script of reads. Every `read_raw` call is
/// announced on `read_entered` and every successful write is reported on
/// `written`.
pub struct ScriptedDevice {
    reads: Receiver<Step>,
    read_entered: Sender<()>,
    written: Sender<Vec<u8>>,
    write_errno: Option<i32>,
    gate: Option<Gate>,
}

/// Holds every `write_raw` until the test opens the gate once per write.
struct Gate {
    entered: Sender<()>,
    open: Receiver<()>,
}

pub struct Script {
    pub reads: Sender<Step>,
    pub read_entered: Receiver<()>,
    pub written: Receiver<Vec<u8>>,
}

pub struct GateControl {
    pub entered: Receiver<()>,
    pub open: Sender<()>,
}

impl ScriptedDevice {
    pub fn new() -> (Self, Script) {
        let (reads_tx, reads_rx) = channel::unbounded();
        let (written_tx, written_rx) = channel::unbounded();
        let (entered_tx, entered_rx) = channel::unbounded();
        let device = ScriptedDevice {
            reads: reads_rx,
            read_entered: entered_tx,
            written: written_tx,
            write_errno: None,
            gate: None,
        };
        let script = Script {
            reads: reads_tx,
            read_entered: entered_rx,
            written: written_rx,
        };
        (device, script)
    }

    pub fn failing_writes(mut self, errno: i32) -> Self {
        self.write_errno = Some(errno);
        self
    }

    pub fn gated(mut self) -> (Self, GateControl) {
        let (entered_tx, entered_rx) = channel::unbounded();
        let (open_tx, open_rx) = channel::unbounded();
        self.gate = Some(Gate {
            entered: entered_tx,
            open: open_rx,
        });
        let control = GateControl {
            entered: entered_rx,
            open: open_tx,
        };
        (self, control)
    }
}

impl RawDevice for ScriptedDevice {
    fn read_raw(&self, buf: &mut [u8]) -> Result<usize> {
        let _ = self.read_entered.send(());
        match self.reads.recv() {
            Ok(Step::Packet(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Ok(Step::Fail(errno)) => Err(Error::Syscall {
                op: SyscallOp::Read,
                source: io::Error::from_raw_os_error(errno),
            }),
            Err(_) => {
                std::thread::sleep(Duration::from_millis(5));
                Err(Error::Syscall {
                    op: SyscallOp::Read,
                    source: io::Error::from_raw_os_error(libc::EBADF),
                })
            }
        }
    }

    fn write_raw(&self, buf: &[u8]) -> Result<usize> {
        if let Some(gate) = &self.gate {
            let _ = gate.entered.send(());
            let _ = gate.open.recv();
        }
        if let Some(errno) = self.write_errno {
            return Err(Error::Syscall {
                op: SyscallOp::Write,
                source: io::Error::from_raw_os_error(errno),
            });
        }
        let _ = self.written.send(buf.to_vec());
        Ok(buf.len())
    }

    fn name(&self) -> Option<String> {
        Some("scripted0".to_string())
    }
}

/// A device whose reads always fail.
pub struct BrokenReads {
    pub errno: i32,
}

impl RawDevice for BrokenReads {
    fn read_raw(&self, _buf: &mut [u8]) -> Result<usize> {
        std::thread::sleep(Duration::from_millis(1));
        Err(Error::Syscall {
            op: SyscallOp::Read,
            source: io::Error::from_raw_os_error(self.errno),
        })
    }

    fn write_raw(&self, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }
}

pub fn wait_until<F: FnMut() -> bool>(mut cond: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn recv<T>(rx: &Receiver<T>) -> T {
    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(value) => value,
        Err(RecvTimeoutError::Timeout) => panic!("timed out"),
        Err(RecvTimeoutError::Disconnected) => panic!("disconnected"),
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

use crossbeam::channel::{self, select, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::pump::{Counters, PumpController, PumpEnds, Statistics};

/// Blocking packet I/O over one device descriptor.
///
/// Each direction is driven by exactly one pump thread, so implementations
/// need no internal locking between `read_raw` calls or between `write_raw`
/// calls.
pub trait RawDevice: Send + Sync + 'static {
    /// Issue a single blocking read. The returned count is the valid length
    /// of `buf`; partial reads are normal.
    fn read_raw(&self, buf: &mut [u8]) -> Result<usize>;

    /// Issue a single blocking write of `buf`.
    fn write_raw(&self, buf: &[u8]) -> Result<usize>;

    /// Name of the network interface behind the device, if it has one.
    fn name(&self) -> Option<String> {
        None
    }

    /// Wake a blocked `read_raw`. Devices that cannot be interrupted keep the
    /// default, and shutdown then waits for the in-flight read to return.
    fn interrupt(&self) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle of a [`NetDevice`]. Transitions only move forward.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    /// Device configured, pumps not started.
    Configured,
    /// Pumps running.
    Bound,
    /// Shutdown requested, pumps still winding down.
    Cancelled,
    /// Pumps gone and descriptor released.
    Closed,
}

enum Stage<D> {
    Configured(PumpEnds<D>),
    Bound(PumpController<D>),
    Released,
}

/// A tun device bridged to a pair of bounded packet queues.
///
/// After [`bind`](Self::bind), an ingress thread copies every packet the
/// device produces into the incoming queue and an egress thread writes every
/// queued outgoing packet to the device. [`read`](Self::read) and
/// [`write`](Self::write) only touch the queues and may be called from any
/// thread.
pub struct NetDevice<D: RawDevice> {
    incoming: Receiver<Packet>,
    outgoing: Sender<Packet>,
    token: CancellationToken,
    counters: Arc<Counters>,
    stage: Mutex<Stage<D>>,
    bound: AtomicBool,
    name: Option<String>,
    packet_size: usize,
    queue_capacity: usize,
}

impl<D: RawDevice> NetDevice<D> {
    pub(crate) fn from_device(device: D, packet_size: usize, queue_capacity: usize) -> Self {
        let (incoming_tx, incoming_rx) = channel::bounded(queue_capacity);
        let (outgoing_tx, outgoing_rx) = channel::bounded(queue_capacity);
        let name = device.name();
        Self {
            incoming: incoming_rx,
            outgoing: outgoing_tx,
            token: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
            stage: Mutex::new(Stage::Configured(PumpEnds {
                device: Arc::new(device),
                incoming: incoming_tx,
                outgoing: outgoing_rx,
            })),
            bound: AtomicBool::new(false),
            name,
            packet_size,
            queue_capacity,
        }
    }

    fn stage(&self) -> MutexGuard<'_, Stage<D>> {
        match self.stage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start the ingress and egress pumps.
    ///
    /// Fails with [`Error::AlreadyBound`] on a second call and with
    /// [`Error::Cancelled`] after [`shutdown`](Self::shutdown).
    pub fn bind(&self) -> Result<()> {
        let mut stage = self.stage();
        match std::mem::replace(&mut *stage, Stage::Released) {
            Stage::Configured(ends) => {
                if self.token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let controller = PumpController::spawn(
                    ends,
                    self.token.clone(),
                    self.counters.clone(),
                    self.packet_size,
                )?;
                *stage = Stage::Bound(controller);
                self.bound.store(true, Ordering::SeqCst);
                log::debug!("device {} bound", self.display_name());
                Ok(())
            }
            Stage::Bound(controller) => {
                *stage = Stage::Bound(controller);
                Err(Error::AlreadyBound)
            }
            Stage::Released => Err(Error::Cancelled),
        }
    }

    fn ensure_bound(&self) -> Result<()> {
        if self.bound.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotBound)
        }
    }

    /// Take the next packet the device produced, blocking until one arrives.
    ///
    /// After shutdown, packets already queued are still returned; once they
    /// are drained this fails with [`Error::QueueClosed`]. The ingress pump
    /// stops queueing once it observes the shutdown.
    pub fn read(&self) -> Result<Packet> {
        if self.token.is_cancelled() {
            return self.incoming.try_recv().map_err(|_| Error::QueueClosed);
        }
        self.ensure_bound()?;
        select! {
            recv(self.incoming) -> packet => packet.map_err(|_| Error::QueueClosed),
            recv(self.token.done()) -> _ => self.incoming.try_recv().map_err(|_| Error::QueueClosed),
        }
    }

    /// Queue `packet` for the device, blocking while the outgoing queue is
    /// full.
    ///
    /// Returns once the packet is queued, not once it is transmitted. Fails
    /// with [`Error::Cancelled`] without blocking if the device is shut down,
    /// and unblocks with the same error if shutdown happens while waiting.
    pub fn write(&self, packet: Packet) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.ensure_bound()?;
        select! {
            send(self.outgoing, packet) -> res => res.map_err(|_| Error::Cancelled),
            recv(self.token.done()) -> _ => Err(Error::Cancelled),
        }
    }

    /// Request teardown. Idempotent and non-blocking.
    ///
    /// A read already blocked inside the device keeps its pump alive until it
    /// returns, unless the device supports [`RawDevice::interrupt`].
    pub fn shutdown(&self) {
        if !self.token.cancel() {
            return;
        }
        log::debug!("device {} shutting down", self.display_name());
        let mut stage = self.stage();
        if let Stage::Bound(controller) = &*stage {
            if let Err(err) = controller.interrupt() {
                log::warn!("failed to interrupt device read: {err}");
            }
            return;
        }
        // Never bound: nothing else holds the descriptor.
        *stage = Stage::Released;
    }

    /// Shut down and wait for both pumps to exit, releasing the descriptor.
    pub fn close(self) -> Result<()> {
        self.shutdown();
        let stage = std::mem::replace(&mut *self.stage(), Stage::Released);
        match stage {
            Stage::Bound(controller) => controller.join(),
            _ => Ok(()),
        }
    }

    pub fn state(&self) -> State {
        let stage = self.stage();
        match (&*stage, self.token.is_cancelled()) {
            (Stage::Configured(_), _) => State::Configured,
            (Stage::Bound(_), false) => State::Bound,
            (Stage::Bound(controller), true) => {
                if controller.is_finished() {
                    State::Closed
                } else {
                    State::Cancelled
                }
            }
            (Stage::Released, _) => State::Closed,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A handle to the token that cancels this device's pumps.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Interface name reported by the device.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn stats(&self) -> Statistics {
        self.counters.snapshot()
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    fn display_name(&self) -> &str {
        self.name().unwrap_or("<unnamed>")
    }
}

#[cfg(target_os = "linux")]
impl NetDevice<crate::platform::TunDevice> {
    /// Open `/dev/net/tun` as interface `tun0` with the default packet size
    /// and queue capacity.
    pub fn new() -> Result<Self> {
        crate::DeviceBuilder::new().build()
    }
}

impl<D: RawDevice> Drop for NetDevice<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: RawDevice> fmt::Debug for NetDevice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetDevice")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("packet_size", &self.packet_size)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

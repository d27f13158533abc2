use crossbeam::channel::{select, Receiver, Sender};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::device::RawDevice;
use crate::error::{Error, Result};
use crate::packet::Packet;

/// Point-in-time copy of the pump counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    /// Packets read from the device and queued for `read`.
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Packets handed to the device write primitive successfully.
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub read_errors: u64,
    /// Failed writes. Each one dropped its packet.
    pub write_errors: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    tx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    read_errors: AtomicU64,
    write_errors: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> Statistics {
        Statistics {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Everything the pumps take ownership of when the device is bound.
pub(crate) struct PumpEnds<D> {
    pub device: Arc<D>,
    pub incoming: Sender<Packet>,
    pub outgoing: Receiver<Packet>,
}

/// Owns the ingress and egress threads of one bound device.
pub(crate) struct PumpController<D> {
    device: Weak<D>,
    ingress: JoinHandle<()>,
    egress: JoinHandle<()>,
}

impl<D: RawDevice> PumpController<D> {
    pub(crate) fn spawn(
        ends: PumpEnds<D>,
        token: CancellationToken,
        counters: Arc<Counters>,
        packet_size: usize,
    ) -> io::Result<Self> {
        let PumpEnds {
            device,
            incoming,
            outgoing,
        } = ends;
        let weak = Arc::downgrade(&device);

        let ingress = {
            let device = device.clone();
            let token = token.clone();
            let counters = counters.clone();
            thread::Builder::new()
                .name("tun-ingress".into())
                .spawn(move || run_ingress(&*device, &incoming, &token, &counters, packet_size))?
        };
        let egress = {
            let token = token.clone();
            thread::Builder::new()
                .name("tun-egress".into())
                .spawn(move || run_egress(&*device, &outgoing, &token, &counters))
        };
        let egress = match egress {
            Ok(egress) => egress,
            Err(err) => {
                token.cancel();
                return Err(err);
            }
        };
        Ok(Self {
            device: weak,
            ingress,
            egress,
        })
    }

    /// Wake an in-flight device read, if the device supports it.
    pub(crate) fn interrupt(&self) -> Result<()> {
        match self.device.upgrade() {
            Some(device) => device.interrupt(),
            None => Ok(()),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.ingress.is_finished() && self.egress.is_finished()
    }

    /// Wait for both pumps to exit. The ingress pump only exits once its
    /// current device read returns.
    pub(crate) fn join(self) -> Result<()> {
        let egress = self.egress.join();
        let ingress = self.ingress.join();
        if egress.is_err() || ingress.is_err() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "pump thread panicked",
            )));
        }
        Ok(())
    }
}

/// device -> incoming queue
///
/// Cancellation is only observed between reads; a read already blocked in
/// the device is not interrupted unless the device implements `interrupt`.
fn run_ingress<D: RawDevice>(
    device: &D,
    incoming: &Sender<Packet>,
    token: &CancellationToken,
    counters: &Counters,
    packet_size: usize,
) {
    log::debug!("ingress pump started");
    loop {
        if token.is_cancelled() {
            break;
        }
        let mut buf = Packet::zeroed(packet_size);
        let len = match device.read_raw(&mut buf) {
            Ok(len) => len,
            Err(err) => {
                counters.read_errors.fetch_add(1, Ordering::Relaxed);
                log::error!("ingress: {err}");
                continue;
            }
        };
        let packet = match Packet::new(buf, len) {
            Ok(packet) => packet,
            Err(err) => {
                counters.read_errors.fetch_add(1, Ordering::Relaxed);
                log::error!("ingress: {err}");
                continue;
            }
        };
        // A read that completes after shutdown is dropped, not queued.
        if token.is_cancelled() {
            log::debug!("ingress: dropping {len} byte packet read after shutdown");
            break;
        }
        // Blocks while the queue is full, which stalls further device reads.
        select! {
            send(incoming, packet) -> res => {
                if res.is_err() {
                    break;
                }
                counters.rx_packets.fetch_add(1, Ordering::Relaxed);
                counters.rx_bytes.fetch_add(len as u64, Ordering::Relaxed);
            }
            recv(token.done()) -> _ => break,
        }
    }
    log::debug!("ingress pump stopped");
}

/// outgoing queue -> device
fn run_egress<D: RawDevice>(
    device: &D,
    outgoing: &Receiver<Packet>,
    token: &CancellationToken,
    counters: &Counters,
) {
    log::debug!("egress pump started");
    loop {
        select! {
            recv(token.done()) -> _ => break,
            recv(outgoing) -> packet => {
                let Ok(packet) = packet else {
                    break;
                };
                match device.write_raw(packet.as_bytes()) {
                    Ok(_) => {
                        counters.tx_packets.fetch_add(1, Ordering::Relaxed);
                        counters
                            .tx_bytes
                            .fetch_add(packet.len() as u64, Ordering::Relaxed);
                    }
                    Err(err) => {
                        counters.write_errors.fetch_add(1, Ordering::Relaxed);
                        log::error!("egress: {err}");
                    }
                }
            }
        }
    }
    log::debug!("egress pump stopped");
}

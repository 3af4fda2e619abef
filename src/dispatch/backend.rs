//! Event backends
//!
//! The OS event-notification boundary, and an in-process implementation of it.

use std::io;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use super::{EventMask, Fd};

/// One ready descriptor reported by a poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FiredEvent {
    pub fd: Fd,
    pub mask: EventMask,
}

/// Event-notification backend (epoll, kqueue, select, ...).
///
/// `poll` is only ever called by the worker holding the leader token; the
/// registration calls may come from any thread.
pub trait EventBackend: Send + Sync {
    /// Start watching `fd` for `mask`
    fn add(&self, fd: Fd, mask: EventMask) -> io::Result<()>;

    /// Replace the interest of an already watched `fd`
    fn update(&self, fd: Fd, mask: EventMask) -> io::Result<()>;

    /// Stop watching `fd`
    fn remove(&self, fd: Fd) -> io::Result<()>;

    /// Wait at most `timeout` for ready descriptors, writing them into
    /// `fired`. Returns how many were written (0 on timeout).
    fn poll(&self, fired: &mut [FiredEvent], timeout: Duration) -> io::Result<usize>;
}

// =============================================================================
// ChannelBackend
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    registered: bool,
    /// Armed interest; cleared when the descriptor fires
    interest: EventMask,
    /// Readiness signalled while not armed for it
    pending: EventMask,
}

/// In-process, one-shot backend.
///
/// Readiness is injected with [`ChannelBackend::signal`]. A descriptor that
/// fires is disarmed until `update` re-arms it, so it cannot be reported to
/// two workers at once; readiness signalled in the meantime is remembered and
/// fires on re-arm.
#[derive(Debug)]
pub struct ChannelBackend {
    slots: Mutex<Vec<Slot>>,
    tx: Sender<FiredEvent>,
    rx: Receiver<FiredEvent>,
}

impl ChannelBackend {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            slots: Mutex::new(vec![Slot::default(); capacity]),
            tx,
            rx,
        }
    }

    /// Mark `fd` ready for `mask`. Returns whether an event fired.
    pub fn signal(&self, fd: Fd, mask: EventMask) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(fd) else {
            return false;
        };

        if slot.registered && slot.interest.intersects(mask) {
            let ready = slot.interest & mask;
            slot.interest = EventMask::NONE;
            self.fire(fd, ready);
            true
        } else {
            slot.pending |= mask;
            false
        }
    }

    /// Events queued but not yet polled
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Capacity of the descriptor space
    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    fn fire(&self, fd: Fd, mask: EventMask) {
        // Both channel ends live in self, so the send cannot fail
        let _ = self.tx.send(FiredEvent { fd, mask });
    }

    /// Arm `slot` with `mask`, firing at once for remembered readiness
    fn arm(&self, fd: Fd, slot: &mut Slot, mask: EventMask) {
        let ready = slot.pending & mask;
        if ready.is_empty() {
            slot.interest = mask;
        } else {
            slot.pending = EventMask::from_bits(slot.pending.bits() & !ready.bits());
            slot.interest = EventMask::NONE;
            self.fire(fd, ready);
        }
    }
}

fn out_of_range(fd: Fd) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("descriptor {} out of range", fd),
    )
}

impl EventBackend for ChannelBackend {
    fn add(&self, fd: Fd, mask: EventMask) -> io::Result<()> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(fd).ok_or_else(|| out_of_range(fd))?;
        if slot.registered {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("descriptor {} already registered", fd),
            ));
        }
        slot.registered = true;
        self.arm(fd, slot, mask);
        Ok(())
    }

    fn update(&self, fd: Fd, mask: EventMask) -> io::Result<()> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(fd).ok_or_else(|| out_of_range(fd))?;
        if !slot.registered {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("descriptor {} not registered", fd),
            ));
        }
        self.arm(fd, slot, mask);
        Ok(())
    }

    fn remove(&self, fd: Fd) -> io::Result<()> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(fd).ok_or_else(|| out_of_range(fd))?;
        if !slot.registered {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("descriptor {} not registered", fd),
            ));
        }
        *slot = Slot::default();
        Ok(())
    }

    fn poll(&self, fired: &mut [FiredEvent], timeout: Duration) -> io::Result<usize> {
        if fired.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty event buffer",
            ));
        }

        fired[0] = match self.rx.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => return Ok(0),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "backend closed"));
            }
        };

        let mut n = 1;
        while n < fired.len() {
            match self.rx.try_recv() {
                Ok(ev) => {
                    fired[n] = ev;
                    n += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(n)
    }
}

//! Dispatch Module
//!
//! Leader-follower event loop that multiplexes many connections over a fixed
//! pool of worker threads.
//!
//! ## Architecture
//! - One shared `EventLoop` per process, borrowed by every worker
//! - Leader token: one worker at a time polls the backend and claims a
//!   ready descriptor
//! - The claimed connection is driven outside the token, in parallel
//! - Freelists recycle connections and item buffers
//!
//! ## Worker States
//! ```text
//! Idle → AcquireLeader → Poll (bounded) → ClaimOne → ReleaseLeader
//!      → Dispatch → (Reregister | Drop) → Idle
//! ```

mod backend;
mod event_loop;
mod freelist;

use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use backend::{ChannelBackend, EventBackend, FiredEvent};
pub use event_loop::EventLoop;
pub use freelist::Freelist;

/// Descriptor number; indexes the fixed-capacity connection table
pub type Fd = usize;

// =============================================================================
// Event Mask
// =============================================================================

/// Set of I/O events a descriptor is interested in, or ready for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const READABLE: EventMask = EventMask(0b01);
    pub const WRITABLE: EventMask = EventMask(0b10);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        EventMask(bits & 0b11)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: EventMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = EventMask;

    fn bitand(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 & rhs.0)
    }
}

// =============================================================================
// Connection State Machine
// =============================================================================

/// A connection driven by the dispatch loop
pub trait Connection: Send {
    /// Run one step of the connection's state machine for the `ready` events.
    ///
    /// Returns the events to wait for next; an empty mask means the
    /// connection is finished and may be recycled.
    fn drive(&mut self, ready: EventMask) -> EventMask;
}

// =============================================================================
// Shutdown Flag
// =============================================================================

/// Process-wide shutdown flag: set once, never reset
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker to stop
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

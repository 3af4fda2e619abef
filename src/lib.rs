//! # bucketkv
//!
//! Persistence and runtime skeleton for a sharded key-value store:
//! - Hint logs: compact, memory-mapped snapshots of a bucket's index
//! - Crash recovery that tolerates a truncated tail
//! - Staleness audits that feed compaction decisions
//! - A leader-follower dispatch loop over a pluggable event backend
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Dispatch Loop (N workers)                    │
//! │        leader token: one poller, parallel processing         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ drive(conn, ready) -> next interest
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Freelists  │          │  LiveIndex  │
//!   │ conns/items │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ snapshot / replay / audit
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  Hint Log   │
//!                           │ (mmap, lz4) │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod index;
pub mod hint;
pub mod dispatch;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use index::{ItemMeta, LiveIndex, MemIndex};
pub use hint::{HintStore, Locator};
pub use dispatch::{Connection, EventLoop, EventMask};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bucketkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

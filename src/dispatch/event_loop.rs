//! Event Loop
//!
//! Shared dispatch context and the leader-follower worker loop.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{KvError, Result};

use super::backend::{EventBackend, FiredEvent};
use super::freelist::Freelist;
use super::{Connection, EventMask, Fd, Shutdown};

/// Initial size of a freshly allocated item buffer
const ITEM_BUFFER_SIZE: usize = 1024;

/// Back-off after a failed poll, so a broken backend does not spin the leader
const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Ready descriptors from the last poll; guarded by the leader token
struct ReadyList {
    fired: Vec<FiredEvent>,
    nready: usize,
}

/// Process-wide dispatch context.
///
/// ## Concurrency:
/// - `leader`: the leader token. Held while polling the backend and while
///   claiming one ready descriptor, never while a connection runs
/// - `conns`: descriptor → connection table. An entry is `Some` only while
///   the connection waits for events; claiming takes it out, so at most one
///   worker drives a connection at a time
/// - Freelists have their own locks, only taken inside connection processing
/// - All methods use `&self`; share the loop by reference across workers
pub struct EventLoop<C, B> {
    backend: B,

    /// Fixed capacity of the table and the ready list
    capacity: usize,

    conns: Mutex<Vec<Option<C>>>,

    leader: Mutex<ReadyList>,

    shutdown: Shutdown,

    poll_timeout: Duration,

    conn_freelist: Freelist<C>,

    item_freelist: Freelist<BytesMut>,

    /// Connection steps executed (for stats/testing)
    dispatched: AtomicU64,
}

impl<C: Connection, B: EventBackend> EventLoop<C, B> {
    /// Create the dispatch context over `backend`
    pub fn new(backend: B, config: &Config) -> Result<Self> {
        config.validate()?;
        let capacity = config.max_descriptors;

        let mut conns = Vec::with_capacity(capacity);
        conns.resize_with(capacity, || None);

        Ok(Self {
            backend,
            capacity,
            conns: Mutex::new(conns),
            leader: Mutex::new(ReadyList {
                fired: vec![FiredEvent::default(); capacity],
                nready: 0,
            }),
            shutdown: Shutdown::new(),
            poll_timeout: config.poll_timeout(),
            conn_freelist: Freelist::new(config.conn_freelist_capacity),
            item_freelist: Freelist::new(config.item_freelist_capacity),
            dispatched: AtomicU64::new(0),
        })
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Hand `conn` to the loop and start watching `fd` for `mask`
    pub fn register(&self, fd: Fd, mask: EventMask, conn: C) -> Result<()> {
        self.check_fd(fd)?;
        {
            let mut conns = self.conns.lock();
            if conns[fd].is_some() {
                return Err(KvError::BackendRejected {
                    fd,
                    source: std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        "descriptor already has a connection",
                    ),
                });
            }
            conns[fd] = Some(conn);
        }

        if let Err(source) = self.backend.add(fd, mask) {
            self.conns.lock()[fd] = None;
            return Err(KvError::BackendRejected { fd, source });
        }
        Ok(())
    }

    /// Put `conn` back in the table and re-arm `fd` with `mask`.
    ///
    /// On failure the entry is cleared and the connection dropped.
    pub fn update(&self, fd: Fd, mask: EventMask, conn: C) -> Result<()> {
        self.check_fd(fd)?;
        self.conns.lock()[fd] = Some(conn);

        if let Err(source) = self.backend.update(fd, mask) {
            let dropped = self.conns.lock()[fd].take();
            drop(dropped);
            return Err(KvError::BackendRejected { fd, source });
        }
        Ok(())
    }

    /// Stop watching `fd`, handing back its connection if it was idle in the
    /// table
    pub fn unregister(&self, fd: Fd) -> Result<Option<C>> {
        self.check_fd(fd)?;
        if self.conns.lock()[fd].is_none() {
            return Ok(None);
        }

        self.backend
            .remove(fd)
            .map_err(|source| KvError::BackendRejected { fd, source })?;
        Ok(self.conns.lock()[fd].take())
    }

    // =========================================================================
    // Worker Loop
    // =========================================================================

    /// Run `nthreads` workers until shutdown: `nthreads - 1` spawned, one on
    /// the calling thread. Returns once every worker has exited.
    pub fn run(&self, nthreads: usize) -> Result<()> {
        let nthreads = nthreads.max(1);
        tracing::info!("Starting dispatch loop with {} worker(s)", nthreads);

        let result = thread::scope(|scope| {
            for i in 1..nthreads {
                let spawned = thread::Builder::new()
                    .name(format!("bucketkv-worker-{}", i))
                    .spawn_scoped(scope, || self.worker_main());
                if let Err(e) = spawned {
                    tracing::error!("Can't create worker thread: {}", e);
                    self.shutdown.trigger();
                    return Err(KvError::ThreadSpawn(e.to_string()));
                }
            }
            self.worker_main();
            Ok(())
        });

        tracing::info!("Dispatch loop stopped");
        result
    }

    /// One worker: claim a ready connection, drive it, repeat until shutdown
    pub fn worker_main(&self) {
        tracing::debug!("Worker started");
        while !self.shutdown.is_triggered() {
            let Some((event, conn)) = self.next_ready() else {
                break;
            };
            self.dispatch(event, conn);
        }
        tracing::debug!("Worker exiting");
    }

    /// Acquire the leader token, poll until something is ready, claim one
    /// connection and release the token. `None` on shutdown.
    fn next_ready(&self) -> Option<(FiredEvent, C)> {
        let mut ready = self.leader.lock();

        loop {
            while ready.nready == 0 && !self.shutdown.is_triggered() {
                let ReadyList { fired, nready } = &mut *ready;
                match self.backend.poll(fired, self.poll_timeout) {
                    Ok(n) => *nready = n.min(fired.len()),
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        tracing::warn!("Backend poll failed: {}", e);
                        thread::sleep(POLL_ERROR_BACKOFF.min(self.poll_timeout));
                    }
                }
            }
            if self.shutdown.is_triggered() {
                return None;
            }

            ready.nready -= 1;
            let event = ready.fired[ready.nready];

            let claimed = self.conns.lock().get_mut(event.fd).and_then(Option::take);
            match claimed {
                Some(conn) => return Some((event, conn)),
                None => {
                    tracing::warn!(
                        "No connection for ready descriptor {}, skipping",
                        event.fd
                    );
                }
            }
        }
    }

    /// Drive one step outside the leader token, then re-arm or retire
    fn dispatch(&self, event: FiredEvent, mut conn: C) {
        let next = conn.drive(event.mask);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        if next.is_empty() {
            tracing::trace!("Connection on descriptor {} finished", event.fd);
            if let Err(e) = self.backend.remove(event.fd) {
                tracing::debug!("Removing descriptor {}: {}", event.fd, e);
            }
            if !self.conn_freelist.release(conn) {
                tracing::trace!("Connection freelist full, dropping connection");
            }
            return;
        }

        if let Err(e) = self.update(event.fd, next, conn) {
            tracing::warn!("Dropping connection on descriptor {}: {}", event.fd, e);
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Ask every worker to exit; they do so within one poll interval
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Clone of the shutdown flag, for signal handlers and other threads
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_triggered()
    }

    // =========================================================================
    // Freelists
    // =========================================================================

    /// Pool of finished connections, reusable for new descriptors
    pub fn conn_freelist(&self) -> &Freelist<C> {
        &self.conn_freelist
    }

    /// Pool of item buffers
    pub fn item_freelist(&self) -> &Freelist<BytesMut> {
        &self.item_freelist
    }

    /// A pooled item buffer, or a fresh one
    pub fn acquire_item_buffer(&self) -> BytesMut {
        self.item_freelist
            .acquire()
            .unwrap_or_else(|| BytesMut::with_capacity(ITEM_BUFFER_SIZE))
    }

    /// Clear `buf` and pool it. Returns whether it was kept.
    pub fn release_item_buffer(&self, mut buf: BytesMut) -> bool {
        buf.clear();
        self.item_freelist.release(buf)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connections currently idle in the table
    pub fn registered(&self) -> usize {
        self.conns.lock().iter().filter(|c| c.is_some()).count()
    }

    /// Total connection steps executed
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    fn check_fd(&self, fd: Fd) -> Result<()> {
        if fd >= self.capacity {
            tracing::warn!("fd is too large: {}", fd);
            return Err(KvError::TooManyDescriptors {
                fd,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

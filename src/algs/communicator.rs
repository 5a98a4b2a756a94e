//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking -– the partition channel
//! layer calls `.wait()` before it trusts that a buffer is ready, so the
//! exchange protocol itself is a linear sequence of blocking steps.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process's rank within the group the communicator spans.
    fn rank(&self) -> usize;
    /// Number of ranks in the group.
    fn size(&self) -> usize;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Drain a batch of outstanding handles, waiting on each one sequentially
/// in iteration order. Returns the received payloads in the same order.
pub fn wait_all<H: Wait>(handles: impl IntoIterator<Item = H>) -> Vec<Option<Vec<u8>>> {
    handles.into_iter().map(Wait::wait).collect()
}

/// Message tag, newtyped so protocol phases can carve out disjoint blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    #[inline]
    pub const fn new(v: u16) -> Self {
        Self(v)
    }
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `delta` slots above this one, wrapping on overflow.
    #[inline]
    pub const fn offset(self, delta: u16) -> Self {
        Self(self.0.wrapping_add(delta))
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

// --- LocalComm: intra-process, shared-mailbox backend ---
//
// A coupled run holds several disjoint channels in one test process (each
// participant's group plus the coordinator-to-coordinator link), so the
// mailbox key carries a universe id in addition to (src, dst, tag).
type Key = (usize, usize, usize, u16); // (universe, src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, Bytes>> = Lazy::new(DashMap::new);

pub struct LocalHandle {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
}

impl Wait for LocalHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let mut guard = self.buf.lock();
        guard.take()
    }
}

/// In-process communicator backed by a process-wide mailbox. Sends are
/// buffered (they complete immediately); receives poll until a matching
/// message arrives. Tests that use it must not share a universe.
#[derive(Clone, Debug)]
pub struct LocalComm {
    universe: usize,
    rank: usize,
    size: usize,
}

impl LocalComm {
    pub fn new(universe: usize, rank: usize, size: usize) -> Self {
        Self { universe, rank, size }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.universe, self.rank, peer, tag);
        MAILBOX.insert(key, Bytes::copy_from_slice(buf));
    }

    // The message is returned from `wait` exactly as sent; callers validate
    // its length against the buffer they posted.
    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        let key = (self.universe, peer, self.rank, tag);
        let slot = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let handle = std::thread::spawn(move || {
            loop {
                if let Some(bytes) = MAILBOX.remove(&key).map(|(_, v)| v) {
                    *slot_clone.lock() = Some(bytes.to_vec());
                    break;
                }
                std::thread::yield_now();
            }
        });
        LocalHandle {
            buf: slot,
            handle: Some(handle),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as MpiGroup, Destination, Source};

    /// MPI-backed communicator over the world group. Transfers are
    /// blocking underneath; handles exist to satisfy the trait.
    pub struct MpiComm {
        _universe: mpi::environment::Universe,
        world: SimpleCommunicator,
        rank: usize,
    }

    impl MpiComm {
        pub fn new() -> Self {
            let universe = mpi::initialize().expect("MPI already initialized");
            let world = universe.world();
            let rank = world.rank() as usize;
            Self {
                _universe: universe,
                world,
                rank,
            }
        }
    }

    pub struct MpiRecv(Option<Vec<u8>>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecv {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag as i32);
            MpiRecv(Some(data))
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.world.size() as usize
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
